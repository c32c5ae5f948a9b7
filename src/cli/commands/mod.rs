//! CLI command implementations.

mod chunks;
mod config;
mod import;
mod list;
mod quiz;
mod reset;
mod search;

pub use chunks::run_chunks;
pub use config::run_config;
pub use import::run_import;
pub use list::run_list;
pub use quiz::run_quiz;
pub use reset::run_reset;
pub use search::run_search;
