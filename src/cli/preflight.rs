//! Pre-flight checks before operations that call the model APIs.
//!
//! Fails early with an actionable message instead of midway through a
//! dialogue.

use crate::error::{RecapError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// The dialogue generates questions and embeddings.
    Quiz,
    /// Search embeds the transcript and the query.
    Search,
    /// Importing and chunking stay local.
    Local,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Quiz | Operation::Search => check_api_key(std::env::var("OPENAI_API_KEY").ok()),
        Operation::Local => Ok(()),
    }
}

fn check_api_key(key: Option<String>) -> Result<()> {
    match key {
        Some(key) if !key.trim().is_empty() => Ok(()),
        Some(_) => Err(RecapError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        None => Err(RecapError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_operations_have_no_requirements() {
        assert!(check(Operation::Local).is_ok());
    }

    #[test]
    fn test_api_key_checks() {
        assert!(check_api_key(Some("sk-test".to_string())).is_ok());
        assert!(matches!(check_api_key(Some("  ".to_string())), Err(RecapError::Config(_))));
        assert!(check_api_key(None).is_err());
    }
}
