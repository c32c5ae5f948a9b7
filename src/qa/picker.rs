//! Random choice of the chunk a scripted question is generated from.

use crate::chunking::Chunk;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Picks source chunks, reproducibly when seeded.
pub struct ChunkPicker {
    rng: StdRng,
}

impl ChunkPicker {
    /// A picker that always makes the same choices for the same seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A picker seeded from system entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    /// Choose one chunk, or `None` if there are none.
    pub fn pick<'a>(&mut self, chunks: &'a [Chunk]) -> Option<&'a Chunk> {
        chunks.choose(&mut self.rng)
    }
}
