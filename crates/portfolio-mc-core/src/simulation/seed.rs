//! Hierarchical seeding.
//!
//! Every random stream in a run (shard, candidate portfolio, trial) is derived
//! from one root seed by mixing in its index, so streams never overlap across
//! shards and results do not depend on thread scheduling.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedSequence {
    seed: u64,
}

impl SeedSequence {
    pub fn new(seed: u64) -> Self {
        SeedSequence { seed }
    }

    pub fn from_entropy() -> Self {
        SeedSequence::new(rand::random())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Independent sub-sequence for the `index`-th child.
    pub fn child(&self, index: u64) -> SeedSequence {
        SeedSequence::new(splitmix64(self.seed ^ splitmix64(index.wrapping_add(1))))
    }

    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
