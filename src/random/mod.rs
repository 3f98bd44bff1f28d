//! Named, independently seeded random number streams.
//!
//! Every stochastic decision in a run draws from one of a handful of streams declared with
//! `define_rng!`. Streams are created lazily the first time they are used, seeded with
//! `base_seed + hash_str(name)`, so two runs with the same seed and the same event order draw
//! identical values.
mod ext;
mod macros;
mod sampling_algorithms;

use std::any::{Any, TypeId};
use std::cell::RefCell;

pub use ext::RandomExt;
pub use macros::define_rng;
pub use sampling_algorithms::{sample_indexes_excluding, sample_multiple_from_known_length};

use crate::rand::SeedableRng;
use crate::{HashMap, HashMapExt};

pub trait RngId: Copy + Clone {
    type RngType: SeedableRng;
    fn get_name() -> &'static str;
}

// This is a wrapper that allows for future support for different types of
// random number generators (anything that implements SeedableRng is valid).
struct RngHolder {
    rng: Box<dyn Any>,
}

/// Stores:
/// * `base_seed`: A base seed for all rngs
/// * `rng_holders`: A map of rngs, keyed by their `RngId`. Note that this is
///   stored in a `RefCell` to allow for mutable borrow without requiring a
///   mutable borrow of the owner.
pub struct RandomState {
    base_seed: u64,
    rng_holders: RefCell<HashMap<TypeId, RngHolder>>,
}

impl RandomState {
    #[must_use]
    pub fn new(base_seed: u64) -> Self {
        RandomState {
            base_seed,
            rng_holders: RefCell::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }
}

impl Default for RandomState {
    fn default() -> Self {
        Self::new(0)
    }
}

// Streams used by the simulation.
define_rng!(SeverityRng);
define_rng!(SeedingRng);
define_rng!(ImportRng);
define_rng!(ProgressionRng);
define_rng!(HouseholdRng);
define_rng!(ConstantRng);
