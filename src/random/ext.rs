use std::any::TypeId;
use std::cell::RefMut;

use log::trace;

use crate::hashing::hash_str;
use crate::rand::distr::uniform::{SampleRange, SampleUniform};
use crate::rand::distr::weighted::{Weight, WeightedIndex};
use crate::rand::distr::Distribution;
use crate::rand::{Rng, SeedableRng};
use crate::random::{RandomState, RngHolder, RngId};

/// Gets a mutable reference to the random number generator associated with the given
/// [`RngId`]. If the Rng has not been used before, one will be created with the base seed.
fn get_rng<R: RngId + 'static>(state: &RandomState) -> RefMut<R::RngType> {
    let rng_holders = state
        .rng_holders
        .try_borrow_mut()
        .expect("rng streams must not be borrowed re-entrantly");
    RefMut::map(rng_holders, |holders| {
        holders
            .entry(TypeId::of::<R>())
            // Create a new rng holder if it doesn't exist yet
            .or_insert_with(|| {
                trace!(
                    "creating new RNG (seed={}) for stream {}",
                    state.base_seed,
                    R::get_name()
                );
                let seed_offset = hash_str(R::get_name());
                RngHolder {
                    rng: Box::new(R::RngType::seed_from_u64(
                        state.base_seed.wrapping_add(seed_offset),
                    )),
                }
            })
            .rng
            .downcast_mut::<R::RngType>()
            .expect("rng holder is keyed by its own type")
    })
}

/// Random number generation for anything that owns a [`RandomState`].
pub trait RandomExt {
    fn random_state(&self) -> &RandomState;

    fn random_state_mut(&mut self) -> &mut RandomState;

    /// Resets the base seed. Existing streams are dropped so they get re-seeded the next time
    /// they are used.
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module");
        let state = self.random_state_mut();
        state.base_seed = base_seed;
        state.rng_holders.get_mut().clear();
    }

    /// Gets a random sample from the random number generator associated with the given
    /// [`RngId`] by applying the specified sampler function.
    fn sample<R: RngId + 'static, T>(
        &self,
        _rng_type: R,
        sampler: impl FnOnce(&mut R::RngType) -> T,
    ) -> T {
        let mut rng = get_rng::<R>(self.random_state());
        sampler(&mut rng)
    }

    /// Gets a random sample from the specified distribution using a random number generator
    /// associated with the given [`RngId`].
    fn sample_distr<R: RngId + 'static, T>(
        &self,
        _rng_type: R,
        distribution: impl Distribution<T>,
    ) -> T
    where
        R::RngType: Rng,
    {
        let mut rng = get_rng::<R>(self.random_state());
        distribution.sample::<R::RngType>(&mut rng)
    }

    /// Gets a random sample within the range provided by `range`
    /// using the generator associated with the given [`RngId`].
    fn sample_range<R: RngId + 'static, S, T>(&self, rng_id: R, range: S) -> T
    where
        R::RngType: Rng,
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample(rng_id, |rng| rng.random_range(range))
    }

    /// Gets a random boolean value which is true with probability `p`
    /// using the generator associated with the given [`RngId`].
    fn sample_bool<R: RngId + 'static>(&self, rng_id: R, p: f64) -> bool
    where
        R::RngType: Rng,
    {
        self.sample(rng_id, |rng| rng.random_bool(p))
    }

    /// Draws a random entry out of the list provided in `weights`
    /// with the given weights using the generator associated with the
    /// given [`RngId`]. The weights must have been validated beforehand: at least one must be
    /// positive and none negative.
    fn sample_weighted<R: RngId + 'static, T>(&self, _rng_id: R, weights: &[T]) -> usize
    where
        R::RngType: Rng,
        T: Clone
            + Default
            + SampleUniform
            + for<'a> std::ops::AddAssign<&'a T>
            + PartialOrd
            + Weight,
    {
        let index = WeightedIndex::new(weights).expect("weights are validated by the caller");
        let mut rng = get_rng::<R>(self.random_state());
        index.sample(&mut *rng)
    }
}

impl RandomExt for RandomState {
    fn random_state(&self) -> &RandomState {
        self
    }

    fn random_state_mut(&mut self) -> &mut RandomState {
        self
    }
}

#[cfg(test)]
mod test {
    use crate::rand::RngCore;
    use crate::random::{RandomExt, RandomState};
    use crate::define_rng;

    define_rng!(FooRng);
    define_rng!(BarRng);

    #[test]
    fn get_rng_basic() {
        let state = RandomState::new(42);

        assert_ne!(
            state.sample(FooRng, RngCore::next_u64),
            state.sample(FooRng, RngCore::next_u64)
        );
    }

    #[test]
    fn multiple_rng_types() {
        let state = RandomState::new(42);

        assert_ne!(
            state.sample(FooRng, RngCore::next_u64),
            state.sample(BarRng, RngCore::next_u64)
        );
    }

    #[test]
    fn streams_are_independent() {
        let a = RandomState::new(42);
        let b = RandomState::new(42);
        // Drawing from another stream first does not shift FooRng.
        b.sample(BarRng, RngCore::next_u64);
        assert_eq!(
            a.sample(FooRng, RngCore::next_u64),
            b.sample(FooRng, RngCore::next_u64)
        );
    }

    #[test]
    fn reset_seed() {
        let mut state = RandomState::new(42);

        let run_0 = state.sample(FooRng, RngCore::next_u64);
        let run_1 = state.sample(FooRng, RngCore::next_u64);

        // Reset with same seed, ensure we get the same values
        state.init_random(42);
        assert_eq!(run_0, state.sample(FooRng, RngCore::next_u64));
        assert_eq!(run_1, state.sample(FooRng, RngCore::next_u64));

        // Reset with different seed, ensure we get different values
        state.init_random(88);
        assert_ne!(run_0, state.sample(FooRng, RngCore::next_u64));
        assert_ne!(run_1, state.sample(FooRng, RngCore::next_u64));
    }

    #[test]
    fn sample_weighted_respects_zero_weights() {
        let state = RandomState::new(42);
        for _ in 0..100 {
            let index = state.sample_weighted(FooRng, &[0.0, 1.0, 0.0]);
            assert_eq!(index, 1);
        }
    }

    #[test]
    fn sample_range_and_bool() {
        let state = RandomState::new(42);
        let value: f64 = state.sample_range(FooRng, 2.0..=2.0);
        assert!((value - 2.0).abs() < f64::EPSILON);
        assert!(!state.sample_bool(BarRng, 0.0));
        assert!(state.sample_bool(BarRng, 1.0));
    }
}
