//! Categorical sampling helpers shared by the movement and infection phases.

use crate::rand::distr::weighted::WeightedIndex;
use crate::rand::distr::Distribution;
use crate::rand::Rng;

/// Draws an index out of `weights` with probability proportional to each weight.
///
/// Weights need not sum to one. A degenerate vector (empty, all zero, or containing a negative
/// or non-finite weight) cannot be sampled from; in that case index `0` is returned without
/// consuming any randomness. Callers always put the "no change" outcome first.
pub fn sample_weighted<R: Rng>(rng: &mut R, weights: &[f64]) -> usize {
    match WeightedIndex::new(weights) {
        Ok(index) => index.sample(rng),
        Err(_) => 0,
    }
}

/// Returns `true` with probability `p`. Values of `p` outside [0, 1] are clamped.
pub fn sample_bool<R: Rng>(rng: &mut R, p: f64) -> bool {
    if p.is_nan() {
        return false;
    }
    rng.random_bool(p.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::rng_from_seed;

    #[test]
    fn zero_weights_are_never_drawn() {
        let mut rng = rng_from_seed(42);
        for _ in 0..1000 {
            let index = sample_weighted(&mut rng, &[0.0, 1.0, 0.0]);
            assert_eq!(index, 1);
        }
    }

    #[test]
    fn degenerate_weights_fall_back_to_first() {
        let mut rng = rng_from_seed(42);
        assert_eq!(sample_weighted(&mut rng, &[0.0, 0.0]), 0);
        assert_eq!(sample_weighted(&mut rng, &[]), 0);
    }

    #[test]
    fn weighted_frequencies() {
        let mut rng = rng_from_seed(42);
        let mut counts = [0usize; 2];
        for _ in 0..10_000 {
            counts[sample_weighted(&mut rng, &[1.0, 3.0])] += 1;
        }
        // Expect roughly a quarter of draws to hit index 0.
        assert!(counts[0] > 2_000 && counts[0] < 3_000, "{counts:?}");
    }

    #[test]
    fn sample_bool_extremes() {
        let mut rng = rng_from_seed(7);
        assert!(sample_bool(&mut rng, 1.0));
        assert!(!sample_bool(&mut rng, 0.0));
        assert!(sample_bool(&mut rng, 1.5));
        assert!(!sample_bool(&mut rng, f64::NAN));
    }
}
