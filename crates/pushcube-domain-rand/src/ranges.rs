//! Randomization ranges for parameter sampling.
//!
//! A [`RandomizationRange`] describes how a single scalar parameter should
//! be randomized. Call [`sample`](RandomizationRange::sample) with an RNG to
//! draw one value, or [`sample_batched`](RandomizationRange::sample_batched)
//! to draw one value per environment slot.

use pushcube_core::seed::{BatchedRng, sample_normal, sample_uniform};
use rand::Rng;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from constructing a randomization range.
#[derive(Debug, Error)]
pub enum RangeError {
    #[error("invalid bounds: low ({low}) > high ({high})")]
    InvalidBounds { low: f32, high: f32 },

    #[error("invalid standard deviation: {0} (must be >= 0 and finite)")]
    InvalidStd(f32),

    #[error("value is not finite: {0}")]
    NonFinite(f32),
}

// ---------------------------------------------------------------------------
// RandomizationRange
// ---------------------------------------------------------------------------

/// Describes how a parameter is randomized at scene load.
#[derive(Clone, Debug, PartialEq)]
pub enum RandomizationRange {
    /// Uniform distribution over `[low, high)`. `low == high` is allowed and
    /// always yields `low`.
    Uniform { low: f32, high: f32 },

    /// Gaussian sample clipped into `[low, high]`.
    ClippedGaussian {
        mean: f32,
        std: f32,
        low: f32,
        high: f32,
    },
}

fn check_bounds(low: f32, high: f32) -> Result<(), RangeError> {
    if !low.is_finite() || !high.is_finite() || low > high {
        return Err(RangeError::InvalidBounds { low, high });
    }
    Ok(())
}

fn check_gaussian(mean: f32, std: f32) -> Result<(), RangeError> {
    if !std.is_finite() || std < 0.0 {
        return Err(RangeError::InvalidStd(std));
    }
    if !mean.is_finite() {
        return Err(RangeError::NonFinite(mean));
    }
    Ok(())
}

impl RandomizationRange {
    /// Create a uniform range.
    pub fn uniform(low: f32, high: f32) -> Result<Self, RangeError> {
        check_bounds(low, high)?;
        Ok(Self::Uniform { low, high })
    }

    /// Create a Gaussian range clipped to `[low, high]`.
    pub fn clipped_gaussian(mean: f32, std: f32, low: f32, high: f32) -> Result<Self, RangeError> {
        check_gaussian(mean, std)?;
        check_bounds(low, high)?;
        Ok(Self::ClippedGaussian {
            mean,
            std,
            low,
            high,
        })
    }

    /// Sample a value from this range using the given RNG.
    #[must_use]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        match self {
            Self::Uniform { low, high } => sample_uniform(rng, *low, *high),
            Self::ClippedGaussian {
                mean,
                std,
                low,
                high,
            } => sample_normal(rng, *mean, *std).clamp(*low, *high),
        }
    }

    /// Sample one value per slot, each from that slot's generator.
    #[must_use]
    pub fn sample_batched(&self, rng: &mut BatchedRng) -> Vec<f32> {
        (0..rng.len()).map(|slot| self.sample(&mut rng[slot])).collect()
    }

    /// Value used when randomization is off: the midpoint of a uniform
    /// range, the unclipped mean of a Gaussian.
    #[must_use]
    pub fn nominal(&self) -> f32 {
        match self {
            Self::Uniform { low, high } => (low + high) / 2.0,
            Self::ClippedGaussian { mean, .. } => *mean,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn uniform_samples_in_range() {
        let range = RandomizationRange::uniform(0.011, 0.014).unwrap();
        let mut rng = rng();
        for _ in 0..100 {
            let v = range.sample(&mut rng);
            assert!((0.011..0.014).contains(&v), "got {v}");
        }
    }

    #[test]
    fn uniform_allows_degenerate_range() {
        let range = RandomizationRange::uniform(0.02, 0.02).unwrap();
        assert!((range.sample(&mut rng()) - 0.02).abs() < f32::EPSILON);
    }

    #[test]
    fn uniform_rejects_inverted_bounds() {
        assert!(RandomizationRange::uniform(6.0, 5.0).is_err());
        assert!(RandomizationRange::uniform(0.0, f32::INFINITY).is_err());
    }

    #[test]
    fn uniform_nominal_is_midpoint() {
        let r = RandomizationRange::uniform(2.0, 4.0).unwrap();
        assert!((r.nominal() - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn clipped_gaussian_zero_std_returns_mean() {
        let range = RandomizationRange::clipped_gaussian(0.3, 0.0, 0.1, 0.5).unwrap();
        assert!((range.sample(&mut rng()) - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn clipped_gaussian_rejects_bad_parameters() {
        assert!(RandomizationRange::clipped_gaussian(0.0, -1.0, -1.0, 1.0).is_err());
        assert!(RandomizationRange::clipped_gaussian(f32::NAN, 1.0, -1.0, 1.0).is_err());
        assert!(RandomizationRange::clipped_gaussian(0.0, 1.0, 1.0, -1.0).is_err());
    }

    #[test]
    fn clipped_gaussian_stays_within_bounds() {
        let range = RandomizationRange::clipped_gaussian(0.3, 1.0, 0.1, 0.5).unwrap();
        let mut rng = rng();
        for _ in 0..200 {
            let v = range.sample(&mut rng);
            assert!((0.1..=0.5).contains(&v), "got {v}");
        }
    }

    #[test]
    fn clipped_gaussian_nominal_is_unclipped_mean() {
        let r = RandomizationRange::clipped_gaussian(0.9, 0.05, 0.1, 0.5).unwrap();
        assert!((r.nominal() - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn sample_batched_one_per_slot_and_deterministic() {
        let range = RandomizationRange::uniform(0.0, 100.0).unwrap();
        let mut a = BatchedRng::new(9, 5);
        let mut b = BatchedRng::new(9, 5);
        let va = range.sample_batched(&mut a);
        assert_eq!(va.len(), 5);
        assert_eq!(va, range.sample_batched(&mut b));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn range_is_send_sync() {
        assert_send_sync::<RandomizationRange>();
    }
}
