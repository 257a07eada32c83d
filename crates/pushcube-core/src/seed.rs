//! Deterministic seed hierarchy and batched per-slot RNG.
//!
//! [`SeedHierarchy`] derives child seeds for the levels of a run:
//!
//! ```text
//! Run seed
//! └── Subsystem seed (load, episode, camera)
//!     └── Slot seed (per slot in the batch)
//! ```
//!
//! [`BatchedRng`] owns one `ChaCha8Rng` per environment slot. Slot `i` is
//! seeded from `(seed, i)` alone, so the draws a slot sees do not depend on
//! how many slots the batch has.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::ops::{Index, IndexMut};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Derive a child seed from a parent seed and a string key.
///
/// Uses `DefaultHasher` (SipHash-1-3) for fast, deterministic mixing.
///
/// # Example
///
/// ```
/// use pushcube_core::seed::derive_seed;
///
/// let child = derive_seed(42, "camera");
/// assert_ne!(child, 42);
/// assert_eq!(child, derive_seed(42, "camera"));
/// ```
#[must_use]
pub fn derive_seed(parent: u64, key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    parent.hash(&mut hasher);
    key.hash(&mut hasher);
    hasher.finish()
}

/// Derive a child seed from a parent seed and a numeric index.
///
/// # Example
///
/// ```
/// use pushcube_core::seed::derive_seed_indexed;
///
/// assert_ne!(derive_seed_indexed(42, 0), derive_seed_indexed(42, 1));
/// ```
#[must_use]
pub fn derive_seed_indexed(parent: u64, index: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    parent.hash(&mut hasher);
    index.hash(&mut hasher);
    hasher.finish()
}

// ---------------------------------------------------------------------------
// SeedHierarchy
// ---------------------------------------------------------------------------

/// Hierarchical seed manager for reproducible runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHierarchy {
    root: u64,
}

impl SeedHierarchy {
    /// Create a new hierarchy from a root seed.
    #[must_use]
    pub const fn new(root: u64) -> Self {
        Self { root }
    }

    /// The root (run-level) seed.
    #[must_use]
    pub const fn root(&self) -> u64 {
        self.root
    }

    /// Seed for a named subsystem at run level.
    #[must_use]
    pub fn subsystem_seed(&self, subsystem: &str) -> u64 {
        derive_seed(self.root, subsystem)
    }

    /// Batched generator for a named subsystem: slot `i` is keyed by
    /// `(subsystem_seed, i)`.
    #[must_use]
    pub fn batched(&self, subsystem: &str, num_envs: usize) -> BatchedRng {
        BatchedRng::new(self.subsystem_seed(subsystem), num_envs)
    }

    /// Single generator for a named subsystem.
    #[must_use]
    pub fn rng(&self, subsystem: &str) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.subsystem_seed(subsystem))
    }
}

impl Default for SeedHierarchy {
    fn default() -> Self {
        Self::new(0)
    }
}

// ---------------------------------------------------------------------------
// BatchedRng
// ---------------------------------------------------------------------------

/// One independent deterministic generator per environment slot.
///
/// Every batched draw returns one value per slot, in slot order.
///
/// # Example
///
/// ```
/// use pushcube_core::seed::BatchedRng;
///
/// let mut small = BatchedRng::new(7, 2);
/// let mut large = BatchedRng::new(7, 16);
/// let a = small.uniform(0.0, 1.0);
/// let b = large.uniform(0.0, 1.0);
/// assert_eq!(a[..], b[..2]);
/// ```
#[derive(Debug, Clone)]
pub struct BatchedRng {
    rngs: Vec<ChaCha8Rng>,
}

impl BatchedRng {
    /// Create `num_envs` generators keyed by `(seed, slot)`.
    #[must_use]
    pub fn new(seed: u64, num_envs: usize) -> Self {
        let rngs = (0..num_envs)
            .map(|slot| ChaCha8Rng::seed_from_u64(derive_seed_indexed(seed, slot as u64)))
            .collect();
        Self { rngs }
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rngs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rngs.is_empty()
    }

    /// One sample in `[0, 1)` per slot.
    #[must_use]
    pub fn rand(&mut self) -> Vec<f32> {
        self.rngs.iter_mut().map(|rng| rng.r#gen::<f32>()).collect()
    }

    /// One uniform sample in `[low, high)` per slot.
    ///
    /// A degenerate range (`low >= high`) yields `low` for every slot.
    #[must_use]
    pub fn uniform(&mut self, low: f32, high: f32) -> Vec<f32> {
        self.rngs
            .iter_mut()
            .map(|rng| sample_uniform(rng, low, high))
            .collect()
    }

    /// Three uniform samples in `[low, high)` per slot.
    #[must_use]
    pub fn uniform3(&mut self, low: f32, high: f32) -> Vec<[f32; 3]> {
        self.rngs
            .iter_mut()
            .map(|rng| {
                [
                    sample_uniform(rng, low, high),
                    sample_uniform(rng, low, high),
                    sample_uniform(rng, low, high),
                ]
            })
            .collect()
    }

}

impl Index<usize> for BatchedRng {
    type Output = ChaCha8Rng;
    fn index(&self, slot: usize) -> &ChaCha8Rng {
        &self.rngs[slot]
    }
}

impl IndexMut<usize> for BatchedRng {
    fn index_mut(&mut self, slot: usize) -> &mut ChaCha8Rng {
        &mut self.rngs[slot]
    }
}

/// Uniform sample in `[low, high)`; `low` when the range is empty.
#[must_use]
pub fn sample_uniform<R: Rng + ?Sized>(rng: &mut R, low: f32, high: f32) -> f32 {
    if low < high {
        rng.gen_range(low..high)
    } else {
        low
    }
}

/// Gaussian sample; `mean` when `std` is zero or not a valid deviation.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn sample_normal<R: Rng + ?Sized>(rng: &mut R, mean: f32, std: f32) -> f32 {
    if std == 0.0 {
        return mean;
    }
    Normal::new(f64::from(mean), f64::from(std)).map_or(mean, |dist| dist.sample(rng) as f32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
