//! Load-time randomizers for the cube, the lighting and the robot colors.
//!
//! Each randomizer draws from a [`BatchedRng`], so slot `i` consumes values
//! only from its own generator. Geometry cannot be changed after the actors
//! are built, so these run once per scene load.

use pushcube_core::seed::BatchedRng;
use pushcube_core::types::Rgba;
use tracing::warn;

use crate::config::{DomainRandomizationConfig, RobotColor};
use crate::ranges::{RandomizationRange, RangeError};

// ---------------------------------------------------------------------------
// CubeRandomizer
// ---------------------------------------------------------------------------

/// Per-slot cube geometry and material.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeProperties {
    pub half_sizes: Vec<f32>,
    pub frictions: Vec<f32>,
    pub colors: Vec<Rgba>,
}

impl CubeProperties {
    #[must_use]
    pub fn len(&self) -> usize {
        self.half_sizes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.half_sizes.is_empty()
    }
}

/// Samples [`CubeProperties`] from the randomization config.
#[derive(Debug, Clone)]
pub struct CubeRandomizer {
    pub half_size: RandomizationRange,
    pub friction: RandomizationRange,
    pub randomize_color: bool,
}

impl CubeRandomizer {
    /// Build from the cube fields of `config`.
    pub fn from_config(config: &DomainRandomizationConfig) -> Result<Self, RangeError> {
        Ok(Self {
            half_size: config.half_size_range()?,
            friction: config.friction_range()?,
            randomize_color: config.randomize_cube_color,
        })
    }

    /// Mid-range half size, mean friction and red for every slot.
    #[must_use]
    pub fn nominal(&self, num_envs: usize) -> CubeProperties {
        CubeProperties {
            half_sizes: vec![self.half_size.nominal(); num_envs],
            frictions: vec![self.friction.nominal(); num_envs],
            colors: vec![Rgba::RED; num_envs],
        }
    }

    /// Draw one cube per slot. Per slot the order is half size, color
    /// (when randomized), friction.
    #[must_use]
    pub fn sample(&self, rng: &mut BatchedRng) -> CubeProperties {
        let half_sizes = self.half_size.sample_batched(rng);
        let colors = if self.randomize_color {
            rng.uniform3(0.0, 1.0).into_iter().map(Rgba::opaque).collect()
        } else {
            vec![Rgba::RED; rng.len()]
        };
        let frictions = self.friction.sample_batched(rng);
        CubeProperties {
            half_sizes,
            frictions,
            colors,
        }
    }
}

// ---------------------------------------------------------------------------
// AmbientLighting
// ---------------------------------------------------------------------------

/// Ambient RGB used when lighting is not randomized.
pub const FIXED_AMBIENT: [f32; 3] = [0.3, 0.3, 0.3];

/// Bounds of the per-slot ambient draw.
pub const AMBIENT_RANGE: (f32, f32) = (0.2, 0.5);

/// Ambient light assignment for the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum AmbientLighting {
    /// One color shared by every slot.
    Fixed([f32; 3]),
    /// One color per slot.
    PerSlot(Vec<[f32; 3]>),
}

impl AmbientLighting {
    /// Per-slot `U(0.2, 0.5)^3` when both randomization switches are on,
    /// [`FIXED_AMBIENT`] otherwise.
    #[must_use]
    pub fn plan(randomize: bool, randomize_lighting: bool, rng: &mut BatchedRng) -> Self {
        if randomize && randomize_lighting {
            Self::PerSlot(rng.uniform3(AMBIENT_RANGE.0, AMBIENT_RANGE.1))
        } else {
            Self::Fixed(FIXED_AMBIENT)
        }
    }

    /// Color of one slot.
    #[must_use]
    pub fn color(&self, slot: usize) -> Option<[f32; 3]> {
        match self {
            Self::Fixed(rgb) => Some(*rgb),
            Self::PerSlot(colors) => colors.get(slot).copied(),
        }
    }
}

// ---------------------------------------------------------------------------
// Robot colors
// ---------------------------------------------------------------------------

/// Link colors to apply after the robot is loaded.
#[derive(Debug, Clone, PartialEq)]
pub enum RobotColorPlan {
    /// Leave the model's materials alone.
    Keep,
    /// Same color on every link of every slot.
    Uniform(Rgba),
    /// One color per link in each slot, indexed `colors[slot][link]`.
    PerSlot(Vec<Vec<Rgba>>),
}

impl RobotColorPlan {
    /// Resolve `color` into concrete link colors for `num_links` links.
    ///
    /// `RandomPerSlot` draws `num_links` colors per slot, one per link, from
    /// that slot's generator in link order. It requires randomization to be
    /// enabled and falls back to [`Keep`](Self::Keep) with a warning
    /// otherwise.
    #[must_use]
    pub fn resolve(
        color: RobotColor,
        randomize: bool,
        num_links: usize,
        rng: &mut BatchedRng,
    ) -> Self {
        match color {
            RobotColor::Default => Self::Keep,
            RobotColor::Fixed(rgb) => Self::Uniform(Rgba::opaque(rgb)),
            RobotColor::RandomPerSlot if randomize => Self::PerSlot(
                (0..rng.len())
                    .map(|slot| {
                        let slot_rng = &mut rng[slot];
                        (0..num_links)
                            .map(|_| Rgba::opaque(sample_rgb(slot_rng)))
                            .collect()
                    })
                    .collect(),
            ),
            RobotColor::RandomPerSlot => {
                warn!("robot_color = \"random\" requires domain randomization; keeping model colors");
                Self::Keep
            }
        }
    }

    /// Whether each slot needs its own robot instance.
    #[must_use]
    pub const fn needs_separate_build(&self) -> bool {
        matches!(self, Self::PerSlot(_))
    }
}

fn sample_rgb<R: rand::Rng + ?Sized>(rng: &mut R) -> [f32; 3] {
    [rng.r#gen(), rng.r#gen(), rng.r#gen()]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
