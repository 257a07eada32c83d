//! Types, seeds, config and errors for the cube-push task environment.

pub mod config;
pub mod error;
pub mod seed;
pub mod types;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        config::{ControlMode, ObsMode, SimConfig},
        error::{ConfigError, PushCubeError, SimError, ValidationError},
        seed::{BatchedRng, SeedHierarchy, derive_seed, derive_seed_indexed},
        types::{
            Action, ActionSpace, Observation, Pose, ResetInfo, ResetResult, Rgba, StepInfo,
            StepResult,
        },
    };
}
