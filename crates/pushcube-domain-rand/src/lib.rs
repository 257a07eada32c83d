//! Load-time and per-step randomization for the cube-push task.
//!
//! Randomization happens at two points: once when the scene is loaded
//! (cube geometry, friction, colors, lighting, camera fov) and on every
//! reset or control step (camera mount pose). All per-slot draws go through
//! [`BatchedRng`](pushcube_core::seed::BatchedRng) so a slot's values do not
//! depend on how many slots the batch has.
//!
//! # Example
//!
//! ```
//! use pushcube_core::seed::BatchedRng;
//! use pushcube_domain_rand::prelude::*;
//!
//! let config = DomainRandomizationConfig::default();
//! let cubes = CubeRandomizer::from_config(&config)
//!     .unwrap()
//!     .sample(&mut BatchedRng::new(0, 4));
//! assert_eq!(cubes.len(), 4);
//! ```

pub mod camera;
pub mod config;
pub mod randomizers;
pub mod ranges;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        camera::{BaseCameraSettings, CameraPoseSampler},
        config::{DomainRandomizationConfig, RobotColor},
        randomizers::{AmbientLighting, CubeProperties, CubeRandomizer, RobotColorPlan},
        ranges::{RandomizationRange, RangeError},
    };
}
