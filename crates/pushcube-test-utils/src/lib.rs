//! Shared test fixtures for the cube-push crates.
//!
//! Provides deterministic RNG setup and ready-made environments on the
//! headless backend.

pub mod envs;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use envs::{
    loaded_env, place_cube_on_goal, plain_config, random_actions, vec_env, zero_actions,
};
pub use rng::seeded_rng;
