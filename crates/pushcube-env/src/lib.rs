//! SO100 cube-push task environment.
//!
//! [`PushCubeEnv`](push_cube::PushCubeEnv) implements the task hooks of
//! [`TaskEnvironment`](task::TaskEnvironment) over any
//! [`SimulationBackend`](pushcube_sim::backend::SimulationBackend) and
//! [`RobotAgent`](pushcube_sim::robot::RobotAgent).
//! [`PushCubeVecEnv`](vec_env::PushCubeVecEnv) adds episode tracking and
//! auto-reset, and [`registry::make`] builds it by id.
//!
//! # Example
//!
//! ```
//! use pushcube_core::types::Action;
//! use pushcube_env::prelude::*;
//!
//! let config = PushCubeConfig::default().with_num_envs(2);
//! let mut env = make("SO100PushCube-v1", config).unwrap();
//! let reset = env.reset(Some(42)).unwrap();
//! assert_eq!(reset.len(), 2);
//! let results = env.step(&vec![Action::zeros(6); 2]).unwrap();
//! assert_eq!(results[0].info.episode_length, 1);
//! ```

pub mod config;
pub mod controller;
pub mod episode;
pub mod push_cube;
pub mod registry;
pub mod sensors;
pub mod table;
pub mod task;
pub mod vec_env;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        config::{PushCubeConfig, RewardMode},
        controller::JointPositionController,
        episode::{EpisodeBatch, EpisodeState, SlotEpisode},
        push_cube::{GOAL_RADIUS, LoadedScene, PushCubeEnv, REST_QPOS},
        registry::{EnvSpec, PUSH_CUBE_ID, make, make_with},
        sensors::{CameraConfig, GreenscreenOverlay, KeptObject, OverlayMode},
        table::TableScene,
        task::{AgentObs, EvalInfo, ExtraObs, MAX_DENSE_REWARD, TaskEnvironment, TaskObservation},
        vec_env::{AutoResetMode, PushCubeVecEnv},
    };
}
