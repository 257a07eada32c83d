//! Environment registry.
//!
//! Environments are looked up by id, e.g. `make("SO100PushCube-v1", config)`.

use pushcube_core::error::{ConfigError, PushCubeError};
use pushcube_sim::backend::SimulationBackend;
use pushcube_sim::robot::RobotAgent;
use pushcube_sim::{HeadlessScene, So100Arm};
use tracing::info;

use crate::config::PushCubeConfig;
use crate::push_cube::PushCubeEnv;
use crate::vec_env::PushCubeVecEnv;

pub const PUSH_CUBE_ID: &str = "SO100PushCube-v1";

/// A registered environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvSpec {
    pub id: &'static str,
    /// Time limit applied by [`make`]; `0` means none.
    pub max_episode_steps: u32,
    pub description: &'static str,
}

static REGISTRY: &[EnvSpec] = &[EnvSpec {
    id: PUSH_CUBE_ID,
    max_episode_steps: 64,
    description: "SO100 arm pushes a cube onto a goal marker",
}];

/// All registered environments.
#[must_use]
pub fn registered() -> &'static [EnvSpec] {
    REGISTRY
}

/// Look up `id`.
pub fn spec(id: &str) -> Result<&'static EnvSpec, ConfigError> {
    REGISTRY
        .iter()
        .find(|spec| spec.id == id)
        .ok_or_else(|| ConfigError::Unsupported {
            kind: "environment id",
            value: id.into(),
        })
}

/// Build `id` on a [`HeadlessScene`] with an [`So100Arm`].
pub fn make(id: &str, config: PushCubeConfig) -> Result<PushCubeVecEnv, PushCubeError> {
    let backend = HeadlessScene::new(config.num_envs);
    make_with(id, config, backend, So100Arm::new())
}

/// Build `id` on the given backend and robot.
pub fn make_with<B: SimulationBackend, R: RobotAgent>(
    id: &str,
    config: PushCubeConfig,
    backend: B,
    robot: R,
) -> Result<PushCubeVecEnv<B, R>, PushCubeError> {
    let spec = spec(id)?;
    info!(
        id = spec.id,
        backend = backend.name(),
        num_envs = config.num_envs,
        obs_mode = %config.obs_mode,
        control_mode = %config.control_mode,
        "making environment"
    );
    let env = PushCubeEnv::new(config, backend, robot)?;
    Ok(PushCubeVecEnv::new(env, spec.max_episode_steps))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_cube_is_registered() {
        let spec = spec("SO100PushCube-v1").unwrap();
        assert_eq!(spec.max_episode_steps, 64);
        assert_eq!(registered().len(), 1);
    }

    #[test]
    fn unknown_id_rejected() {
        let err = spec("PickCube-v1").unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported { kind: "environment id", .. }));
        assert!(make("PickCube-v1", PushCubeConfig::default()).is_err());
    }

    #[test]
    fn make_applies_time_limit() {
        let env = make(PUSH_CUBE_ID, PushCubeConfig::default().with_num_envs(2)).unwrap();
        assert_eq!(env.max_episode_steps(), 64);
        assert_eq!(env.num_envs(), 2);
        assert_eq!(env.action_space().dim(), 6);
    }
}
