//! Ready-made environments on the headless backend.

use bevy::math::Vec3;
use pushcube_core::types::{Action, Pose};
use pushcube_env::config::PushCubeConfig;
use pushcube_env::push_cube::PushCubeEnv;
use pushcube_env::registry::{PUSH_CUBE_ID, make};
use pushcube_env::task::TaskEnvironment;
use pushcube_env::vec_env::PushCubeVecEnv;
use pushcube_sim::backend::SimulationBackend;
use rand::Rng;

/// Config with `num_envs` slots and every randomization off.
#[must_use]
pub fn plain_config(num_envs: usize) -> PushCubeConfig {
    PushCubeConfig::default()
        .with_num_envs(num_envs)
        .with_domain_randomization(false)
}

/// Headless task with the scene loaded from `seed` and every slot
/// initialized.
///
/// # Panics
///
/// Panics if the config is invalid.
#[must_use]
pub fn loaded_env(config: PushCubeConfig, seed: u64) -> PushCubeEnv {
    let mut env = PushCubeEnv::headless(config).expect("valid config");
    env.load_scene(seed).expect("scene loads once");
    let all: Vec<usize> = (0..env.num_envs()).collect();
    env.initialize_episode(&all).expect("slots in range");
    env
}

/// Registered vectorized env, reset with `seed`.
///
/// # Panics
///
/// Panics if the config is invalid.
#[must_use]
pub fn vec_env(config: PushCubeConfig, seed: u64) -> PushCubeVecEnv {
    let mut env = make(PUSH_CUBE_ID, config).expect("registered env");
    env.reset(Some(seed)).expect("reset succeeds");
    env
}

/// Move the cube of `slot` onto its goal marker, resting on the table.
///
/// # Panics
///
/// Panics if the scene is not loaded or `slot` is out of range.
pub fn place_cube_on_goal(env: &mut PushCubeEnv, slot: usize) {
    let scene = env.scene().expect("scene loaded").clone();
    let goal = env.backend().poses(scene.goal_region).expect("goal exists")[slot];
    let half = scene.cube_properties.half_sizes[slot];
    let pose = Pose::from_translation(Vec3::new(goal.p.x, goal.p.y, half));
    env.backend_mut()
        .set_poses(scene.cube, &[slot], &[pose])
        .expect("slot in range");
}

/// One zero action per slot.
#[must_use]
pub fn zero_actions(num_envs: usize, dim: usize) -> Vec<Action> {
    vec![Action::zeros(dim); num_envs]
}

/// One uniform `[-1, 1]` action per slot.
#[must_use]
pub fn random_actions<R: Rng>(rng: &mut R, num_envs: usize, dim: usize) -> Vec<Action> {
    (0..num_envs)
        .map(|_| Action::new((0..dim).map(|_| rng.gen_range(-1.0..=1.0)).collect()))
        .collect()
}
