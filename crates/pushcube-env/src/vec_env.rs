//! Gym-style vectorized runner for the cube-push task.
//!
//! [`PushCubeVecEnv`] wraps a [`PushCubeEnv`] and adds what a training loop
//! expects from a registered environment: per-slot episode tracking,
//! success termination, a time limit, and auto-reset of finished slots
//! through a partial `initialize_episode`.

use pushcube_core::error::PushCubeError;
use pushcube_core::types::{Action, ActionSpace, Observation, ResetInfo, ResetResult, StepInfo, StepResult};
use pushcube_sim::backend::SimulationBackend;
use pushcube_sim::robot::RobotAgent;
use pushcube_sim::{HeadlessScene, So100Arm};
use tracing::debug;

use crate::episode::EpisodeBatch;
use crate::push_cube::PushCubeEnv;
use crate::task::TaskEnvironment;

/// What happens to a slot whose episode ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AutoResetMode {
    /// Leave the slot finished until the caller resets it.
    Disabled,
    /// Re-initialize the slot at the end of the step that finished it. The
    /// step returns the new episode's observation and keeps the finished
    /// one in `info.final_observation`.
    #[default]
    Immediate,
}

/// Seed used when the first reset does not provide one.
const DEFAULT_SEED: u64 = 0;

/// Batched runner with episode bookkeeping.
pub struct PushCubeVecEnv<B = HeadlessScene, R = So100Arm> {
    env: PushCubeEnv<B, R>,
    episodes: EpisodeBatch,
    max_episode_steps: u32,
    auto_reset: AutoResetMode,
}

impl<B: SimulationBackend, R: RobotAgent> PushCubeVecEnv<B, R> {
    /// Wrap `env`; `max_episode_steps = 0` disables the time limit.
    #[must_use]
    pub fn new(env: PushCubeEnv<B, R>, max_episode_steps: u32) -> Self {
        let episodes = EpisodeBatch::new(env.num_envs());
        Self {
            env,
            episodes,
            max_episode_steps,
            auto_reset: AutoResetMode::default(),
        }
    }

    #[must_use]
    pub fn with_auto_reset(mut self, mode: AutoResetMode) -> Self {
        self.auto_reset = mode;
        self
    }

    #[must_use]
    pub const fn env(&self) -> &PushCubeEnv<B, R> {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut PushCubeEnv<B, R> {
        &mut self.env
    }

    #[must_use]
    pub const fn episodes(&self) -> &EpisodeBatch {
        &self.episodes
    }

    #[must_use]
    pub const fn max_episode_steps(&self) -> u32 {
        self.max_episode_steps
    }

    #[must_use]
    pub const fn auto_reset(&self) -> AutoResetMode {
        self.auto_reset
    }

    #[must_use]
    pub fn num_envs(&self) -> usize {
        self.env.num_envs()
    }

    #[must_use]
    pub fn action_space(&self) -> ActionSpace {
        self.env.action_space()
    }

    /// Reset every slot.
    ///
    /// The first reset loads the scene with `seed` (or a fixed default).
    /// Later resets with a seed restart the episode generators from it;
    /// the scene itself is never rebuilt.
    pub fn reset(&mut self, seed: Option<u64>) -> Result<Vec<ResetResult>, PushCubeError> {
        if self.env.is_loaded() {
            if let Some(seed) = seed {
                self.env.reseed(seed);
            }
        } else {
            self.env.load_scene(seed.unwrap_or(DEFAULT_SEED))?;
        }
        let all: Vec<usize> = (0..self.num_envs()).collect();
        self.env.initialize_episode(&all)?;
        self.episodes.reset_all(seed);

        let info = self.env.evaluate()?;
        let observations = self.env.observations(&info)?;
        Ok(observations
            .into_iter()
            .enumerate()
            .map(|(slot, observation)| ResetResult {
                observation,
                info: ResetInfo {
                    seed,
                    episode_number: self.episodes.get(slot).map_or(0, |e| e.episode_number),
                },
            })
            .collect())
    }

    /// Reset only `env_idx`; other slots keep their state. Returns the
    /// observation of every slot.
    pub fn reset_envs(&mut self, env_idx: &[usize]) -> Result<Vec<Observation>, PushCubeError> {
        self.env.initialize_episode(env_idx)?;
        self.episodes.reset(env_idx, None);
        let info = self.env.evaluate()?;
        self.env.observations(&info)
    }

    /// Apply one action per slot and advance one control step.
    pub fn step(&mut self, actions: &[Action]) -> Result<Vec<StepResult>, PushCubeError> {
        self.env.step_control(actions)?;
        let info = self.env.evaluate()?;
        let rewards = self.env.compute_reward(&info)?;
        let mut observations = self.env.observations(&info)?;

        let mut terminated = vec![false; self.num_envs()];
        let mut truncated = vec![false; self.num_envs()];
        for slot in 0..self.num_envs() {
            let Some(episode) = self.episodes.get_mut(slot) else {
                continue;
            };
            if !episode.advance(rewards[slot], info.success[slot]) {
                continue;
            }
            if info.success[slot] {
                episode.terminate();
                terminated[slot] = true;
            }
            truncated[slot] = self.max_episode_steps > 0
                && episode.step_count >= self.max_episode_steps;
            episode.check_truncation(self.max_episode_steps);
        }

        let mut results: Vec<StepResult> = (0..self.num_envs())
            .map(|slot| {
                let episode = self.episodes.get(slot).cloned().unwrap_or_default();
                StepResult {
                    observation: Observation::new(Vec::new()),
                    reward: rewards[slot],
                    terminated: terminated[slot],
                    truncated: truncated[slot],
                    info: StepInfo {
                        episode_length: episode.step_count,
                        episode_reward: episode.total_reward,
                        success: info.success[slot],
                        touching_table: info.touching_table[slot],
                        final_observation: None,
                    },
                }
            })
            .collect();

        // Immediate mode resets every ended slot, so the done set is exactly
        // the slots that ended on this step.
        let finished = match self.auto_reset {
            AutoResetMode::Immediate => self.episodes.done_slots(),
            AutoResetMode::Disabled => Vec::new(),
        };
        if !finished.is_empty() {
            debug!(slots = ?finished, "auto-resetting finished episodes");
            for slot in &finished {
                results[*slot].info.final_observation = Some(observations[*slot].clone());
            }
            let fresh = self.reset_envs(&finished)?;
            for slot in &finished {
                observations[*slot] = fresh[*slot].clone();
            }
        }

        for (result, observation) in results.iter_mut().zip(observations) {
            result.observation = observation;
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PushCubeConfig;
    use crate::episode::EpisodeState;
    use bevy::math::Vec3;
    use pushcube_core::error::SimError;
    use pushcube_core::types::Pose;

    fn vec_env(num_envs: usize, max_steps: u32) -> PushCubeVecEnv {
        let config = PushCubeConfig::default()
            .with_num_envs(num_envs)
            .with_domain_randomization(false);
        PushCubeVecEnv::new(PushCubeEnv::headless(config).unwrap(), max_steps)
    }

    fn zeros(n: usize) -> Vec<Action> {
        vec![Action::zeros(6); n]
    }

    /// Put slot's cube exactly on its goal.
    fn place_on_goal(env: &mut PushCubeVecEnv, slot: usize) {
        let scene = env.env().scene().unwrap().clone();
        let goal = env.env().backend().poses(scene.goal_region).unwrap()[slot];
        let half = scene.cube_properties.half_sizes[slot];
        let pose = Pose::from_translation(Vec3::new(goal.p.x, goal.p.y, half));
        env.env_mut()
            .backend_mut()
            .set_poses(scene.cube, &[slot], &[pose])
            .unwrap();
    }

    #[test]
    fn step_before_reset_fails() {
        let mut env = vec_env(1, 10);
        assert!(matches!(
            env.step(&zeros(1)),
            Err(PushCubeError::Simulation(SimError::SceneNotLoaded))
        ));
    }

    #[test]
    fn reset_reports_episode_numbers() {
        let mut env = vec_env(2, 10);
        let first = env.reset(Some(5)).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].info.episode_number, 1);
        assert_eq!(first[0].info.seed, Some(5));
        let second = env.reset(None).unwrap();
        assert_eq!(second[0].info.episode_number, 2);
    }

    #[test]
    fn truncates_at_time_limit_and_auto_resets() {
        let mut env = vec_env(1, 3);
        env.reset(Some(0)).unwrap();
        for _ in 0..2 {
            let r = env.step(&zeros(1)).unwrap();
            assert!(!r[0].truncated);
        }
        let r = env.step(&zeros(1)).unwrap();
        assert!(r[0].truncated);
        assert!(!r[0].terminated);
        assert_eq!(r[0].info.episode_length, 3);
        assert!(r[0].info.final_observation.is_some());
        assert_eq!(env.episodes().get(0).unwrap().episode_number, 2);
        assert_eq!(env.episodes().get(0).unwrap().step_count, 0);
    }

    #[test]
    fn success_terminates_with_full_reward() {
        let mut env = vec_env(2, 64);
        env.reset(Some(0)).unwrap();
        place_on_goal(&mut env, 1);
        let r = env.step(&zeros(2)).unwrap();
        assert!(r[1].terminated);
        assert!(r[1].info.success);
        assert!((r[1].reward - 1.0).abs() < 1e-6);
        assert!(!r[0].terminated);
        assert!(r[0].reward < 1.0);
    }

    #[test]
    fn disabled_auto_reset_keeps_slot_finished() {
        let mut env = vec_env(1, 1).with_auto_reset(AutoResetMode::Disabled);
        env.reset(Some(0)).unwrap();
        let r = env.step(&zeros(1)).unwrap();
        assert!(r[0].truncated);
        assert!(r[0].info.final_observation.is_none());
        assert_eq!(env.episodes().get(0).unwrap().state, EpisodeState::Truncated);

        let r = env.step(&zeros(1)).unwrap();
        assert!(!r[0].truncated);
        assert_eq!(r[0].info.episode_length, 1);

        env.reset_envs(&[0]).unwrap();
        assert_eq!(env.episodes().get(0).unwrap().state, EpisodeState::Running);
    }

    #[test]
    fn auto_reset_moves_only_finished_slot() {
        let mut env = vec_env(2, 64);
        env.reset(Some(0)).unwrap();
        place_on_goal(&mut env, 0);
        let cube = env.env().scene().unwrap().cube;
        let before = env.env().backend().poses(cube).unwrap();
        let r = env.step(&zeros(2)).unwrap();
        assert!(r[0].terminated);
        let after = env.env().backend().poses(cube).unwrap();
        assert_ne!(before[0], after[0]);
        assert_eq!(before[1], after[1]);
    }
}
