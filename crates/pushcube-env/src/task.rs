//! Task hooks and the per-step values they exchange.
//!
//! A batched harness drives a [`TaskEnvironment`] as follows: `load_scene`
//! once, `initialize_episode` on reset (for all or some slots), then per
//! control step `before_control_step`, physics, `evaluate`, observations
//! and rewards.

use std::collections::BTreeMap;

use bevy::math::Vec3;
use pushcube_core::error::PushCubeError;
use pushcube_core::types::{Observation, Pose};

// ---------------------------------------------------------------------------
// Observation groups
// ---------------------------------------------------------------------------

/// Proprioceptive observations, one row per slot.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentObs {
    pub qpos: Vec<Vec<f32>>,
    /// Controller state; present only when the controller keeps one.
    pub controller: Option<Vec<Vec<f32>>>,
}

/// Task observations, one entry per slot.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraObs {
    pub tcp_pos: Vec<Vec3>,
    /// Cube position minus tool position.
    pub tcp_to_obj: Vec<Vec3>,
    /// Cube pose; only in state observation modes.
    pub obj_pose: Option<Vec<Pose>>,
    /// Goal position; only in state observation modes.
    pub goal_pos: Option<Vec<Vec3>>,
}

/// Both observation groups.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskObservation {
    pub agent: AgentObs,
    pub extra: ExtraObs,
}

impl TaskObservation {
    /// Flat vector for one slot in the order qpos, controller, `tcp_pos`,
    /// `tcp_to_obj`, `obj_pose`, `goal_pos` (absent groups skipped).
    #[must_use]
    pub fn flatten(&self, slot: usize) -> Observation {
        let mut obs = Observation::new(Vec::new());
        for (_, values) in self.groups(slot) {
            obs.extend_from_slice(&values);
        }
        obs
    }

    /// Named groups for one slot, keyed `agent/<name>` and `extra/<name>`.
    #[must_use]
    pub fn to_dict(&self, slot: usize) -> BTreeMap<String, Vec<f32>> {
        self.groups(slot)
            .into_iter()
            .map(|(key, values)| (key.to_string(), values))
            .collect()
    }

    fn groups(&self, slot: usize) -> Vec<(&'static str, Vec<f32>)> {
        let mut groups = Vec::with_capacity(6);
        if let Some(qpos) = self.agent.qpos.get(slot) {
            groups.push(("agent/qpos", qpos.clone()));
        }
        if let Some(state) = self.agent.controller.as_ref().and_then(|c| c.get(slot)) {
            groups.push(("agent/controller", state.clone()));
        }
        if let Some(tcp) = self.extra.tcp_pos.get(slot) {
            groups.push(("extra/tcp_pos", tcp.to_array().to_vec()));
        }
        if let Some(delta) = self.extra.tcp_to_obj.get(slot) {
            groups.push(("extra/tcp_to_obj", delta.to_array().to_vec()));
        }
        if let Some(pose) = self.extra.obj_pose.as_ref().and_then(|p| p.get(slot)) {
            groups.push(("extra/obj_pose", pose.raw_pose().to_vec()));
        }
        if let Some(goal) = self.extra.goal_pos.as_ref().and_then(|g| g.get(slot)) {
            groups.push(("extra/goal_pos", goal.to_array().to_vec()));
        }
        groups
    }
}

// ---------------------------------------------------------------------------
// EvalInfo
// ---------------------------------------------------------------------------

/// Per-slot evaluation flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvalInfo {
    pub success: Vec<bool>,
    pub touching_table: Vec<bool>,
}

// ---------------------------------------------------------------------------
// TaskEnvironment
// ---------------------------------------------------------------------------

/// Reward of a successful step; dense rewards are normalized by it.
pub const MAX_DENSE_REWARD: f32 = 3.0;

/// Hooks a batched harness calls on a task.
pub trait TaskEnvironment {
    fn num_envs(&self) -> usize;

    /// Build actors, lights and sensors. Load-time randomization draws from
    /// generators derived from `seed`.
    fn load_scene(&mut self, seed: u64) -> Result<(), PushCubeError>;

    /// Re-randomize the selected slots. Other slots are left untouched.
    fn initialize_episode(&mut self, env_idx: &[usize]) -> Result<(), PushCubeError>;

    /// Runs before each control step's action is applied.
    fn before_control_step(&mut self) -> Result<(), PushCubeError>;

    fn obs_agent(&self) -> Result<AgentObs, PushCubeError>;

    fn obs_extra(&self, info: &EvalInfo) -> Result<ExtraObs, PushCubeError>;

    fn evaluate(&self) -> Result<EvalInfo, PushCubeError>;

    fn compute_dense_reward(&self, info: &EvalInfo) -> Result<Vec<f32>, PushCubeError>;

    /// Dense reward scaled into `[.., 1]`.
    fn compute_normalized_dense_reward(&self, info: &EvalInfo) -> Result<Vec<f32>, PushCubeError> {
        Ok(self
            .compute_dense_reward(info)?
            .into_iter()
            .map(|r| r / MAX_DENSE_REWARD)
            .collect())
    }

    /// Agent and extra observations together.
    fn observe(&self, info: &EvalInfo) -> Result<TaskObservation, PushCubeError> {
        Ok(TaskObservation {
            agent: self.obs_agent()?,
            extra: self.obs_extra(info)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_obs(with_state: bool, with_controller: bool) -> TaskObservation {
        TaskObservation {
            agent: AgentObs {
                qpos: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
                controller: with_controller.then(|| vec![vec![5.0, 6.0], vec![7.0, 8.0]]),
            },
            extra: ExtraObs {
                tcp_pos: vec![Vec3::new(0.1, 0.2, 0.3), Vec3::ZERO],
                tcp_to_obj: vec![Vec3::X, Vec3::Y],
                obj_pose: with_state.then(|| vec![Pose::IDENTITY, Pose::IDENTITY]),
                goal_pos: with_state.then(|| vec![Vec3::Z, Vec3::Z]),
            },
        }
    }

    #[test]
    fn flatten_order_with_everything() {
        let obs = sample_obs(true, true).flatten(0);
        assert_eq!(obs.len(), 2 + 2 + 3 + 3 + 7 + 3);
        assert_eq!(&obs.as_slice()[..4], &[1.0, 2.0, 5.0, 6.0]);
        assert_eq!(&obs.as_slice()[4..7], &[0.1, 0.2, 0.3]);
        assert_eq!(&obs.as_slice()[7..10], &[1.0, 0.0, 0.0]);
        // identity pose: p = 0, q = (1, 0, 0, 0)
        assert_eq!(&obs.as_slice()[10..17], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(&obs.as_slice()[17..], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn flatten_skips_absent_groups() {
        let obs = sample_obs(false, false).flatten(1);
        assert_eq!(obs.as_slice(), &[3.0, 4.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn dict_keys() {
        let dict = sample_obs(true, false).to_dict(0);
        let keys: Vec<_> = dict.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "agent/qpos",
                "extra/goal_pos",
                "extra/obj_pose",
                "extra/tcp_pos",
                "extra/tcp_to_obj"
            ]
        );
    }

    struct Constant;

    impl TaskEnvironment for Constant {
        fn num_envs(&self) -> usize {
            2
        }
        fn load_scene(&mut self, _seed: u64) -> Result<(), PushCubeError> {
            Ok(())
        }
        fn initialize_episode(&mut self, _env_idx: &[usize]) -> Result<(), PushCubeError> {
            Ok(())
        }
        fn before_control_step(&mut self) -> Result<(), PushCubeError> {
            Ok(())
        }
        fn obs_agent(&self) -> Result<AgentObs, PushCubeError> {
            Ok(sample_obs(false, false).agent)
        }
        fn obs_extra(&self, _info: &EvalInfo) -> Result<ExtraObs, PushCubeError> {
            Ok(sample_obs(false, false).extra)
        }
        fn evaluate(&self) -> Result<EvalInfo, PushCubeError> {
            Ok(EvalInfo {
                success: vec![true, false],
                touching_table: vec![false, false],
            })
        }
        fn compute_dense_reward(&self, _info: &EvalInfo) -> Result<Vec<f32>, PushCubeError> {
            Ok(vec![3.0, 1.5])
        }
    }

    #[test]
    fn normalized_reward_divides_by_max() {
        let task = Constant;
        let info = task.evaluate().unwrap();
        assert_eq!(task.compute_normalized_dense_reward(&info).unwrap(), vec![1.0, 0.5]);
    }

    #[test]
    fn observe_combines_groups() {
        let task = Constant;
        let info = task.evaluate().unwrap();
        let obs = task.observe(&info).unwrap();
        assert_eq!(obs.agent.qpos.len(), 2);
        assert!(obs.extra.obj_pose.is_none());
    }

    #[test]
    fn trait_is_object_safe() {
        fn _accepts_boxed(_: Box<dyn TaskEnvironment>) {}
    }
}
