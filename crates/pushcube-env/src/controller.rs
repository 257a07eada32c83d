//! Joint position controller.
//!
//! Maps one action per slot to joint drive targets according to the
//! [`ControlMode`]:
//!
//! | Mode | Action space | Target |
//! |------|--------------|--------|
//! | `pd_joint_pos` | joint limits | action clipped to the limits |
//! | `pd_joint_delta_pos` | `[-1, 1]` | measured qpos + action scaled to `±0.1` rad |
//! | `pd_joint_target_delta_pos` | `[-1, 1]` | previous target + action scaled to `±0.1` rad |
//!
//! Only the target-delta mode carries state between steps; that state (the
//! target qpos) is what the controller contributes to agent observations.

use pushcube_core::config::ControlMode;
use pushcube_core::error::{SimError, ValidationError};
use pushcube_core::types::{Action, ActionSpace};

/// Bound of one delta step in radians.
pub const DELTA_BOUND: f32 = 0.1;

/// Batched joint position controller.
#[derive(Debug, Clone)]
pub struct JointPositionController {
    mode: ControlMode,
    limits: Vec<(f32, f32)>,
    targets: Vec<Vec<f32>>,
}

impl JointPositionController {
    /// Controller for `num_envs` slots of an arm with the given joint limits.
    /// Targets start at zero until [`reset`](Self::reset).
    #[must_use]
    pub fn new(mode: ControlMode, limits: &[(f32, f32)], num_envs: usize) -> Self {
        Self {
            mode,
            limits: limits.to_vec(),
            targets: vec![vec![0.0; limits.len()]; num_envs],
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ControlMode {
        self.mode
    }

    #[must_use]
    pub fn dof(&self) -> usize {
        self.limits.len()
    }

    #[must_use]
    pub fn num_envs(&self) -> usize {
        self.targets.len()
    }

    /// Space actions are drawn from before clipping.
    #[must_use]
    pub fn action_space(&self) -> ActionSpace {
        match self.mode {
            ControlMode::PdJointPos => ActionSpace {
                low: self.limits.iter().map(|(lo, _)| *lo).collect(),
                high: self.limits.iter().map(|(_, hi)| *hi).collect(),
            },
            ControlMode::PdJointDeltaPos | ControlMode::PdJointTargetDeltaPos => {
                ActionSpace::normalized(self.dof())
            }
        }
    }

    /// Set the stored targets of `env_idx` to the joint positions the slots
    /// were reset to. `qpos` has one row per index.
    pub fn reset(&mut self, env_idx: &[usize], qpos: &[Vec<f32>]) -> Result<(), SimError> {
        if qpos.len() != env_idx.len() {
            return Err(SimError::LengthMismatch {
                what: "controller reset qpos",
                expected: env_idx.len(),
                got: qpos.len(),
            });
        }
        for (slot, row) in env_idx.iter().zip(qpos) {
            let num_envs = self.num_envs();
            let target = self
                .targets
                .get_mut(*slot)
                .ok_or(SimError::SlotOutOfRange {
                    slot: *slot,
                    num_envs,
                })?;
            target.clone_from(row);
        }
        Ok(())
    }

    /// Compute drive targets for every slot from `actions` and the measured
    /// joint positions.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] if the batch size or any action's dimension is
    /// wrong, or an action contains NaN/Inf.
    pub fn set_action(
        &mut self,
        actions: &[Action],
        qpos: &[Vec<f32>],
    ) -> Result<Vec<Vec<f32>>, ValidationError> {
        if actions.len() != self.num_envs() {
            return Err(ValidationError::BatchSizeMismatch {
                expected: self.num_envs(),
                got: actions.len(),
            });
        }
        for action in actions {
            action.validate(self.dof())?;
        }

        let low = vec![-DELTA_BOUND; self.dof()];
        let high = vec![DELTA_BOUND; self.dof()];
        for (slot, action) in actions.iter().enumerate() {
            let target = match self.mode {
                ControlMode::PdJointPos => action
                    .as_slice()
                    .iter()
                    .zip(&self.limits)
                    .map(|(a, (lo, hi))| a.clamp(*lo, *hi))
                    .collect(),
                ControlMode::PdJointDeltaPos => {
                    let delta = action.clipped().scale(&low, &high);
                    add(&qpos[slot], &delta)
                }
                ControlMode::PdJointTargetDeltaPos => {
                    let delta = action.clipped().scale(&low, &high);
                    add(&self.targets[slot], &delta)
                }
            };
            self.targets[slot] = target;
        }
        Ok(self.targets.clone())
    }

    /// Target qpos per slot in target-delta mode; `None` for stateless modes.
    #[must_use]
    pub fn state(&self) -> Option<&[Vec<f32>]> {
        match self.mode {
            ControlMode::PdJointTargetDeltaPos => Some(&self.targets),
            ControlMode::PdJointPos | ControlMode::PdJointDeltaPos => None,
        }
    }
}

fn add(base: &[f32], delta: &[f32]) -> Vec<f32> {
    base.iter().zip(delta).map(|(b, d)| b + d).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
