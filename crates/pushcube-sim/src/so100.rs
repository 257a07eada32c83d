//! Reference SO100 arm.
//!
//! Five revolute arm joints plus a gripper joint. Joints track their drive
//! targets with a first-order response capped at [`MAX_JOINT_VELOCITY`];
//! the tool center point comes from the arm chain's forward kinematics.

use std::f32::consts::PI;

use bevy::math::Vec3;
use nalgebra::Isometry3;
use pushcube_core::error::SimError;
use pushcube_core::types::{Pose, Rgba};

use crate::actor::LinkId;
use crate::chain::{ChainJoint, KinematicChain, translation};
use crate::robot::RobotAgent;

/// Robot identifier accepted by the task.
pub const SO100_UID: &str = "so100";

/// Joint velocity per radian of tracking error (1/s).
pub const TRACKING_GAIN: f32 = 20.0;

/// Joint speed cap in rad/s.
pub const MAX_JOINT_VELOCITY: f32 = 3.0;

const LINK_NAMES: [&str; 7] = [
    "Base",
    "Rotation_Pitch",
    "Upper_Arm",
    "Lower_Arm",
    "Wrist_Pitch_Roll",
    "Fixed_Jaw",
    "Moving_Jaw",
];
const FIXED_JAW: LinkId = LinkId(5);
const MOVING_JAW: LinkId = LinkId(6);

const GRIPPER_LIMITS: (f32, f32) = (-0.2, 2.0);

fn arm_chain() -> KinematicChain {
    KinematicChain::new(
        vec![
            ChainJoint::revolute("shoulder_pan", [0.0, 0.0, 0.0624], [0.0, 0.0, 1.0], (-2.0, 2.0)),
            ChainJoint::revolute(
                "shoulder_lift",
                [0.0, -0.0306, 0.0542],
                [1.0, 0.0, 0.0],
                (-0.2, 3.5),
            ),
            ChainJoint::revolute(
                "elbow_flex",
                [0.0, -0.028, 0.1127],
                [1.0, 0.0, 0.0],
                (-PI, 0.2),
            ),
            ChainJoint::revolute(
                "wrist_flex",
                [0.0, -0.1349, 0.0052],
                [1.0, 0.0, 0.0],
                (-2.0, 1.8),
            ),
            ChainJoint::revolute(
                "wrist_roll",
                [0.0, -0.0611, 0.0181],
                [0.0, 1.0, 0.0],
                (-PI, PI),
            ),
        ],
        translation([0.0, -0.1, 0.0]),
    )
}

#[derive(Debug, Clone)]
struct SlotState {
    qpos: Vec<f32>,
    qvel: Vec<f32>,
    targets: Vec<f32>,
    base_pose: Pose,
    colors: Vec<Rgba>,
}

// ---------------------------------------------------------------------------
// So100Arm
// ---------------------------------------------------------------------------

/// Batched SO100 arm.
#[derive(Debug, Clone)]
pub struct So100Arm {
    chain: KinematicChain,
    limits: Vec<(f32, f32)>,
    slots: Vec<SlotState>,
    separate: bool,
}

impl Default for So100Arm {
    fn default() -> Self {
        Self::new()
    }
}

impl So100Arm {
    #[must_use]
    pub fn new() -> Self {
        let chain = arm_chain();
        let mut limits: Vec<_> = chain
            .joints()
            .iter()
            .map(|j| (j.lower_limit, j.upper_limit))
            .collect();
        limits.push(GRIPPER_LIMITS);
        Self {
            chain,
            limits,
            slots: Vec::new(),
            separate: false,
        }
    }

    fn check_loaded(&self) -> Result<(), SimError> {
        if self.slots.is_empty() {
            return Err(SimError::RobotNotLoaded);
        }
        Ok(())
    }

    fn check_slots(&self, env_idx: &[usize]) -> Result<(), SimError> {
        self.check_loaded()?;
        if let Some(slot) = env_idx.iter().find(|s| **s >= self.slots.len()) {
            return Err(SimError::SlotOutOfRange {
                slot: *slot,
                num_envs: self.slots.len(),
            });
        }
        Ok(())
    }

    fn check_rows(
        &self,
        what: &'static str,
        env_idx: &[usize],
        rows: &[Vec<f32>],
    ) -> Result<(), SimError> {
        if rows.len() != 1 && rows.len() != env_idx.len() {
            return Err(SimError::LengthMismatch {
                what,
                expected: env_idx.len(),
                got: rows.len(),
            });
        }
        if let Some(row) = rows.iter().find(|row| row.len() != self.dof()) {
            return Err(SimError::LengthMismatch {
                what,
                expected: self.dof(),
                got: row.len(),
            });
        }
        Ok(())
    }

    fn check_link(&self, link: LinkId) -> Result<(), SimError> {
        if link.0 >= LINK_NAMES.len() {
            return Err(SimError::LinkNotFound(format!("#{}", link.0)));
        }
        Ok(())
    }

    /// Tool frame in the robot base frame for one joint configuration.
    #[must_use]
    pub fn tcp_local(&self, qpos: &[f32]) -> Isometry3<f32> {
        self.chain.forward_kinematics(qpos)
    }
}

fn row(rows: &[Vec<f32>], i: usize) -> &[f32] {
    if rows.len() == 1 { &rows[0] } else { &rows[i] }
}

impl RobotAgent for So100Arm {
    #[allow(clippy::unnecessary_literal_bound)]
    fn uid(&self) -> &str {
        SO100_UID
    }

    fn dof(&self) -> usize {
        self.limits.len()
    }

    fn joint_limits(&self) -> &[(f32, f32)] {
        &self.limits
    }

    fn load(
        &mut self,
        num_envs: usize,
        base_pose: Pose,
        build_separate: bool,
    ) -> Result<(), SimError> {
        if num_envs == 0 {
            return Err(SimError::SlotOutOfRange { slot: 0, num_envs });
        }
        let dof = self.dof();
        self.separate = build_separate;
        self.slots = (0..num_envs)
            .map(|_| SlotState {
                qpos: vec![0.0; dof],
                qvel: vec![0.0; dof],
                targets: vec![0.0; dof],
                base_pose,
                colors: vec![Rgba::WHITE; LINK_NAMES.len()],
            })
            .collect();
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        !self.slots.is_empty()
    }

    fn is_built_separately(&self) -> bool {
        self.separate
    }

    fn qpos(&self) -> Vec<Vec<f32>> {
        self.slots.iter().map(|s| s.qpos.clone()).collect()
    }

    fn set_qpos(&mut self, env_idx: &[usize], qpos: &[Vec<f32>]) -> Result<(), SimError> {
        self.check_slots(env_idx)?;
        self.check_rows("qpos", env_idx, qpos)?;
        for (i, slot) in env_idx.iter().enumerate() {
            let state = &mut self.slots[*slot];
            state.qpos.copy_from_slice(row(qpos, i));
            state.targets.copy_from_slice(row(qpos, i));
            state.qvel.fill(0.0);
        }
        Ok(())
    }

    fn qvel(&self) -> Vec<Vec<f32>> {
        self.slots.iter().map(|s| s.qvel.clone()).collect()
    }

    fn base_pose(&self) -> Vec<Pose> {
        self.slots.iter().map(|s| s.base_pose).collect()
    }

    fn set_base_pose(&mut self, env_idx: &[usize], pose: Pose) -> Result<(), SimError> {
        self.check_slots(env_idx)?;
        for slot in env_idx {
            self.slots[*slot].base_pose = pose;
        }
        Ok(())
    }

    fn tcp_pos(&self) -> Vec<Vec3> {
        self.slots
            .iter()
            .map(|s| {
                let t = self.tcp_local(&s.qpos).translation;
                s.base_pose.p + s.base_pose.q * Vec3::new(t.x, t.y, t.z)
            })
            .collect()
    }

    fn links(&self) -> Vec<LinkId> {
        (0..LINK_NAMES.len()).map(LinkId).collect()
    }

    fn link_name(&self, link: LinkId) -> Option<&str> {
        LINK_NAMES.get(link.0).copied()
    }

    fn link_color(&self, slot: usize, link: LinkId) -> Result<Rgba, SimError> {
        self.check_slots(&[slot])?;
        self.check_link(link)?;
        Ok(self.slots[slot].colors[link.0])
    }

    fn set_link_color(&mut self, slot: usize, link: LinkId, color: Rgba) -> Result<(), SimError> {
        self.check_slots(&[slot])?;
        self.check_link(link)?;
        if self.separate {
            self.slots[slot].colors[link.0] = color;
        } else {
            for state in &mut self.slots {
                state.colors[link.0] = color;
            }
        }
        Ok(())
    }

    fn drive_targets(&self) -> Vec<Vec<f32>> {
        self.slots.iter().map(|s| s.targets.clone()).collect()
    }

    fn set_drive_targets(
        &mut self,
        env_idx: &[usize],
        targets: &[Vec<f32>],
    ) -> Result<(), SimError> {
        self.check_slots(env_idx)?;
        self.check_rows("drive targets", env_idx, targets)?;
        for (i, slot) in env_idx.iter().enumerate() {
            let state = &mut self.slots[*slot];
            for ((target, value), (lo, hi)) in state
                .targets
                .iter_mut()
                .zip(row(targets, i))
                .zip(&self.limits)
            {
                *target = value.clamp(*lo, *hi);
            }
        }
        Ok(())
    }

    fn advance(&mut self, dt: f32) {
        for state in &mut self.slots {
            for ((q, v), target) in state
                .qpos
                .iter_mut()
                .zip(state.qvel.iter_mut())
                .zip(&state.targets)
            {
                *v = ((target - *q) * TRACKING_GAIN).clamp(-MAX_JOINT_VELOCITY, MAX_JOINT_VELOCITY);
                *q += *v * dt;
            }
        }
    }

    fn finger_links(&self) -> (LinkId, LinkId) {
        (FIXED_JAW, MOVING_JAW)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    const REST: [f32; 6] = [0.0, 0.0, 0.0, FRAC_PI_2, FRAC_PI_2, 0.0];

    fn loaded(num_envs: usize, separate: bool) -> So100Arm {
        let mut arm = So100Arm::new();
        arm.load(num_envs, Pose::from_yaw(Vec3::ZERO, FRAC_PI_2), separate)
            .unwrap();
        arm
    }

    #[test]
    fn six_dof_seven_links() {
        let arm = So100Arm::new();
        assert_eq!(arm.dof(), 6);
        assert_eq!(arm.links().len(), 7);
        assert_eq!(arm.uid(), "so100");
        assert_eq!(arm.link_name(LinkId(5)), Some("Fixed_Jaw"));
        assert_eq!(arm.link_name(LinkId(7)), None);
    }

    #[test]
    fn rest_pose_within_limits() {
        let arm = So100Arm::new();
        for (q, (lo, hi)) in REST.iter().zip(arm.joint_limits()) {
            assert!(q >= lo && q <= hi);
        }
    }

    #[test]
    fn unloaded_arm_rejects_writes() {
        let mut arm = So100Arm::new();
        assert!(!arm.is_loaded());
        assert!(matches!(
            arm.set_qpos(&[0], &[REST.to_vec()]),
            Err(SimError::RobotNotLoaded)
        ));
        assert!(arm.qpos().is_empty());
    }

    #[test]
    fn rest_tcp_in_front_of_base_above_table() {
        let mut arm = loaded(1, false);
        arm.set_qpos(&[0], &[REST.to_vec()]).unwrap();
        let tcp = arm.tcp_pos()[0];
        assert!(tcp.x > 0.1 && tcp.x < 0.35, "tcp {tcp}");
        assert!(tcp.y.abs() < 1e-4);
        assert!(tcp.z > 0.0);
    }

    #[test]
    fn set_qpos_subset_leaves_others() {
        let mut arm = loaded(3, false);
        arm.set_qpos(&[1], &[REST.to_vec()]).unwrap();
        let qpos = arm.qpos();
        assert_eq!(qpos[1], REST.to_vec());
        assert_eq!(qpos[0], vec![0.0; 6]);
        assert_eq!(arm.drive_targets()[1], REST.to_vec());
    }

    #[test]
    fn set_qpos_wrong_width() {
        let mut arm = loaded(1, false);
        assert!(matches!(
            arm.set_qpos(&[0], &[vec![0.0; 5]]),
            Err(SimError::LengthMismatch { expected: 6, got: 5, .. })
        ));
    }

    #[test]
    fn joints_converge_to_targets() {
        let mut arm = loaded(1, false);
        arm.set_drive_targets(&[0], &[vec![0.3, 0.2, -0.1, 0.5, 0.0, 0.1]])
            .unwrap();
        for _ in 0..200 {
            arm.advance(0.01);
        }
        let q = &arm.qpos()[0];
        assert_relative_eq!(q[0], 0.3, epsilon = 1e-3);
        assert_relative_eq!(q[3], 0.5, epsilon = 1e-3);
        assert!(arm.qvel()[0].iter().all(|v| v.abs() < 0.05));
    }

    #[test]
    fn velocity_is_capped() {
        let mut arm = loaded(1, false);
        arm.set_drive_targets(&[0], &[vec![1.9, 0.0, 0.0, 0.0, 0.0, 0.0]])
            .unwrap();
        arm.advance(0.01);
        assert_relative_eq!(arm.qvel()[0][0], MAX_JOINT_VELOCITY);
    }

    #[test]
    fn drive_targets_clamped_to_limits() {
        let mut arm = loaded(1, false);
        arm.set_drive_targets(&[0], &[vec![10.0; 6]]).unwrap();
        let targets = &arm.drive_targets()[0];
        for (t, (_, hi)) in targets.iter().zip(arm.joint_limits()) {
            assert_relative_eq!(*t, *hi);
        }
    }

    #[test]
    fn shared_materials_recolor_every_slot() {
        let mut arm = loaded(2, false);
        arm.set_link_color(0, LinkId(2), Rgba::RED).unwrap();
        assert_eq!(arm.link_color(1, LinkId(2)).unwrap(), Rgba::RED);
    }

    #[test]
    fn separate_build_recolors_one_slot() {
        let mut arm = loaded(2, true);
        assert!(arm.is_built_separately());
        arm.set_link_color(0, LinkId(2), Rgba::RED).unwrap();
        assert_eq!(arm.link_color(0, LinkId(2)).unwrap(), Rgba::RED);
        assert_eq!(arm.link_color(1, LinkId(2)).unwrap(), Rgba::WHITE);
    }

    #[test]
    fn bad_link_errors() {
        let mut arm = loaded(1, false);
        assert!(matches!(
            arm.set_link_color(0, LinkId(99), Rgba::RED),
            Err(SimError::LinkNotFound(_))
        ));
    }

    #[test]
    fn base_pose_moves_tcp() {
        let mut arm = loaded(2, false);
        let before = arm.tcp_pos()[1];
        arm.set_base_pose(&[1], Pose::from_yaw(Vec3::new(0.0, 0.0, 0.1), FRAC_PI_2))
            .unwrap();
        let after = arm.tcp_pos()[1];
        assert_relative_eq!(after.z - before.z, 0.1, epsilon = 1e-5);
        assert_eq!(arm.base_pose()[0], Pose::from_yaw(Vec3::ZERO, FRAC_PI_2));
    }

    #[test]
    fn finger_links_are_jaws() {
        let arm = So100Arm::new();
        let (a, b) = arm.finger_links();
        assert_eq!(arm.link_name(a), Some("Fixed_Jaw"));
        assert_eq!(arm.link_name(b), Some("Moving_Jaw"));
    }
}
