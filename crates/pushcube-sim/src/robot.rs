//! Robot agent trait.
//!
//! The task sets joint positions, base poses and link colors on the arm and
//! reads back joint state and the tool center point. Drive targets come from
//! the task's controller; [`RobotAgent::advance`] moves the joints toward
//! them for one physics step.

use bevy::math::Vec3;
use pushcube_core::error::SimError;
use pushcube_core::types::{Pose, Rgba};

use crate::actor::LinkId;

/// Arm driven by the task, batched over `num_envs` slots.
pub trait RobotAgent: Send + Sync {
    /// Robot identifier, e.g. `"so100"`.
    fn uid(&self) -> &str;

    /// Number of actuated joints.
    fn dof(&self) -> usize;

    /// Per-joint `(lower, upper)` position limits.
    fn joint_limits(&self) -> &[(f32, f32)];

    /// Instantiate the arm in every slot at `base_pose`. With
    /// `build_separate` each slot gets its own link materials.
    fn load(&mut self, num_envs: usize, base_pose: Pose, build_separate: bool)
    -> Result<(), SimError>;

    fn is_loaded(&self) -> bool;

    /// Whether each slot owns its link materials.
    fn is_built_separately(&self) -> bool;

    /// Joint positions, one row per slot.
    fn qpos(&self) -> Vec<Vec<f32>>;

    /// Teleport joints; one row per index, or one row broadcast. Velocities
    /// are zeroed and drive targets set to the new positions.
    fn set_qpos(&mut self, env_idx: &[usize], qpos: &[Vec<f32>]) -> Result<(), SimError>;

    /// Joint velocities, one row per slot.
    fn qvel(&self) -> Vec<Vec<f32>>;

    fn base_pose(&self) -> Vec<Pose>;

    fn set_base_pose(&mut self, env_idx: &[usize], pose: Pose) -> Result<(), SimError>;

    /// Tool center point in world coordinates, one per slot.
    fn tcp_pos(&self) -> Vec<Vec3>;

    /// All links in model order.
    fn links(&self) -> Vec<LinkId>;

    fn link_name(&self, link: LinkId) -> Option<&str>;

    fn link_color(&self, slot: usize, link: LinkId) -> Result<Rgba, SimError>;

    /// Recolor one link. When materials are shared across slots this
    /// recolors the link in every slot.
    fn set_link_color(&mut self, slot: usize, link: LinkId, color: Rgba) -> Result<(), SimError>;

    /// Drive targets, one row per slot.
    fn drive_targets(&self) -> Vec<Vec<f32>>;

    fn set_drive_targets(&mut self, env_idx: &[usize], targets: &[Vec<f32>])
    -> Result<(), SimError>;

    /// Advance joint state by one physics step of `dt` seconds.
    fn advance(&mut self, dt: f32);

    /// The two gripper finger links used for contact checks.
    fn finger_links(&self) -> (LinkId, LinkId);
}
