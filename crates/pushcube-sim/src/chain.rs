//! Serial kinematic chain for forward kinematics.
//!
//! A [`KinematicChain`] is an ordered list of revolute joints from the base
//! link to a tool frame. It stores each joint's static origin and axis.

use nalgebra::{Isometry3, Translation3, UnitQuaternion, UnitVector3, Vector3};

/// One revolute joint.
#[derive(Debug, Clone)]
pub struct ChainJoint {
    pub name: &'static str,
    /// Static transform from the parent link frame to this joint frame.
    pub origin: Isometry3<f32>,
    /// Rotation axis in the joint frame.
    pub axis: UnitVector3<f32>,
    pub lower_limit: f32,
    pub upper_limit: f32,
}

impl ChainJoint {
    /// Joint at `xyz` in the parent frame, rotating about `axis`.
    pub fn revolute(
        name: &'static str,
        xyz: [f32; 3],
        axis: [f32; 3],
        limits: (f32, f32),
    ) -> Self {
        Self {
            name,
            origin: translation(xyz),
            axis: UnitVector3::new_normalize(Vector3::from(axis)),
            lower_limit: limits.0,
            upper_limit: limits.1,
        }
    }
}

/// Ordered joints plus a fixed tool offset after the last joint.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    joints: Vec<ChainJoint>,
    tool_offset: Isometry3<f32>,
}

impl KinematicChain {
    #[must_use]
    pub const fn new(joints: Vec<ChainJoint>, tool_offset: Isometry3<f32>) -> Self {
        Self {
            joints,
            tool_offset,
        }
    }

    #[must_use]
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    #[must_use]
    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    /// Tool frame in the chain's base frame.
    ///
    /// Joints beyond `q.len()` stay at zero; extra entries are ignored.
    #[must_use]
    pub fn forward_kinematics(&self, q: &[f32]) -> Isometry3<f32> {
        let mut transform = Isometry3::identity();
        for (i, joint) in self.joints.iter().enumerate() {
            transform *= joint.origin;
            transform *= joint_transform(&joint.axis, q.get(i).copied().unwrap_or(0.0));
        }
        transform * self.tool_offset
    }
}

/// Pure translation.
#[must_use]
pub fn translation(xyz: [f32; 3]) -> Isometry3<f32> {
    Isometry3::from_parts(
        Translation3::new(xyz[0], xyz[1], xyz[2]),
        UnitQuaternion::identity(),
    )
}

fn joint_transform(axis: &UnitVector3<f32>, angle: f32) -> Isometry3<f32> {
    Isometry3::from_parts(
        Translation3::identity(),
        UnitQuaternion::from_axis_angle(axis, angle),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
