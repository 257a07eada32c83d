use bevy::math::{Mat3, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Pose
// ---------------------------------------------------------------------------

/// Rigid transform: position plus unit-quaternion orientation.
///
/// Frames follow the simulator convention: z is up, and a camera frame looks
/// along its local +x with +y to the left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub p: Vec3,
    pub q: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Self = Self {
        p: Vec3::ZERO,
        q: Quat::IDENTITY,
    };

    #[must_use]
    pub const fn new(p: Vec3, q: Quat) -> Self {
        Self { p, q }
    }

    #[must_use]
    pub const fn from_translation(p: Vec3) -> Self {
        Self {
            p,
            q: Quat::IDENTITY,
        }
    }

    /// Rotation about the world z axis.
    #[must_use]
    pub fn from_yaw(p: Vec3, yaw: f32) -> Self {
        Self {
            p,
            q: Quat::from_rotation_z(yaw),
        }
    }

    /// Pose at `eye` looking toward `target` with world z as the up hint.
    ///
    /// The rotation columns are `[forward, left, up]`. When `forward` is
    /// parallel to z, any orthonormal `left` is used.
    #[must_use]
    pub fn look_at(eye: Vec3, target: Vec3) -> Self {
        let forward = (target - eye).try_normalize().unwrap_or(Vec3::X);
        let left = Vec3::Z
            .cross(forward)
            .try_normalize()
            .unwrap_or_else(|| forward.any_orthonormal_vector());
        let up = forward.cross(left);
        let q = Quat::from_mat3(&Mat3::from_cols(forward, left, up)).normalize();
        Self { p: eye, q }
    }

    /// Position in the xy plane.
    #[must_use]
    pub fn xy(&self) -> Vec2 {
        self.p.truncate()
    }

    /// Position followed by the quaternion in `w, x, y, z` order.
    #[must_use]
    pub fn raw_pose(&self) -> [f32; 7] {
        [
            self.p.x, self.p.y, self.p.z, self.q.w, self.q.x, self.q.y, self.q.z,
        ]
    }

    /// Local x axis expressed in the world frame (camera view axis).
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.q * Vec3::X
    }
}

// ---------------------------------------------------------------------------
// Rgba
// ---------------------------------------------------------------------------

/// Linear RGBA color with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba(pub [f32; 4]);

impl Rgba {
    pub const WHITE: Self = Self([1.0, 1.0, 1.0, 1.0]);
    pub const RED: Self = Self([1.0, 0.0, 0.0, 1.0]);

    /// Opaque color from an RGB triple.
    #[must_use]
    pub const fn opaque(rgb: [f32; 3]) -> Self {
        Self([rgb[0], rgb[1], rgb[2], 1.0])
    }

    #[must_use]
    pub const fn rgb(&self) -> [f32; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// Flat f32 vector representing one slot's observation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Observation {
    data: Vec<f32>,
}

impl Observation {
    #[must_use]
    pub const fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Append a feature block.
    pub fn extend_from_slice(&mut self, values: &[f32]) {
        self.data.extend_from_slice(values);
    }
}

impl std::ops::Index<usize> for Observation {
    type Output = f32;
    fn index(&self, i: usize) -> &f32 {
        &self.data[i]
    }
}

impl From<Vec<f32>> for Observation {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// Continuous control command for one slot, normalized to `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    data: Vec<f32>,
}

impl Action {
    #[must_use]
    pub const fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Copy with every value clipped to `[-1, 1]`.
    #[must_use]
    pub fn clipped(&self) -> Self {
        Self {
            data: self.data.iter().map(|v| v.clamp(-1.0, 1.0)).collect(),
        }
    }

    /// Scale values from `[-1, 1]` to `[low, high]` per dimension.
    #[must_use]
    pub fn scale(&self, low: &[f32], high: &[f32]) -> Vec<f32> {
        self.data
            .iter()
            .zip(low.iter().zip(high.iter()))
            .map(|(a, (l, h))| l + ((a + 1.0) / 2.0) * (h - l))
            .collect()
    }

    /// Check dimension and reject NaN/Inf.
    pub fn validate(&self, expected_dim: usize) -> Result<(), ValidationError> {
        if self.data.len() != expected_dim {
            return Err(ValidationError::ActionDimMismatch {
                expected: expected_dim,
                got: self.data.len(),
            });
        }
        for val in &self.data {
            if val.is_nan() {
                return Err(ValidationError::ActionContainsNan);
            }
            if val.is_infinite() {
                return Err(ValidationError::ActionContainsInf);
            }
        }
        Ok(())
    }
}

impl From<Vec<f32>> for Action {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// ActionSpace
// ---------------------------------------------------------------------------

/// Box-shaped action space. Follows Gymnasium conventions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpace {
    pub low: Vec<f32>,
    pub high: Vec<f32>,
}

impl ActionSpace {
    /// Symmetric `[-1, 1]` box with `dim` dimensions.
    #[must_use]
    pub fn normalized(dim: usize) -> Self {
        Self {
            low: vec![-1.0; dim],
            high: vec![1.0; dim],
        }
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    /// Sample a random action. Takes `&mut impl Rng` for determinism.
    #[must_use]
    pub fn sample(&self, rng: &mut impl rand::Rng) -> Action {
        Action::new(
            self.low
                .iter()
                .zip(self.high.iter())
                .map(|(l, h)| rng.gen_range(*l..=*h))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// StepResult / ResetResult
// ---------------------------------------------------------------------------

/// Per-slot result of a batched `step`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f32,
    /// Episode ended due to task success.
    pub terminated: bool,
    /// Episode ended due to time limit.
    pub truncated: bool,
    pub info: StepInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepInfo {
    pub episode_length: u32,
    pub episode_reward: f32,
    pub success: bool,
    pub touching_table: bool,
    /// Observation of the finished episode when the slot was auto-reset.
    pub final_observation: Option<Observation>,
}

/// Per-slot result of `reset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResult {
    pub observation: Observation,
    pub info: ResetInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetInfo {
    pub seed: Option<u64>,
    pub episode_number: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn look_at_points_forward_axis_at_target() {
        let eye = Vec3::new(0.5, 0.3, 0.35);
        let target = Vec3::new(0.3, 0.0, 0.1);
        let pose = Pose::look_at(eye, target);
        assert!(approx(pose.p, eye));
        assert!(approx(pose.forward(), (target - eye).normalize()));
    }

    #[test]
    fn look_at_keeps_left_axis_horizontal() {
        let pose = Pose::look_at(Vec3::new(1.0, 1.0, 1.0), Vec3::ZERO);
        let left = pose.q * Vec3::Y;
        assert!(left.z.abs() < 1e-5);
        let up = pose.q * Vec3::Z;
        assert!(up.z > 0.0);
    }

    #[test]
    fn look_at_straight_down_is_finite() {
        let pose = Pose::look_at(Vec3::new(0.0, 0.0, 1.0), Vec3::ZERO);
        assert!(pose.q.is_finite());
        assert!(approx(pose.forward(), Vec3::NEG_Z));
    }

    #[test]
    fn raw_pose_is_position_then_wxyz() {
        let pose = Pose::from_yaw(Vec3::new(1.0, 2.0, 3.0), FRAC_PI_2);
        let raw = pose.raw_pose();
        assert_eq!(&raw[..3], &[1.0, 2.0, 3.0]);
        assert!((raw[3] - FRAC_PI_4.cos()).abs() < 1e-6);
        assert!(raw[4].abs() < 1e-6 && raw[5].abs() < 1e-6);
    }

    #[test]
    fn action_validate_dimension() {
        let action = Action::zeros(3);
        assert_eq!(
            action.validate(6),
            Err(ValidationError::ActionDimMismatch {
                expected: 6,
                got: 3
            })
        );
        assert!(action.validate(3).is_ok());
    }

    #[test]
    fn action_validate_rejects_nan_and_inf() {
        assert_eq!(
            Action::new(vec![0.0, f32::NAN]).validate(2),
            Err(ValidationError::ActionContainsNan)
        );
        assert_eq!(
            Action::new(vec![f32::INFINITY]).validate(1),
            Err(ValidationError::ActionContainsInf)
        );
    }

    #[test]
    fn action_clip_and_scale() {
        let action = Action::new(vec![-2.0, 0.0, 2.0]).clipped();
        assert_eq!(action.as_slice(), &[-1.0, 0.0, 1.0]);
        let scaled = action.scale(&[-0.1; 3], &[0.1; 3]);
        assert!((scaled[0] + 0.1).abs() < 1e-6);
        assert!(scaled[1].abs() < 1e-6);
        assert!((scaled[2] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn action_space_sample_is_contained() {
        use rand::SeedableRng;
        let space = ActionSpace::normalized(6);
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
        for _ in 0..20 {
            let action = space.sample(&mut rng);
            assert_eq!(action.len(), 6);
            assert!(action.as_slice().iter().all(|v| (-1.0..=1.0).contains(v)));
        }
        assert_eq!(space.dim(), 6);
    }

    #[test]
    fn observation_extend() {
        let mut obs = Observation::default();
        obs.extend_from_slice(&[1.0, 2.0]);
        obs.extend_from_slice(&[3.0]);
        assert_eq!(obs.as_slice(), &[1.0, 2.0, 3.0]);
        assert_eq!(obs[2], 3.0);
    }

    #[test]
    fn rgba_opaque() {
        assert_eq!(Rgba::opaque([0.1, 0.2, 0.3]).0[3], 1.0);
        assert_eq!(Rgba::RED.rgb(), [1.0, 0.0, 0.0]);
    }
}
