//! Camera pose randomization.
//!
//! Eyes are drawn inside an axis-aligned prism around a nominal position,
//! then turned into look-at poses toward a noised target and rolled about
//! the view axis.

use bevy::math::{Quat, Vec3};
use pushcube_core::seed::{BatchedRng, sample_normal, sample_uniform};
use pushcube_core::types::Pose;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::DomainRandomizationConfig;

// ---------------------------------------------------------------------------
// BaseCameraSettings
// ---------------------------------------------------------------------------

fn default_fov() -> f32 {
    52.0_f32.to_radians()
}
const fn default_pos() -> [f32; 3] {
    [0.5, 0.3, 0.35]
}
const fn default_target() -> [f32; 3] {
    [0.3, 0.0, 0.1]
}

/// Nominal camera the randomization is centered on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseCameraSettings {
    /// Vertical field of view in radians.
    #[serde(default = "default_fov")]
    pub fov: f32,
    #[serde(default = "default_pos")]
    pub pos: [f32; 3],
    #[serde(default = "default_target")]
    pub target: [f32; 3],
}

impl Default for BaseCameraSettings {
    fn default() -> Self {
        Self {
            fov: default_fov(),
            pos: default_pos(),
            target: default_target(),
        }
    }
}

impl BaseCameraSettings {
    #[must_use]
    pub fn pos(&self) -> Vec3 {
        Vec3::from_array(self.pos)
    }

    #[must_use]
    pub fn target(&self) -> Vec3 {
        Vec3::from_array(self.target)
    }

    /// Look-at pose from `pos` to `target`.
    #[must_use]
    pub fn nominal_pose(&self) -> Pose {
        Pose::look_at(self.pos(), self.target())
    }
}

// ---------------------------------------------------------------------------
// Sampling primitives
// ---------------------------------------------------------------------------

/// Sample `n` points uniformly in the box `center ± scale`, with the offsets
/// rotated by `theta` about world z before being added to `center`.
#[must_use]
pub fn make_camera_rectangular_prism<R: Rng + ?Sized>(
    n: usize,
    scale: Vec3,
    center: Vec3,
    theta: f32,
    rng: &mut R,
) -> Vec<Vec3> {
    let rotation = Quat::from_rotation_z(theta);
    (0..n)
        .map(|_| {
            let offset = Vec3::new(
                sample_uniform(rng, -1.0, 1.0),
                sample_uniform(rng, -1.0, 1.0),
                sample_uniform(rng, -1.0, 1.0),
            ) * scale;
            center + rotation * offset
        })
        .collect()
}

/// Look-at poses from each eye toward `target` plus per-axis Gaussian noise,
/// rolled about the view axis by a Gaussian angle.
#[must_use]
pub fn noised_look_at<R: Rng + ?Sized>(
    eyes: &[Vec3],
    target: Vec3,
    look_at_noise: f32,
    view_axis_rot_noise: f32,
    rng: &mut R,
) -> Vec<Pose> {
    eyes.iter()
        .map(|eye| {
            let noised_target = target
                + Vec3::new(
                    sample_normal(rng, 0.0, look_at_noise),
                    sample_normal(rng, 0.0, look_at_noise),
                    sample_normal(rng, 0.0, look_at_noise),
                );
            let roll = sample_normal(rng, 0.0, view_axis_rot_noise);
            let pose = Pose::look_at(*eye, noised_target);
            Pose::new(pose.p, (pose.q * Quat::from_rotation_x(roll)).normalize())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CameraPoseSampler
// ---------------------------------------------------------------------------

/// Camera mount pose sampler built from the nominal settings and the
/// randomization config.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPoseSampler {
    settings: BaseCameraSettings,
    randomize: bool,
    max_offset: Vec3,
    target_noise: f32,
    view_rot_noise: f32,
    fov_noise: f32,
}

impl CameraPoseSampler {
    #[must_use]
    pub fn new(
        settings: BaseCameraSettings,
        config: &DomainRandomizationConfig,
        randomize: bool,
    ) -> Self {
        Self {
            settings,
            randomize,
            max_offset: Vec3::from_array(config.max_camera_offset),
            target_noise: config.camera_target_noise,
            view_rot_noise: config.camera_view_rot_noise,
            fov_noise: config.camera_fov_noise,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &BaseCameraSettings {
        &self.settings
    }

    #[must_use]
    pub const fn is_randomized(&self) -> bool {
        self.randomize
    }

    /// The deterministic look-at pose used when randomization is off.
    #[must_use]
    pub fn fixed_pose(&self) -> Pose {
        self.settings.nominal_pose()
    }

    /// `n` mount poses. With randomization off this is [`fixed_pose`]
    /// repeated and `rng` is not touched.
    ///
    /// [`fixed_pose`]: Self::fixed_pose
    #[must_use]
    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Pose> {
        if !self.randomize {
            return vec![self.fixed_pose(); n];
        }
        let eyes =
            make_camera_rectangular_prism(n, self.max_offset, self.settings.pos(), 0.0, rng);
        noised_look_at(
            &eyes,
            self.settings.target(),
            self.target_noise,
            self.view_rot_noise,
            rng,
        )
    }

    /// Per-slot field of view: `fov + fov_noise * (2u - 1)` when randomized.
    #[must_use]
    pub fn sample_fovs(&self, rng: &mut BatchedRng) -> Vec<f32> {
        if !self.randomize {
            return vec![self.settings.fov; rng.len()];
        }
        rng.rand()
            .into_iter()
            .map(|u| self.settings.fov + self.fov_noise * (2.0 * u - 1.0))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(3)
    }

    fn sampler(randomize: bool) -> CameraPoseSampler {
        CameraPoseSampler::new(
            BaseCameraSettings::default(),
            &DomainRandomizationConfig::default(),
            randomize,
        )
    }

    #[test]
    fn settings_defaults() {
        let s = BaseCameraSettings::default();
        assert!((s.fov - 52.0_f32.to_radians()).abs() < 1e-7);
        assert_eq!(s.pos, [0.5, 0.3, 0.35]);
        assert_eq!(s.target, [0.3, 0.0, 0.1]);
    }

    #[test]
    fn settings_partial_json() {
        let s: BaseCameraSettings = serde_json::from_str(r#"{"fov": 1.0}"#).unwrap();
        assert!((s.fov - 1.0).abs() < f32::EPSILON);
        assert_eq!(s.pos, default_pos());
    }

    #[test]
    fn prism_points_stay_in_box() {
        let scale = Vec3::splat(0.025);
        let center = Vec3::new(0.5, 0.3, 0.35);
        let eyes = make_camera_rectangular_prism(50, scale, center, 0.0, &mut rng());
        assert_eq!(eyes.len(), 50);
        for eye in eyes {
            let d = (eye - center).abs();
            assert!(d.cmple(scale).all(), "eye {eye} outside prism");
        }
    }

    #[test]
    fn prism_zero_scale_is_center() {
        let center = Vec3::new(1.0, 2.0, 3.0);
        let eyes = make_camera_rectangular_prism(3, Vec3::ZERO, center, 0.7, &mut rng());
        assert!(eyes.iter().all(|e| (*e - center).length() < 1e-6));
    }

    #[test]
    fn noised_look_at_without_noise_matches_look_at() {
        let eye = Vec3::new(0.5, 0.3, 0.35);
        let target = Vec3::new(0.3, 0.0, 0.1);
        let poses = noised_look_at(&[eye], target, 0.0, 0.0, &mut rng());
        let expected = Pose::look_at(eye, target);
        assert!((poses[0].p - expected.p).length() < 1e-6);
        assert!(poses[0].q.abs_diff_eq(expected.q, 1e-6));
    }

    #[test]
    fn noised_look_at_roll_keeps_view_axis() {
        let eye = Vec3::new(0.5, 0.3, 0.35);
        let target = Vec3::new(0.3, 0.0, 0.1);
        let poses = noised_look_at(&[eye], target, 0.0, 0.5, &mut rng());
        let dir = (target - eye).normalize();
        assert!((poses[0].forward() - dir).length() < 1e-5);
    }

    #[test]
    fn disabled_sampler_returns_fixed_pose_for_any_n() {
        let s = sampler(false);
        let fixed = s.fixed_pose();
        for n in [0, 1, 7] {
            let poses = s.sample(n, &mut rng());
            assert_eq!(poses.len(), n);
            assert!(poses.iter().all(|p| *p == fixed));
        }
    }

    #[test]
    fn randomized_sampler_varies_and_stays_near_nominal() {
        let s = sampler(true);
        let poses = s.sample(16, &mut rng());
        assert_eq!(poses.len(), 16);
        assert!(poses.windows(2).any(|w| w[0] != w[1]));
        let center = s.settings().pos();
        for pose in &poses {
            assert!((pose.p - center).abs().max_element() <= 0.025 + 1e-6);
        }
    }

    #[test]
    fn randomized_sampler_is_deterministic() {
        let s = sampler(true);
        assert_eq!(s.sample(4, &mut rng()), s.sample(4, &mut rng()));
    }

    #[test]
    fn fovs_within_noise_band() {
        let s = sampler(true);
        let mut batched = BatchedRng::new(1, 32);
        let base = s.settings().fov;
        let noise = DomainRandomizationConfig::default().camera_fov_noise;
        for fov in s.sample_fovs(&mut batched) {
            assert!((fov - base).abs() <= noise + 1e-6);
        }
    }

    #[test]
    fn fovs_fixed_when_disabled() {
        let s = sampler(false);
        let fovs = s.sample_fovs(&mut BatchedRng::new(1, 3));
        assert_eq!(fovs, vec![s.settings().fov; 3]);
    }
}
