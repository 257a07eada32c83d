//! Task configuration.
//!
//! [`PushCubeConfig`] is an immutable value built once and threaded through
//! the environment. Partial overrides (TOML or JSON mappings) are deep-merged
//! onto the defaults; unknown keys are rejected at every nesting level.

use std::fmt;
use std::path::{Path, PathBuf};

use pushcube_core::config::{ControlMode, ObsMode, SimConfig};
use pushcube_core::error::ConfigError;
use pushcube_domain_rand::camera::BaseCameraSettings;
use pushcube_domain_rand::config::{DomainRandomizationConfig, deep_merge, reject_unknown_keys};
use pushcube_sim::so100::SO100_UID;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Robots this task knows how to place and color.
pub const SUPPORTED_ROBOTS: &[&str] = &[SO100_UID];

const SECTION: &str = "push_cube";

// ---------------------------------------------------------------------------
// RewardMode
// ---------------------------------------------------------------------------

/// Which reward the vectorized runner reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardMode {
    /// `1.0` on success, `0.0` otherwise.
    Sparse,
    Dense,
    #[default]
    NormalizedDense,
    /// Always zero.
    None,
}

impl RewardMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sparse => "sparse",
            Self::Dense => "dense",
            Self::NormalizedDense => "normalized_dense",
            Self::None => "none",
        }
    }
}

impl fmt::Display for RewardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

fn default_robot_uids() -> String {
    SO100_UID.into()
}
const fn default_true() -> bool {
    true
}
const fn default_spawn_box_pos() -> [f32; 2] {
    [0.3, 0.05]
}
const fn default_spawn_box_half_size() -> f32 {
    0.1
}
const fn default_num_envs() -> usize {
    1
}

// ---------------------------------------------------------------------------
// PushCubeConfig
// ---------------------------------------------------------------------------

/// Construction parameters for [`PushCubeEnv`](crate::push_cube::PushCubeEnv).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushCubeConfig {
    /// Robot identifier (default: `"so100"`, the only supported robot).
    #[serde(default = "default_robot_uids")]
    pub robot_uids: String,

    #[serde(default)]
    pub control_mode: ControlMode,

    /// Background image composited behind the base camera.
    #[serde(default)]
    pub greenscreen_overlay_path: Option<PathBuf>,

    #[serde(default)]
    pub domain_randomization_config: DomainRandomizationConfig,

    /// Master switch for every randomization.
    #[serde(default = "default_true")]
    pub domain_randomization: bool,

    #[serde(default)]
    pub base_camera_settings: BaseCameraSettings,

    /// Spawn square center relative to the robot base, in meters.
    #[serde(default = "default_spawn_box_pos")]
    pub spawn_box_pos: [f32; 2],

    /// Half extent of the spawn square.
    #[serde(default = "default_spawn_box_half_size")]
    pub spawn_box_half_size: f32,

    /// Number of parallel scenes.
    #[serde(default = "default_num_envs")]
    pub num_envs: usize,

    #[serde(default)]
    pub obs_mode: ObsMode,

    #[serde(default)]
    pub reward_mode: RewardMode,

    #[serde(default)]
    pub sim: SimConfig,
}

impl Default for PushCubeConfig {
    fn default() -> Self {
        Self {
            robot_uids: default_robot_uids(),
            control_mode: ControlMode::default(),
            greenscreen_overlay_path: None,
            domain_randomization_config: DomainRandomizationConfig::default(),
            domain_randomization: true,
            base_camera_settings: BaseCameraSettings::default(),
            spawn_box_pos: default_spawn_box_pos(),
            spawn_box_half_size: default_spawn_box_half_size(),
            num_envs: default_num_envs(),
            obs_mode: ObsMode::default(),
            reward_mode: RewardMode::default(),
            sim: SimConfig::default(),
        }
    }
}

impl PushCubeConfig {
    /// Builder: set the batch size.
    #[must_use]
    pub const fn with_num_envs(mut self, num_envs: usize) -> Self {
        self.num_envs = num_envs;
        self
    }

    /// Builder: toggle every randomization.
    #[must_use]
    pub const fn with_domain_randomization(mut self, enabled: bool) -> Self {
        self.domain_randomization = enabled;
        self
    }

    #[must_use]
    pub const fn with_obs_mode(mut self, obs_mode: ObsMode) -> Self {
        self.obs_mode = obs_mode;
        self
    }

    #[must_use]
    pub const fn with_control_mode(mut self, control_mode: ControlMode) -> Self {
        self.control_mode = control_mode;
        self
    }

    #[must_use]
    pub const fn with_reward_mode(mut self, reward_mode: RewardMode) -> Self {
        self.reward_mode = reward_mode;
        self
    }

    #[must_use]
    pub fn with_greenscreen(mut self, path: impl Into<PathBuf>) -> Self {
        self.greenscreen_overlay_path = Some(path.into());
        self
    }

    /// Deep-merge `overrides` onto the defaults, parse strictly and validate.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownField`] for a key that does not exist at its
    /// level, [`ConfigError::Json`] on a type mismatch or unknown enum
    /// variant, and [`ConfigError::InvalidValue`] from
    /// [`validate`](Self::validate).
    pub fn from_overrides(overrides: &Value) -> Result<Self, ConfigError> {
        let mut merged = serde_json::to_value(Self::default())?;
        reject_unknown_keys(&merged, overrides, SECTION)?;
        deep_merge(&mut merged, overrides);
        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document of overrides.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(s)?;
        let overrides = serde_json::to_value(table)?;
        Self::from_overrides(&overrides)
    }

    /// Load overrides from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Render the full config as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_ROBOTS.contains(&self.robot_uids.as_str()) {
            return Err(ConfigError::Unsupported {
                kind: "robot",
                value: self.robot_uids.clone(),
            });
        }
        if self.num_envs == 0 {
            return Err(ConfigError::InvalidValue {
                field: format!("{SECTION}.num_envs"),
                message: "must be >= 1".into(),
            });
        }
        if !self.spawn_box_half_size.is_finite() || self.spawn_box_half_size < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: format!("{SECTION}.spawn_box_half_size"),
                message: format!("must be finite and >= 0, got {}", self.spawn_box_half_size),
            });
        }
        if self.spawn_box_pos.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: format!("{SECTION}.spawn_box_pos"),
                message: "must be finite".into(),
            });
        }
        let fov = self.base_camera_settings.fov;
        if fov.is_nan() || fov <= 0.0 || fov >= std::f32::consts::PI {
            return Err(ConfigError::InvalidValue {
                field: format!("{SECTION}.base_camera_settings.fov"),
                message: format!("must be in (0, pi) radians, got {fov}"),
            });
        }
        self.sim.validate()?;
        self.domain_randomization_config.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pushcube_domain_rand::config::RobotColor;
    use serde_json::json;

    #[test]
    fn defaults() {
        let config = PushCubeConfig::default();
        assert_eq!(config.robot_uids, "so100");
        assert_eq!(config.control_mode, ControlMode::PdJointTargetDeltaPos);
        assert!(config.domain_randomization);
        assert_eq!(config.spawn_box_pos, [0.3, 0.05]);
        assert!((config.spawn_box_half_size - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.num_envs, 1);
        assert_eq!(config.obs_mode, ObsMode::State);
        assert_eq!(config.reward_mode, RewardMode::NormalizedDense);
        assert_eq!(config.sim.substeps(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = PushCubeConfig::from_overrides(&json!({
            "num_envs": 4,
            "domain_randomization_config": { "cube_friction_mean": 0.35 }
        }))
        .unwrap();
        assert_eq!(config.num_envs, 4);
        let dr = &config.domain_randomization_config;
        assert!((dr.cube_friction_mean - 0.35).abs() < f32::EPSILON);
        assert!((dr.initial_qpos_noise_scale - 0.02).abs() < f32::EPSILON);
        assert!(dr.randomize_lighting);
    }

    #[test]
    fn unknown_top_level_key_rejected() {
        let err = PushCubeConfig::from_overrides(&json!({ "num_env": 2 })).unwrap_err();
        match err {
            ConfigError::UnknownField { section, field } => {
                assert_eq!(section, "push_cube");
                assert_eq!(field, "num_env");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let err = PushCubeConfig::from_overrides(&json!({
            "domain_randomization_config": { "cube_mass": 1.0 }
        }))
        .unwrap_err();
        match err {
            ConfigError::UnknownField { section, field } => {
                assert_eq!(section, "push_cube.domain_randomization_config");
                assert_eq!(field, "cube_mass");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn greenscreen_path_override_accepted() {
        let config =
            PushCubeConfig::from_overrides(&json!({ "greenscreen_overlay_path": "bg.png" }))
                .unwrap();
        assert_eq!(config.greenscreen_overlay_path, Some(PathBuf::from("bg.png")));
    }

    #[test]
    fn unsupported_robot_rejected() {
        let err = PushCubeConfig::from_overrides(&json!({ "robot_uids": "panda" })).unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported { kind: "robot", .. }));
    }

    #[test]
    fn unknown_obs_mode_rejected() {
        let err = PushCubeConfig::from_overrides(&json!({ "obs_mode": "pointcloud" })).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn zero_envs_rejected() {
        let err = PushCubeConfig::from_overrides(&json!({ "num_envs": 0 })).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn bad_sim_frequencies_rejected() {
        let err = PushCubeConfig::from_overrides(&json!({
            "sim": { "sim_freq": 100, "control_freq": 30 }
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn toml_overrides() {
        let config = PushCubeConfig::from_toml_str(
            r#"
            num_envs = 8
            obs_mode = "state_dict"
            control_mode = "pd_joint_delta_pos"

            [domain_randomization_config]
            robot_color = "random"
            "#,
        )
        .unwrap();
        assert_eq!(config.num_envs, 8);
        assert_eq!(config.obs_mode, ObsMode::StateDict);
        assert_eq!(config.control_mode, ControlMode::PdJointDeltaPos);
        assert_eq!(
            config.domain_randomization_config.robot_color,
            RobotColor::RandomPerSlot
        );
    }

    #[test]
    fn toml_render_parses_back() {
        let config = PushCubeConfig::default().with_num_envs(3);
        let rendered = config.to_toml_string().unwrap();
        let parsed = PushCubeConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn builders() {
        let config = PushCubeConfig::default()
            .with_num_envs(2)
            .with_domain_randomization(false)
            .with_obs_mode(ObsMode::None)
            .with_greenscreen("screen.png");
        assert_eq!(config.num_envs, 2);
        assert!(!config.domain_randomization);
        assert_eq!(config.obs_mode, ObsMode::None);
        assert!(config.greenscreen_overlay_path.is_some());
    }
}
