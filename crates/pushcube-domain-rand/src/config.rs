//! Domain randomization configuration.
//!
//! [`DomainRandomizationConfig`] is built once when the environment is
//! constructed and never mutated afterwards. Users either pass a full record
//! or a partial override mapping that is deep-merged onto the defaults.
//! Unknown override keys are rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pushcube_core::error::ConfigError;

use crate::ranges::{RandomizationRange, RangeError};

const SECTION: &str = "domain_randomization_config";

// ---------------------------------------------------------------------------
// RobotColor
// ---------------------------------------------------------------------------

/// Robot link color override.
///
/// Serialized as absent/`null` (keep the model's colors), an `[r, g, b]`
/// triple, or the string `"random"`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<RobotColorRepr>", into = "Option<RobotColorRepr>")]
pub enum RobotColor {
    /// Keep the colors from the robot description.
    #[default]
    Default,
    /// Same RGB on every link of every slot.
    Fixed([f32; 3]),
    /// Independent uniform RGB per link per slot.
    RandomPerSlot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RobotColorRepr {
    Keyword(String),
    Rgb([f32; 3]),
}

impl TryFrom<Option<RobotColorRepr>> for RobotColor {
    type Error = String;

    fn try_from(repr: Option<RobotColorRepr>) -> Result<Self, Self::Error> {
        match repr {
            None => Ok(Self::Default),
            Some(RobotColorRepr::Keyword(word)) if word == "random" => Ok(Self::RandomPerSlot),
            Some(RobotColorRepr::Keyword(word)) => Err(format!(
                "robot_color must be \"random\" or an [r, g, b] triple, got \"{word}\""
            )),
            Some(RobotColorRepr::Rgb(rgb)) => Ok(Self::Fixed(rgb)),
        }
    }
}

impl From<RobotColor> for Option<RobotColorRepr> {
    fn from(color: RobotColor) -> Self {
        match color {
            RobotColor::Default => None,
            RobotColor::Fixed(rgb) => Some(RobotColorRepr::Rgb(rgb)),
            RobotColor::RandomPerSlot => Some(RobotColorRepr::Keyword("random".into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_initial_qpos_noise_scale() -> f32 {
    0.02
}
const fn default_max_camera_offset() -> [f32; 3] {
    [0.025, 0.025, 0.025]
}
const fn default_camera_target_noise() -> f32 {
    1e-3
}
const fn default_camera_view_rot_noise() -> f32 {
    5e-3
}
fn default_camera_fov_noise() -> f32 {
    2.0_f32.to_radians()
}
const fn default_cube_half_size_range() -> [f32; 2] {
    [0.022 / 2.0, 0.028 / 2.0]
}
const fn default_cube_friction_mean() -> f32 {
    0.3
}
const fn default_cube_friction_std() -> f32 {
    0.05
}
const fn default_cube_friction_bounds() -> [f32; 2] {
    [0.1, 0.5]
}

// ---------------------------------------------------------------------------
// DomainRandomizationConfig
// ---------------------------------------------------------------------------

/// Randomization ranges for the cube-push task.
///
/// Task-agnostic fields (qpos noise, robot color, lighting, camera noise)
/// come first; cube fields are sampled once at scene load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DomainRandomizationConfig {
    /// Std of the Gaussian noise added to the rest joint configuration.
    pub initial_qpos_noise_scale: f32,
    pub robot_color: RobotColor,
    pub randomize_lighting: bool,
    /// Max camera offset from the base camera position per axis.
    pub max_camera_offset: [f32; 3],
    /// Std of the noise added to the camera target position.
    pub camera_target_noise: f32,
    /// Std of the roll noise about the camera view axis.
    pub camera_view_rot_noise: f32,
    /// Half-width of the uniform noise added to the camera fov (radians).
    pub camera_fov_noise: f32,

    pub cube_half_size_range: [f32; 2],
    pub cube_friction_mean: f32,
    pub cube_friction_std: f32,
    pub cube_friction_bounds: [f32; 2],
    pub randomize_cube_color: bool,
}

impl Default for DomainRandomizationConfig {
    fn default() -> Self {
        Self {
            initial_qpos_noise_scale: default_initial_qpos_noise_scale(),
            robot_color: RobotColor::Default,
            randomize_lighting: true,
            max_camera_offset: default_max_camera_offset(),
            camera_target_noise: default_camera_target_noise(),
            camera_view_rot_noise: default_camera_view_rot_noise(),
            camera_fov_noise: default_camera_fov_noise(),
            cube_half_size_range: default_cube_half_size_range(),
            cube_friction_mean: default_cube_friction_mean(),
            cube_friction_std: default_cube_friction_std(),
            cube_friction_bounds: default_cube_friction_bounds(),
            randomize_cube_color: true,
        }
    }
}

impl DomainRandomizationConfig {
    /// Deep-merge `overrides` onto the defaults and parse strictly.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownField`] if `overrides` names a field that does
    /// not exist, [`ConfigError::Json`] on a type mismatch, and
    /// [`ConfigError::InvalidValue`] if the merged record fails
    /// [`validate`](Self::validate).
    pub fn from_overrides(overrides: &Value) -> Result<Self, ConfigError> {
        let mut merged = serde_json::to_value(Self::default())?;
        reject_unknown_keys(&merged, overrides, SECTION)?;
        deep_merge(&mut merged, overrides);
        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML table of overrides (same semantics as
    /// [`from_overrides`](Self::from_overrides)).
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(s)?;
        let overrides = serde_json::to_value(table)?;
        Self::from_overrides(&overrides)
    }

    /// Validate ranges and noise scales.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, err: RangeError| ConfigError::InvalidValue {
            field: format!("{SECTION}.{field}"),
            message: err.to_string(),
        };
        self.half_size_range()
            .map_err(|e| invalid("cube_half_size_range", e))?;
        if self.cube_half_size_range[0] <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: format!("{SECTION}.cube_half_size_range"),
                message: "half sizes must be > 0".into(),
            });
        }
        self.friction_range()
            .map_err(|e| invalid("cube_friction", e))?;

        let non_negative = [
            ("initial_qpos_noise_scale", self.initial_qpos_noise_scale),
            ("camera_target_noise", self.camera_target_noise),
            ("camera_view_rot_noise", self.camera_view_rot_noise),
            ("camera_fov_noise", self.camera_fov_noise),
            ("max_camera_offset[0]", self.max_camera_offset[0]),
            ("max_camera_offset[1]", self.max_camera_offset[1]),
            ("max_camera_offset[2]", self.max_camera_offset[2]),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("{SECTION}.{field}"),
                    message: format!("must be finite and >= 0, got {value}"),
                });
            }
        }
        if let RobotColor::Fixed(rgb) = self.robot_color {
            if rgb.iter().any(|c| !(0.0..=1.0).contains(c)) {
                return Err(ConfigError::InvalidValue {
                    field: format!("{SECTION}.robot_color"),
                    message: format!("channels must be in [0, 1], got {rgb:?}"),
                });
            }
        }
        Ok(())
    }

    /// Cube half-size distribution.
    pub fn half_size_range(&self) -> Result<RandomizationRange, RangeError> {
        let [low, high] = self.cube_half_size_range;
        RandomizationRange::uniform(low, high)
    }

    /// Cube friction distribution.
    pub fn friction_range(&self) -> Result<RandomizationRange, RangeError> {
        let [low, high] = self.cube_friction_bounds;
        RandomizationRange::clipped_gaussian(
            self.cube_friction_mean,
            self.cube_friction_std,
            low,
            high,
        )
    }
}

// ---------------------------------------------------------------------------
// Merge helpers
// ---------------------------------------------------------------------------

/// Recursively merge `overrides` into `base`.
///
/// Objects merge key by key; any other value replaces the base value.
pub fn deep_merge(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(over_map)) => {
            for (key, over_value) in over_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, over_value),
                    None => {
                        base_map.insert(key.clone(), over_value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

/// Fail on the first key in `overrides` that `reference` does not have.
///
/// Nested objects are checked against the matching nested object in
/// `reference`; `section` prefixes the reported path.
pub fn reject_unknown_keys(
    reference: &Value,
    overrides: &Value,
    section: &str,
) -> Result<(), ConfigError> {
    let (Value::Object(known), Value::Object(given)) = (reference, overrides) else {
        return Ok(());
    };
    for (key, value) in given {
        match known.get(key) {
            None => {
                return Err(ConfigError::UnknownField {
                    section: section.into(),
                    field: key.clone(),
                });
            }
            Some(reference_value) => {
                reject_unknown_keys(reference_value, value, &format!("{section}.{key}"))?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let config = DomainRandomizationConfig::default();
        assert!((config.initial_qpos_noise_scale - 0.02).abs() < f32::EPSILON);
        assert_eq!(config.robot_color, RobotColor::Default);
        assert!(config.randomize_lighting);
        assert_eq!(config.max_camera_offset, [0.025; 3]);
        assert!((config.camera_fov_noise - 2.0_f32.to_radians()).abs() < 1e-7);
        assert!((config.cube_half_size_range[0] - 0.011).abs() < 1e-7);
        assert!((config.cube_half_size_range[1] - 0.014).abs() < 1e-7);
        assert_eq!(config.cube_friction_bounds, [0.1, 0.5]);
        assert!(config.randomize_cube_color);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_override_keeps_unset_defaults() {
        let config = DomainRandomizationConfig::from_overrides(&json!({
            "cube_friction_mean": 0.4,
            "randomize_lighting": false,
        }))
        .unwrap();
        assert!((config.cube_friction_mean - 0.4).abs() < f32::EPSILON);
        assert!(!config.randomize_lighting);
        let defaults = DomainRandomizationConfig::default();
        assert_eq!(config.cube_half_size_range, defaults.cube_half_size_range);
        assert_eq!(config.max_camera_offset, defaults.max_camera_offset);
    }

    #[test]
    fn empty_override_equals_default() {
        let config = DomainRandomizationConfig::from_overrides(&json!({})).unwrap();
        assert_eq!(config, DomainRandomizationConfig::default());
    }

    #[test]
    fn unknown_key_fails() {
        let err = DomainRandomizationConfig::from_overrides(&json!({"cube_mass": 1.0}))
            .unwrap_err();
        match err {
            ConfigError::UnknownField { section, field } => {
                assert_eq!(section, SECTION);
                assert_eq!(field, "cube_mass");
            }
            other => panic!("expected UnknownField, got {other:?}"),
        }
    }

    #[test]
    fn wrong_type_fails() {
        let err = DomainRandomizationConfig::from_overrides(&json!({"randomize_lighting": "yes"}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn invalid_range_fails_validation() {
        let err = DomainRandomizationConfig::from_overrides(&json!({
            "cube_half_size_range": [0.02, 0.01]
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn negative_noise_fails_validation() {
        let err = DomainRandomizationConfig::from_overrides(&json!({"camera_target_noise": -1.0}))
            .unwrap_err();
        assert!(err.to_string().contains("camera_target_noise"));
    }

    #[test]
    fn robot_color_variants_parse() {
        let random =
            DomainRandomizationConfig::from_overrides(&json!({"robot_color": "random"})).unwrap();
        assert_eq!(random.robot_color, RobotColor::RandomPerSlot);

        let fixed =
            DomainRandomizationConfig::from_overrides(&json!({"robot_color": [0.1, 0.2, 0.3]}))
                .unwrap();
        assert_eq!(fixed.robot_color, RobotColor::Fixed([0.1, 0.2, 0.3]));

        let none = DomainRandomizationConfig::from_overrides(&json!({"robot_color": null})).unwrap();
        assert_eq!(none.robot_color, RobotColor::Default);
    }

    #[test]
    fn robot_color_rejects_other_keywords() {
        assert!(
            DomainRandomizationConfig::from_overrides(&json!({"robot_color": "blue"})).is_err()
        );
    }

    #[test]
    fn robot_color_out_of_range_fails() {
        assert!(
            DomainRandomizationConfig::from_overrides(&json!({"robot_color": [2.0, 0.0, 0.0]}))
                .is_err()
        );
    }

    #[test]
    fn toml_overrides() {
        let config = DomainRandomizationConfig::from_toml_str(
            r#"
            robot_color = "random"
            cube_friction_std = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.robot_color, RobotColor::RandomPerSlot);
        assert!(config.cube_friction_std.abs() < f32::EPSILON);
    }

    #[test]
    fn toml_unknown_key_fails() {
        assert!(matches!(
            DomainRandomizationConfig::from_toml_str("bogus = 1"),
            Err(ConfigError::UnknownField { .. })
        ));
    }

    #[test]
    fn deep_merge_recurses_into_objects() {
        let mut base = json!({"a": {"x": 1, "y": 2}, "b": 3});
        deep_merge(&mut base, &json!({"a": {"y": 5}}));
        assert_eq!(base, json!({"a": {"x": 1, "y": 5}, "b": 3}));
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let mut base = json!({"r": [1, 2]});
        deep_merge(&mut base, &json!({"r": [3, 4]}));
        assert_eq!(base, json!({"r": [3, 4]}));
    }

    #[test]
    fn reject_unknown_keys_reports_nested_path() {
        let reference = json!({"camera": {"fov": 1.0}});
        let err = reject_unknown_keys(&reference, &json!({"camera": {"zoom": 2.0}}), "root")
            .unwrap_err();
        assert!(err.to_string().contains("root.camera"));
        assert!(err.to_string().contains("zoom"));
    }

    #[test]
    fn friction_range_is_clipped_gaussian() {
        let range = DomainRandomizationConfig::default().friction_range().unwrap();
        assert!(matches!(range, RandomizationRange::ClippedGaussian { .. }));
        assert!((range.nominal() - 0.3).abs() < f32::EPSILON);
    }
}
