use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_sim_freq() -> u32 {
    100
}
const fn default_control_freq() -> u32 {
    20
}

// ---------------------------------------------------------------------------
// SimConfig
// ---------------------------------------------------------------------------

/// Simulation timing.
///
/// The physics backend is stepped `sim_freq / control_freq` times per
/// control step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    /// Physics rate in Hz (default: 100).
    #[serde(default = "default_sim_freq")]
    pub sim_freq: u32,

    /// Control rate in Hz (default: 20). Must divide `sim_freq`.
    #[serde(default = "default_control_freq")]
    pub control_freq: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sim_freq: default_sim_freq(),
            control_freq: default_control_freq(),
        }
    }
}

impl SimConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sim_freq == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sim.sim_freq".into(),
                message: "must be > 0".into(),
            });
        }
        if self.control_freq == 0 || self.control_freq > self.sim_freq {
            return Err(ConfigError::InvalidValue {
                field: "sim.control_freq".into(),
                message: format!("must be in 1..={}", self.sim_freq),
            });
        }
        if self.sim_freq % self.control_freq != 0 {
            return Err(ConfigError::InvalidValue {
                field: "sim.control_freq".into(),
                message: format!("must divide sim_freq ({})", self.sim_freq),
            });
        }
        Ok(())
    }

    /// Number of physics substeps per control step.
    #[must_use]
    pub const fn substeps(&self) -> u32 {
        self.sim_freq / self.control_freq
    }

    /// Physics timestep in seconds.
    #[must_use]
    pub fn sim_dt(&self) -> f32 {
        1.0 / self.sim_freq as f32
    }
}

// ---------------------------------------------------------------------------
// ObsMode
// ---------------------------------------------------------------------------

/// Which observation groups the task assembles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObsMode {
    #[serde(rename = "none")]
    None,
    #[default]
    #[serde(rename = "state")]
    State,
    #[serde(rename = "state_dict")]
    StateDict,
    /// Images come from the external sensor pipeline; only agent and
    /// non-privileged extras are assembled here.
    #[serde(rename = "rgb+segmentation")]
    RgbSegmentation,
}

impl ObsMode {
    /// Whether privileged object state (cube pose, goal) is included.
    #[must_use]
    pub const fn includes_state(self) -> bool {
        matches!(self, Self::State | Self::StateDict)
    }

    /// Whether any proprioceptive observation is produced.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        matches!(self, Self::None)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::State => "state",
            Self::StateDict => "state_dict",
            Self::RgbSegmentation => "rgb+segmentation",
        }
    }
}

impl fmt::Display for ObsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObsMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "state" => Ok(Self::State),
            "state_dict" => Ok(Self::StateDict),
            "rgb+segmentation" => Ok(Self::RgbSegmentation),
            other => Err(ConfigError::Unsupported {
                kind: "obs_mode",
                value: other.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// ControlMode
// ---------------------------------------------------------------------------

/// How normalized actions are mapped to joint drive targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Absolute joint targets within the joint limits.
    PdJointPos,
    /// Targets relative to the measured joint positions.
    PdJointDeltaPos,
    /// Targets relative to the previous target (stateful).
    #[default]
    PdJointTargetDeltaPos,
}

impl ControlMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PdJointPos => "pd_joint_pos",
            Self::PdJointDeltaPos => "pd_joint_delta_pos",
            Self::PdJointTargetDeltaPos => "pd_joint_target_delta_pos",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pd_joint_pos" => Ok(Self::PdJointPos),
            "pd_joint_delta_pos" => Ok(Self::PdJointDeltaPos),
            "pd_joint_target_delta_pos" => Ok(Self::PdJointTargetDeltaPos),
            other => Err(ConfigError::Unsupported {
                kind: "control_mode",
                value: other.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
