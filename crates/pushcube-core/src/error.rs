use thiserror::Error;

/// Top-level error type for the cube-push workspace.
#[derive(Debug, Error)]
pub enum PushCubeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("Override parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown field in {section}: {field}")]
    UnknownField { section: String, field: String },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unsupported {kind}: {value}")]
    Unsupported { kind: &'static str, value: String },
}

/// Simulation runtime errors raised by backends and the task.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Actor not found: {0}")]
    ActorNotFound(String),

    #[error("Actor name already in use: {0}")]
    DuplicateActor(String),

    #[error("Link not found: {0}")]
    LinkNotFound(String),

    #[error("Environment slot {slot} out of range (num_envs = {num_envs})")]
    SlotOutOfRange { slot: usize, num_envs: usize },

    #[error("Length mismatch for {what}: expected {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Scene already loaded; geometry cannot be rebuilt in place")]
    SceneAlreadyLoaded,

    #[error("Scene not loaded; call load_scene first")]
    SceneNotLoaded,

    #[error("Robot not loaded")]
    RobotNotLoaded,
}

/// Action validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Action dimension mismatch: expected {expected}, got {got}")]
    ActionDimMismatch { expected: usize, got: usize },

    #[error("Action contains NaN")]
    ActionContainsNan,

    #[error("Action contains Inf")]
    ActionContainsInf,

    #[error("Action batch size mismatch: expected {expected}, got {got}")]
    BatchSizeMismatch { expected: usize, got: usize },
}
