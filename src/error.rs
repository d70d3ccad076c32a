use thiserror::Error;

/// Configuration and catalog faults.
///
/// These are the only errors the engine surfaces to callers. They are raised
/// eagerly, before any attempt runs; once a workflow starts executing every
/// runtime fault is folded into an attempt result instead.
#[derive(Debug, Error)]
pub enum IafError {
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("Layer '{layer}' uses unsupported strategy '{strategy}'")]
    UnsupportedStrategy { layer: String, strategy: String },

    #[error("No attempt executor handles layer '{0}'")]
    UnhandledLayer(String),

    #[error("Invalid failure pattern '{name}': {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error("Validator already registered: {0}")]
    DuplicateValidator(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Validator not found: {0}")]
    ValidatorNotFound(String),

    #[error("Schema validation failed for '{name}': {}", .errors.join("; "))]
    SchemaValidation { name: String, errors: Vec<String> },

    #[error("Tool '{name}' failed: {message}")]
    ToolExecution { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, IafError>;
