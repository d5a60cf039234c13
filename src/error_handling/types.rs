use thiserror::Error;

/// Problems with the host-supplied record. Always reported before any engine contact.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required argument: {0}")]
    MissingField(&'static str),
    #[error("Could not convert {0} to integer")]
    InvalidSize(String),
    #[error("value of state must be one of: present, absent, stop, kill, restart, got: {0}")]
    InvalidState(String),
    #[error("invalid count {0}: expected a non-negative integer")]
    InvalidCount(String),
    #[error("invalid docker_url {0}")]
    InvalidUrl(String),
    #[error("invalid port specification {0}")]
    InvalidPorts(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("unable to read arguments: {0}")]
    Io(#[from] std::io::Error),
    #[error("arguments are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("arguments are not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failures reported by the engine client adapter.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("unable to reach the engine: {0}")]
    Unreachable(String),
    #[error("image not found: {0}")]
    ImageNotFound(String),
    #[error("engine returned {status}: {message}")]
    Daemon { status: u16, message: String },
    #[error("unexpected engine response: {0}")]
    Malformed(String),
}

impl EngineError {
    pub fn daemon(status: u16, message: impl Into<String>) -> Self {
        EngineError::Daemon {
            status,
            message: message.into(),
        }
    }

    /// Returns the HTTP status reported by the daemon, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            EngineError::Daemon { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Fatal outcome of a reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to connect to the engine: {0}")]
    EngineUnreachable(String),
    #[error("Minimum Docker version required is {minimum}, found {found}")]
    UnsupportedEngineVersion { found: String, minimum: String },
    #[error("image {0} not found after pull")]
    ImageNotFound(String),
    #[error("engine call {operation} failed: {source}")]
    Engine {
        operation: &'static str,
        #[source]
        source: EngineError,
    },
    #[error("deadline exceeded during {operation}")]
    DeadlineExceeded { operation: &'static str },
}

impl ReconcileError {
    /// Classifies an adapter failure raised while running `operation`.
    pub fn from_engine(operation: &'static str, err: EngineError) -> Self {
        match err {
            EngineError::Unreachable(reason) => ReconcileError::EngineUnreachable(reason),
            EngineError::ImageNotFound(image) => ReconcileError::ImageNotFound(image),
            source => ReconcileError::Engine { operation, source },
        }
    }
}
