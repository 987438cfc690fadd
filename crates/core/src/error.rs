use std::fmt;

/// Result alias that carries the custom [`RigError`] type.
pub type Result<T> = std::result::Result<T, RigError>;

/// The kind of rig entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Parameter,
    Motion,
    Expression,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Parameter => "parameter",
            Self::Motion => "motion",
            Self::Expression => "expression",
        };
        f.write_str(label)
    }
}

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum RigError {
    /// The requested parameter, motion or expression does not exist on the
    /// active rig. The operation was a no-op.
    #[error("unknown {kind} `{id}`")]
    NotFound { kind: EntityKind, id: String },
    /// No rig is loaded.
    #[error("no rig is loaded")]
    NotReady,
    /// The rig supplied metadata the engine cannot work with.
    #[error("invalid rig metadata: {0}")]
    InvalidMetadata(String),
    /// A command carried NaN or an infinity.
    #[error("parameter `{id}` received a non-finite value")]
    NonFinite { id: String },
    /// A thread panicked while holding shared engine state.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl RigError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<&str> for RigError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for RigError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
