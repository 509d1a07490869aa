use thiserror::Error;

use crate::proto::{ResponseStatus, TransportError};

/// Structured error returned inside an otherwise successful response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteError {
    pub code: i32,
    pub message: String,
    pub extended: Vec<String>,
    pub suggestions: Vec<String>,
}

impl RemoteError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            extended: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

impl From<ResponseStatus> for RemoteError {
    fn from(status: ResponseStatus) -> Self {
        Self {
            code: status.error_code,
            message: status.error_message,
            extended: status.extended,
            suggestions: status.suggestions,
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        for extended in &self.extended {
            write!(f, "; {}", extended)?;
        }
        if !self.suggestions.is_empty() {
            write!(f, " (try: {})", self.suggestions.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum KeystoneError {
    #[error("actor or connection is nil")]
    NilActor,

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    #[error("Cannot marshal value: {0}")]
    CannotMarshal(String),

    #[error("Cannot marshal nil")]
    CannotMarshalNil,

    #[error("Invalid value for '{property}': {reason}")]
    InvalidValue { property: String, reason: String },

    #[error("Invalid hash id '{0}': must not contain '#'")]
    InvalidHashId(String),

    #[error("Invalid entity state: {0}")]
    InvalidState(String),

    #[error("A comment is required to mutate '{0}'")]
    CommentRequired(String),

    #[error("Reserved property name: {0}")]
    ReservedProperty(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Keystone error: {0}")]
    Remote(RemoteError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream closed: {0}")]
    StreamClosed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl KeystoneError {
    pub fn invalid_value(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// The remote error carried by this error, if the server produced one.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote(remote) => Some(remote),
            _ => None,
        }
    }

    /// True for stream terminations that callers treat as a clean shutdown.
    pub fn is_graceful_termination(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_graceful(),
            Self::StreamClosed(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, KeystoneError>;
