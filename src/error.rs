use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum BindingError {
    /// A condition, descriptor, statement or binder was built from an invalid
    /// or incomplete combination of fields.
    #[error("construction error: {0}")]
    Construction(String),

    /// A subscriber could not resolve a usable address for the target's
    /// deployment context.
    #[error("binding resolution error: {0}")]
    Resolution(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Unknown resource: {0}")]
    UnknownResource(String),
}

impl BindingError {
    pub(crate) fn construction(msg: impl Into<String>) -> Self {
        BindingError::Construction(msg.into())
    }

    pub(crate) fn resolution(msg: impl Into<String>) -> Self {
        BindingError::Resolution(msg.into())
    }

    pub fn is_construction(&self) -> bool {
        matches!(self, BindingError::Construction(_))
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, BindingError::Resolution(_))
    }
}

impl From<serde_json::Error> for BindingError {
    fn from(err: serde_json::Error) -> Self {
        BindingError::InvalidFormat(err.to_string())
    }
}
