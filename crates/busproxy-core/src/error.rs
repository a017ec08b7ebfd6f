//! Error types for busproxy.
//!
//! Every failure a proxy operation can surface is a variant of [`ProxyError`].
//! Raw bus failures are first classified (see [`crate::classify`]) and only then
//! turned into one of these variants, so callers can match on the kind instead
//! of grepping error strings.

use crate::classify::{self, ClassifiedError};
use thiserror::Error;

/// Main error type for busproxy.
#[derive(Debug, Error)]
pub enum ProxyError {
    // Argument validation
    #[error("{field} cannot be empty")]
    Validation { field: &'static str },

    // Proxy lifecycle
    #[error("Failed preparing proxy: {message}")]
    Setup { message: String },

    #[error("{message}")]
    Precondition { message: String },

    // Backend outcomes
    #[error("Access denied to {subject}")]
    AccessDenied {
        subject: String,
        /// Raw bus error text, kept apart from the display message.
        debug_detail: String,
    },

    #[error("{message}")]
    Generic { message: String },

    #[error("Unspecified error")]
    Unspecified,

    // Retry procedures
    #[error("Could not establish connection with {bus_name} after {attempts} attempts")]
    ServiceUnavailable { bus_name: String, attempts: u32 },

    #[error("D-Bus service '{bus_name}' did not respond after {attempts} attempts")]
    ServiceUnresponsive { bus_name: String, attempts: u32 },

    // Typed property access
    #[error("Property '{property}' holds a {actual} value, expected {expected}")]
    TypeMismatch {
        property: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Result type alias for busproxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

impl From<ClassifiedError> for ProxyError {
    fn from(err: ClassifiedError) -> Self {
        match err {
            ClassifiedError::AccessDenied {
                subject,
                debug_detail,
            } => ProxyError::AccessDenied {
                subject,
                debug_detail,
            },
            ClassifiedError::Unspecified => ProxyError::Unspecified,
            ClassifiedError::Generic { message } => ProxyError::Generic { message },
        }
    }
}

impl ProxyError {
    /// Build a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        ProxyError::Precondition {
            message: message.into(),
        }
    }

    /// Debug detail for access-denied errors.
    pub fn debug_detail(&self) -> Option<&str> {
        match self {
            ProxyError::AccessDenied { debug_detail, .. } => Some(debug_detail),
            _ => None,
        }
    }

    /// Check if the backend refused the request for permission reasons.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, ProxyError::AccessDenied { .. })
    }

    /// Check if the backend does not (yet) expose the requested method.
    ///
    /// Used by the version probe to detect a service that is still starting.
    pub fn is_unknown_method(&self) -> bool {
        match self {
            ProxyError::Generic { message } => classify::is_unknown_method(message),
            _ => false,
        }
    }

    /// Check if the backend reported that `property` is not declared.
    pub fn is_missing_property(&self, property: &str) -> bool {
        match self {
            ProxyError::Generic { message } => classify::is_missing_property(message, property),
            _ => false,
        }
    }
}
