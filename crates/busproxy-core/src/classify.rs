//! Classification of raw bus failures.
//!
//! D-Bus services report failures as a well-known error name followed by a
//! free-form description, and the transport hands that back to us as text.
//! There are no structured error codes to switch on, so the outcome kind is
//! recovered by looking for the error names the backend is known to use.

use crate::transport::TransportError;
use crate::value::Value;

/// Error name sent when the caller lacks permission.
pub const ACCESS_DENIED: &str = "org.freedesktop.DBus.Error.AccessDenied";

/// Error name sent when the object does not (yet) implement a method or interface.
pub const UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";

/// Error name prefix used for rejected arguments, including undeclared properties.
pub const INVALID_ARGS: &str = "DBus.Error.InvalidArgs";

/// Typed outcome of a failed dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedError {
    /// The backend refused the request.
    AccessDenied {
        /// Method or property involved.
        subject: String,
        /// Raw bus error text.
        debug_detail: String,
    },
    /// The backend returned neither a reply nor an error.
    Unspecified,
    /// Any other backend failure, decorated with the operation name.
    Generic { message: String },
}

/// The kind of request whose outcome is being classified.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    /// Method call on the main interface.
    Call { method: &'a str },
    /// `Get` on the property interface.
    GetProperty { property: &'a str },
    /// `Set` on the property interface.
    SetProperty { property: &'a str },
}

impl Operation<'_> {
    fn subject(&self) -> String {
        match self {
            Operation::Call { .. } => "method".to_string(),
            Operation::GetProperty { property } | Operation::SetProperty { property } => {
                format!("{property} property")
            }
        }
    }

    fn decorate(&self, raw: &str) -> String {
        match self {
            Operation::Call { method } => format!("Failed calling D-Bus method {method}: {raw}"),
            Operation::GetProperty { property } => {
                format!("Failed retrieving property value for '{property}': {raw}")
            }
            Operation::SetProperty { property } => {
                format!("Failed setting new property value on '{property}': {raw}")
            }
        }
    }
}

/// Check whether a raw or decorated error message reports an access denial.
pub fn is_access_denied(message: &str) -> bool {
    message.contains(ACCESS_DENIED)
}

/// Check whether a raw or decorated error message reports an unknown method.
pub fn is_unknown_method(message: &str) -> bool {
    message.contains(UNKNOWN_METHOD)
}

/// Check whether an error message reports that `property` is not declared.
pub fn is_missing_property(message: &str, property: &str) -> bool {
    message.contains(&format!("{INVALID_ARGS}: No such property '{property}'"))
}

/// Classify a transport error for the given operation.
pub fn classify_error(op: Operation<'_>, err: &TransportError) -> ClassifiedError {
    let raw = err.message();
    if is_access_denied(raw) {
        return ClassifiedError::AccessDenied {
            subject: op.subject(),
            debug_detail: raw.to_string(),
        };
    }
    ClassifiedError::Generic {
        message: op.decorate(raw),
    }
}

/// Turn the raw result of a blocking call into a reply or a typed error.
pub fn classify(
    op: Operation<'_>,
    outcome: std::result::Result<Option<Value>, TransportError>,
) -> std::result::Result<Value, ClassifiedError> {
    match outcome {
        Ok(Some(reply)) => Ok(reply),
        Ok(None) => Err(ClassifiedError::Unspecified),
        Err(err) => Err(classify_error(op, &err)),
    }
}
