//! Addressing of a remote object.

use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};

/// Destination, interface and object path a proxy talks to.
///
/// Immutable once handed to a [`crate::ProxyHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub bus_name: String,
    pub interface: String,
    pub object_path: String,
}

impl ServiceEndpoint {
    pub fn new(
        bus_name: impl Into<String>,
        interface: impl Into<String>,
        object_path: impl Into<String>,
    ) -> Self {
        Self {
            bus_name: bus_name.into(),
            interface: interface.into(),
            object_path: object_path.into(),
        }
    }

    /// Fail fast on any empty field.
    pub fn validate(&self) -> Result<()> {
        if self.bus_name.is_empty() {
            return Err(ProxyError::Validation { field: "Bus name" });
        }
        if self.interface.is_empty() {
            return Err(ProxyError::Validation { field: "Interface" });
        }
        if self.object_path.is_empty() {
            return Err(ProxyError::Validation {
                field: "Object path",
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{} ({})", self.bus_name, self.object_path, self.interface)
    }
}
