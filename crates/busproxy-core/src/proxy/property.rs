//! Property access through `org.freedesktop.DBus.Properties`.
//!
//! Every read is a `Get` round trip; nothing is cached locally.

use super::ProxyHandle;
use crate::classify::Operation;
use crate::config::BusConfig;
use crate::error::{ProxyError, Result};
use crate::transport::Transport;
use crate::value::Value;

fn validate_property(property: &str) -> Result<()> {
    if property.is_empty() {
        return Err(ProxyError::Validation { field: "Property" });
    }
    Ok(())
}

fn mismatch(property: &str, expected: &'static str, actual: &Value) -> ProxyError {
    ProxyError::TypeMismatch {
        property: property.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

impl<T: Transport> ProxyHandle<T> {
    /// Read `property` of this proxy's interface.
    pub fn get_property(&self, property: &str) -> Result<Value> {
        validate_property(property)?;
        let handle = self.property_handle()?;

        let args = [
            Value::string(self.interface()),
            Value::string(property),
        ];
        let reply = self.invoke(
            handle,
            Operation::GetProperty { property },
            BusConfig::PROPERTY_GET,
            &args,
        )?;
        reply.into_property_value().ok_or(ProxyError::Unspecified)
    }

    pub fn get_bool(&self, property: &str) -> Result<bool> {
        let value = self.get_property(property)?;
        value
            .as_bool()
            .ok_or_else(|| mismatch(property, "boolean", &value))
    }

    pub fn get_string(&self, property: &str) -> Result<String> {
        match self.get_property(property)? {
            Value::String(s) => Ok(s),
            other => Err(mismatch(property, "string", &other)),
        }
    }

    pub fn get_u32(&self, property: &str) -> Result<u32> {
        let value = self.get_property(property)?;
        value
            .as_u32()
            .ok_or_else(|| mismatch(property, "uint32", &value))
    }

    pub fn get_u64(&self, property: &str) -> Result<u64> {
        let value = self.get_property(property)?;
        value
            .as_u64()
            .ok_or_else(|| mismatch(property, "uint64", &value))
    }

    /// Write `value` to `property` of this proxy's interface.
    pub fn set_property(&self, property: &str, value: impl Into<Value>) -> Result<()> {
        validate_property(property)?;
        let handle = self.property_handle()?;

        let args = [
            Value::string(self.interface()),
            Value::string(property),
            Value::variant(value.into()),
        ];
        self.invoke(
            handle,
            Operation::SetProperty { property },
            BusConfig::PROPERTY_SET,
            &args,
        )?;
        Ok(())
    }

    pub fn set_bool(&self, property: &str, value: bool) -> Result<()> {
        self.set_property(property, Value::Bool(value))
    }

    pub fn set_string(&self, property: &str, value: &str) -> Result<()> {
        self.set_property(property, Value::string(value))
    }

    pub fn set_u32(&self, property: &str, value: u32) -> Result<()> {
        self.set_property(property, Value::Uint32(value))
    }

    pub fn set_u64(&self, property: &str, value: u64) -> Result<()> {
        self.set_property(property, Value::Uint64(value))
    }
}
