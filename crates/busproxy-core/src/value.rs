//! Dynamically typed values exchanged with the bus.
//!
//! Arguments, replies and property values all travel as [`Value`]. The proxy
//! never interprets them beyond unwrapping property variants and narrowing to
//! the primitive types the typed accessors offer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A D-Bus value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Boolean (`b`)
    Bool(bool),
    /// Unsigned 8-bit integer (`y`)
    Byte(u8),
    /// Signed 16-bit integer (`n`)
    Int16(i16),
    /// Unsigned 16-bit integer (`q`)
    Uint16(u16),
    /// Signed 32-bit integer (`i`)
    Int32(i32),
    /// Unsigned 32-bit integer (`u`)
    Uint32(u32),
    /// Signed 64-bit integer (`x`)
    Int64(i64),
    /// Unsigned 64-bit integer (`t`)
    Uint64(u64),
    /// Double-precision float (`d`)
    Double(f64),
    /// UTF-8 string (`s`)
    String(String),
    /// Object path (`o`)
    ObjectPath(String),
    /// Array of values
    Array(Vec<Value>),
    /// String-keyed dictionary (`a{sv}` style)
    Dict(BTreeMap<String, Value>),
    /// Variant (boxed value)
    Variant(Box<Value>),
    /// Structure, also used for whole argument lists and reply bodies
    Tuple(Vec<Value>),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Create an object path value.
    pub fn object_path(path: impl Into<String>) -> Self {
        Value::ObjectPath(path.into())
    }

    /// Create a variant value.
    pub fn variant(inner: Value) -> Self {
        Value::Variant(Box::new(inner))
    }

    /// Create an empty structure, the reply body of methods returning nothing.
    pub fn unit() -> Self {
        Value::Tuple(Vec::new())
    }

    /// Short name of the contained type, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Int16(_) => "int16",
            Value::Uint16(_) => "uint16",
            Value::Int32(_) => "int32",
            Value::Uint32(_) => "uint32",
            Value::Int64(_) => "int64",
            Value::Uint64(_) => "uint64",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::ObjectPath(_) => "object path",
            Value::Array(_) => "array",
            Value::Dict(_) => "dict",
            Value::Variant(_) => "variant",
            Value::Tuple(_) => "struct",
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as u32
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Uint32(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get as u64
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint64(n) => Some(*n),
            _ => None,
        }
    }

    /// Unwrap a property reply.
    ///
    /// `Get` replies with a one-field structure holding a variant. Bare
    /// variants and unwrapped single fields are accepted too, since not every
    /// transport keeps the outer structure.
    pub fn into_property_value(self) -> Option<Value> {
        match self {
            Value::Tuple(mut fields) if fields.len() == 1 => match fields.remove(0) {
                Value::Variant(inner) => Some(*inner),
                other => Some(other),
            },
            Value::Variant(inner) => Some(*inner),
            Value::Tuple(_) => None,
            other => Some(other),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Byte(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Uint32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
