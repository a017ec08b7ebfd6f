//! Parsing of typed values given on the command line.

use anyhow::{anyhow, bail, Context, Result};
use busproxy_core::Value;
use clap::ValueEnum;

/// Property types accepted by `set --type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PropertyType {
    Bool,
    String,
    U32,
    U64,
}

impl PropertyType {
    fn tag(self) -> &'static str {
        match self {
            PropertyType::Bool => "bool",
            PropertyType::String => "string",
            PropertyType::U32 => "u32",
            PropertyType::U64 => "u64",
        }
    }
}

/// Parse `raw` as a value of the given property type.
pub fn parse_property(kind: PropertyType, raw: &str) -> Result<Value> {
    parse_tagged(kind.tag(), raw)
}

/// Parse a `type:value` method argument, e.g. `u32:5` or `path:/net/example`.
pub fn parse_argument(arg: &str) -> Result<Value> {
    let (tag, raw) = arg
        .split_once(':')
        .ok_or_else(|| anyhow!("Argument '{arg}' is not of the form type:value"))?;
    parse_tagged(tag, raw)
}

fn parse_tagged(tag: &str, raw: &str) -> Result<Value> {
    let value = match tag {
        "bool" | "b" => Value::Bool(parse_bool(raw)?),
        "byte" | "y" => Value::Byte(raw.parse().with_context(|| invalid(tag, raw))?),
        "i16" | "n" => Value::Int16(raw.parse().with_context(|| invalid(tag, raw))?),
        "u16" | "q" => Value::Uint16(raw.parse().with_context(|| invalid(tag, raw))?),
        "i32" | "i" => Value::Int32(raw.parse().with_context(|| invalid(tag, raw))?),
        "u32" | "u" => Value::Uint32(raw.parse().with_context(|| invalid(tag, raw))?),
        "i64" | "x" => Value::Int64(raw.parse().with_context(|| invalid(tag, raw))?),
        "u64" | "t" => Value::Uint64(raw.parse().with_context(|| invalid(tag, raw))?),
        "double" | "d" => Value::Double(raw.parse().with_context(|| invalid(tag, raw))?),
        "string" | "s" => Value::string(raw),
        "path" | "o" => Value::object_path(raw),
        other => bail!("Unknown argument type '{other}'"),
    };
    Ok(value)
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => bail!("'{raw}' is not a boolean"),
    }
}

fn invalid(tag: &str, raw: &str) -> String {
    format!("'{raw}' is not a valid {tag}")
}
