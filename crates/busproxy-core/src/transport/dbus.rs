//! Transport over a real D-Bus connection, using zbus.
//!
//! Each bound handle is a `zbus::blocking::Proxy` with property caching
//! turned off, so binding never subscribes to signals. Replies are decoded
//! whatever their signature, including the empty one. There is no reply
//! timeout; latency is bounded only by the connection itself.

use super::{CallFlag, CallFlags, Transport, TransportError, TransportResult};
use crate::value::Value;
use enumflags2::BitFlags;
use serde::de::{DeserializeSeed, Deserializer};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use zbus::blocking::proxy::Builder as ProxyBuilder;
use zbus::blocking::{Connection, Proxy};
use zbus::proxy::{CacheProperties, MethodFlags};
use zbus::zvariant::{
    self, DynamicDeserialize, DynamicType, OwnedStructure, OwnedStructureSeed, Signature,
    StructureBuilder,
};

impl From<zbus::Error> for TransportError {
    fn from(err: zbus::Error) -> Self {
        TransportError::new(err.to_string())
    }
}

impl From<zvariant::Error> for TransportError {
    fn from(err: zvariant::Error) -> Self {
        TransportError::new(format!("Invalid value: {err}"))
    }
}

/// Which message bus to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BusType {
    #[default]
    System,
    Session,
}

/// Handle bound to a validated destination/interface/path triple.
#[derive(Debug, Clone)]
pub struct ZbusHandle {
    proxy: Proxy<'static>,
}

/// [`Transport`] backed by a blocking zbus connection.
#[derive(Debug)]
pub struct ZbusTransport {
    bus: BusType,
    connection: Mutex<Option<Connection>>,
}

impl ZbusTransport {
    /// Transport that connects to `bus` on first use.
    pub fn new(bus: BusType) -> Self {
        Self {
            bus,
            connection: Mutex::new(None),
        }
    }

    /// Transport over an already established connection.
    pub fn from_connection(connection: Connection) -> Self {
        Self {
            bus: BusType::default(),
            connection: Mutex::new(Some(connection)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The underlying connection, once connected.
    pub fn connection(&self) -> Option<Connection> {
        self.lock().clone()
    }
}

/// Reply body of any signature. `None` for an empty body.
struct ReplyBody(Option<OwnedStructure>);

struct ReplySeed(Option<OwnedStructureSeed>);

impl ReplyBody {
    fn into_value(self) -> Value {
        match self.0 {
            Some(body) => Value::Tuple(body.0.fields().iter().map(from_zvariant).collect()),
            None => Value::unit(),
        }
    }
}

impl DynamicType for ReplyBody {
    fn signature(&self) -> Signature {
        match &self.0 {
            Some(body) => DynamicType::signature(body),
            None => Signature::Unit,
        }
    }
}

impl DynamicType for ReplySeed {
    fn signature(&self) -> Signature {
        match &self.0 {
            Some(seed) => DynamicType::signature(seed),
            None => Signature::Unit,
        }
    }
}

impl<'de> DynamicDeserialize<'de> for ReplyBody {
    type Deserializer = ReplySeed;

    fn deserializer_for_signature(signature: &Signature) -> zvariant::Result<ReplySeed> {
        match signature {
            Signature::Unit => Ok(ReplySeed(None)),
            _ => <OwnedStructure as DynamicDeserialize<'de>>::deserializer_for_signature(signature)
                .map(|seed| ReplySeed(Some(seed))),
        }
    }
}

impl<'de> DeserializeSeed<'de> for ReplySeed {
    type Value = ReplyBody;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<ReplyBody, D::Error>
    where
        D: Deserializer<'de>,
    {
        match self.0 {
            Some(seed) => seed
                .deserialize(deserializer)
                .map(|body| ReplyBody(Some(body))),
            None => Ok(ReplyBody(None)),
        }
    }
}

fn method_flags(flags: CallFlags, no_reply: bool) -> BitFlags<MethodFlags> {
    let mut mapped: BitFlags<MethodFlags> = flags
        .iter()
        .map(|flag| match flag {
            CallFlag::NoAutoStart => MethodFlags::NoAutoStart,
            CallFlag::AllowInteractiveAuth => MethodFlags::AllowInteractiveAuth,
        })
        .collect();
    if no_reply {
        mapped |= MethodFlags::NoReplyExpected;
    }
    mapped
}

/// Send `method` with `args` as its body, waiting for the reply unless
/// `NoReplyExpected` is among `flags`.
fn send_call(
    handle: &ZbusHandle,
    method: &str,
    args: &[Value],
    flags: BitFlags<MethodFlags>,
) -> TransportResult<Option<ReplyBody>> {
    if args.is_empty() {
        return Ok(handle.proxy.call_with_flags(method, flags, &())?);
    }
    let body = args
        .iter()
        .try_fold(StructureBuilder::new(), |fields, arg| {
            to_zvariant(arg).map(|field| fields.append_field(field))
        })?
        .build()?;
    Ok(handle.proxy.call_with_flags(method, flags, &body)?)
}

/// Convert a [`Value`] into its wire representation.
///
/// Empty arrays are sent as `av`. Dictionary values are always variants.
pub fn to_zvariant(value: &Value) -> TransportResult<zvariant::Value<'static>> {
    Ok(match value {
        Value::Bool(v) => zvariant::Value::from(*v),
        Value::Byte(v) => zvariant::Value::from(*v),
        Value::Int16(v) => zvariant::Value::from(*v),
        Value::Uint16(v) => zvariant::Value::from(*v),
        Value::Int32(v) => zvariant::Value::from(*v),
        Value::Uint32(v) => zvariant::Value::from(*v),
        Value::Int64(v) => zvariant::Value::from(*v),
        Value::Uint64(v) => zvariant::Value::from(*v),
        Value::Double(v) => zvariant::Value::from(*v),
        Value::String(v) => zvariant::Value::from(v.clone()),
        Value::ObjectPath(v) => {
            zvariant::Value::ObjectPath(zvariant::ObjectPath::try_from(v.clone())?)
        }
        Value::Array(items) => {
            let items = items
                .iter()
                .map(to_zvariant)
                .collect::<TransportResult<Vec<_>>>()?;
            let element = items
                .first()
                .map(|first| first.value_signature().clone())
                .unwrap_or(Signature::Variant);
            let mut array = zvariant::Array::new(&element);
            for item in items {
                array.append(item)?;
            }
            zvariant::Value::Array(array)
        }
        Value::Dict(entries) => {
            let mut dict = zvariant::Dict::new(&Signature::Str, &Signature::Variant);
            for (key, entry) in entries {
                let entry = match to_zvariant(entry)? {
                    wrapped @ zvariant::Value::Value(_) => wrapped,
                    bare => zvariant::Value::Value(Box::new(bare)),
                };
                dict.append(zvariant::Value::from(key.clone()), entry)?;
            }
            zvariant::Value::Dict(dict)
        }
        Value::Variant(inner) => zvariant::Value::Value(Box::new(to_zvariant(inner)?)),
        Value::Tuple(fields) => {
            let structure = fields
                .iter()
                .try_fold(StructureBuilder::new(), |builder, field| {
                    to_zvariant(field).map(|field| builder.append_field(field))
                })?
                .build()?;
            zvariant::Value::Structure(structure)
        }
    })
}

/// Convert a wire value into a [`Value`].
///
/// Types without a [`Value`] counterpart (signatures, file descriptors) are
/// rendered as strings.
pub fn from_zvariant(value: &zvariant::Value<'_>) -> Value {
    match value {
        zvariant::Value::Bool(v) => Value::Bool(*v),
        zvariant::Value::U8(v) => Value::Byte(*v),
        zvariant::Value::I16(v) => Value::Int16(*v),
        zvariant::Value::U16(v) => Value::Uint16(*v),
        zvariant::Value::I32(v) => Value::Int32(*v),
        zvariant::Value::U32(v) => Value::Uint32(*v),
        zvariant::Value::I64(v) => Value::Int64(*v),
        zvariant::Value::U64(v) => Value::Uint64(*v),
        zvariant::Value::F64(v) => Value::Double(*v),
        zvariant::Value::Str(v) => Value::String(v.as_str().to_string()),
        zvariant::Value::ObjectPath(v) => Value::ObjectPath(v.as_str().to_string()),
        zvariant::Value::Value(inner) => Value::variant(from_zvariant(inner)),
        zvariant::Value::Array(items) => Value::Array(items.iter().map(from_zvariant).collect()),
        zvariant::Value::Dict(dict) => {
            let entries: BTreeMap<String, Value> = dict
                .iter()
                .map(|(key, entry)| (dict_key(key), from_zvariant(entry)))
                .collect();
            Value::Dict(entries)
        }
        zvariant::Value::Structure(structure) => {
            Value::Tuple(structure.fields().iter().map(from_zvariant).collect())
        }
        other => Value::String(other.to_string()),
    }
}

fn dict_key(key: &zvariant::Value<'_>) -> String {
    match from_zvariant(key) {
        Value::String(s) | Value::ObjectPath(s) => s,
        _ => key.to_string(),
    }
}

impl Transport for ZbusTransport {
    type Handle = ZbusHandle;

    fn connect(&self) -> TransportResult<()> {
        let mut connection = self.lock();
        if connection.is_some() {
            return Ok(());
        }

        let established = match self.bus {
            BusType::System => Connection::system()?,
            BusType::Session => Connection::session()?,
        };
        debug!(
            "Connected to {:?} bus as {:?}",
            self.bus,
            established.unique_name()
        );
        *connection = Some(established);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    fn bind_handle(
        &self,
        bus_name: &str,
        interface: &str,
        object_path: &str,
    ) -> TransportResult<Option<ZbusHandle>> {
        let connection = self
            .connection()
            .ok_or_else(|| TransportError::new("Not connected to the message bus"))?;

        let proxy: Proxy<'static> = ProxyBuilder::new(&connection)
            .destination(bus_name.to_string())?
            .path(object_path.to_string())?
            .interface(interface.to_string())?
            .cache_properties(CacheProperties::No)
            .build()?;
        Ok(Some(ZbusHandle { proxy }))
    }

    fn sync_call(
        &self,
        handle: &ZbusHandle,
        method: &str,
        args: &[Value],
        flags: CallFlags,
    ) -> TransportResult<Option<Value>> {
        let reply = send_call(handle, method, args, method_flags(flags, false))?;
        Ok(reply.map(ReplyBody::into_value))
    }

    fn call_no_reply(
        &self,
        handle: &ZbusHandle,
        method: &str,
        args: &[Value],
        flags: CallFlags,
    ) -> TransportResult<()> {
        send_call(handle, method, args, method_flags(flags, true))?;
        Ok(())
    }

    fn release_handle(&self, handle: ZbusHandle) {
        debug!(
            "Released handle for {} on {}",
            handle.proxy.interface(),
            handle.proxy.path()
        );
    }
}
