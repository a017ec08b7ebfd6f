//! In-process transport with a scriptable backend.
//!
//! `MemoryTransport` plays both sides of the bus: it hands out handles, keeps
//! a journal of everything the proxy does, and answers calls from
//!
//! 1. replies queued with [`MemoryTransport::push_reply`] (consumed in order),
//! 2. responders registered with [`MemoryTransport::respond`],
//! 3. built-in behaviour for the standard property and peer interfaces.
//!
//! Anything else fails with `org.freedesktop.DBus.Error.UnknownMethod`, the
//! same way a real service that does not implement the method would.

use super::{CallFlags, Transport, TransportError, TransportResult};
use crate::classify::UNKNOWN_METHOD;
use crate::config::BusConfig;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

const INVALID_ARGS_ERROR: &str = "org.freedesktop.DBus.Error.InvalidArgs";

type Responder = Box<dyn FnMut(&CallRecord) -> TransportResult<Option<Value>> + Send>;
type MethodKey = (String, String);

/// Handle bound by a [`MemoryTransport`].
#[derive(Debug, PartialEq, Eq)]
pub struct MemoryHandle {
    id: u64,
    bus_name: String,
    interface: String,
    object_path: String,
}

impl MemoryHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }
}

/// A successful bind, as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindRecord {
    pub handle_id: u64,
    pub bus_name: String,
    pub interface: String,
    pub object_path: String,
}

/// A dispatched call, as seen by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub handle_id: u64,
    pub bus_name: String,
    pub interface: String,
    pub object_path: String,
    pub method: String,
    pub args: Vec<Value>,
    pub flags: CallFlags,
    /// Sent without waiting for a reply.
    pub no_reply: bool,
}

#[derive(Default)]
struct State {
    connections: u32,
    connected: bool,
    connect_failure: Option<String>,
    bind_failure: Option<String>,
    bind_yields_nothing: bool,
    next_handle: u64,
    binds: Vec<BindRecord>,
    released: Vec<u64>,
    calls: Vec<CallRecord>,
    properties: BTreeMap<MethodKey, Value>,
    scripted: HashMap<MethodKey, VecDeque<TransportResult<Option<Value>>>>,
    responders: HashMap<MethodKey, Responder>,
}

/// Scriptable in-memory transport.
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryTransport")
            .field("connected", &state.connected)
            .field("binds", &state.binds.len())
            .field("calls", &state.calls.len())
            .finish_non_exhaustive()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Backend scripting

    /// Store a property value served by `Get`/`GetAll`.
    pub fn set_property(&self, interface: &str, property: &str, value: impl Into<Value>) {
        self.lock()
            .properties
            .insert((interface.to_string(), property.to_string()), value.into());
    }

    /// Current value of a stored property.
    pub fn property(&self, interface: &str, property: &str) -> Option<Value> {
        self.lock()
            .properties
            .get(&(interface.to_string(), property.to_string()))
            .cloned()
    }

    /// Queue the outcome of the next call to `interface.method`.
    pub fn push_reply(
        &self,
        interface: &str,
        method: &str,
        outcome: TransportResult<Option<Value>>,
    ) {
        self.lock()
            .scripted
            .entry((interface.to_string(), method.to_string()))
            .or_default()
            .push_back(outcome);
    }

    /// Queue the same failure `times` times for `interface.method`.
    pub fn push_failures(&self, interface: &str, method: &str, error: &TransportError, times: usize) {
        for _ in 0..times {
            self.push_reply(interface, method, Err(error.clone()));
        }
    }

    /// Answer every call to `interface.method` with `responder`.
    ///
    /// The responder runs without the transport's lock held and may script
    /// the transport itself, e.g. to model a side effect with `set_property`.
    pub fn respond<F>(&self, interface: &str, method: &str, responder: F)
    where
        F: FnMut(&CallRecord) -> TransportResult<Option<Value>> + Send + 'static,
    {
        self.lock()
            .responders
            .insert((interface.to_string(), method.to_string()), Box::new(responder));
    }

    /// Make `connect` fail with `message`, or succeed again with `None`.
    pub fn fail_connect(&self, message: Option<&str>) {
        self.lock().connect_failure = message.map(str::to_string);
    }

    /// Make `bind_handle` fail with `message`, or succeed again with `None`.
    pub fn fail_binds(&self, message: Option<&str>) {
        self.lock().bind_failure = message.map(str::to_string);
    }

    /// Make `bind_handle` return neither a handle nor an error.
    pub fn bind_yields_nothing(&self, enabled: bool) {
        self.lock().bind_yields_nothing = enabled;
    }

    // Journal

    /// Number of times a connection was actually established.
    pub fn connection_count(&self) -> u32 {
        self.lock().connections
    }

    pub fn binds(&self) -> Vec<BindRecord> {
        self.lock().binds.clone()
    }

    /// Ids of released handles, in release order.
    pub fn released(&self) -> Vec<u64> {
        self.lock().released.clone()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.lock().calls.clone()
    }

    /// Number of calls made to `interface.method`.
    pub fn call_count(&self, interface: &str, method: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.interface == interface && c.method == method)
            .count()
    }

    fn dispatch(
        &self,
        handle: &MemoryHandle,
        method: &str,
        args: &[Value],
        flags: CallFlags,
        no_reply: bool,
    ) -> TransportResult<Option<Value>> {
        let record = CallRecord {
            handle_id: handle.id,
            bus_name: handle.bus_name.clone(),
            interface: handle.interface.clone(),
            object_path: handle.object_path.clone(),
            method: method.to_string(),
            args: args.to_vec(),
            flags,
            no_reply,
        };
        let key = (record.interface.clone(), record.method.clone());

        let mut state = self.lock();
        state.calls.push(record.clone());

        if let Some(outcome) = state.scripted.get_mut(&key).and_then(VecDeque::pop_front) {
            return outcome;
        }
        let Some(mut responder) = state.responders.remove(&key) else {
            return builtin_reply(&mut state.properties, &record);
        };

        // Unlocked: responders may call back into the transport.
        drop(state);
        let outcome = responder(&record);
        self.lock().responders.entry(key).or_insert(responder);
        outcome
    }
}

fn builtin_reply(
    properties: &mut BTreeMap<MethodKey, Value>,
    call: &CallRecord,
) -> TransportResult<Option<Value>> {
    let string_arg = |idx: usize| call.args.get(idx).and_then(Value::as_str);

    match (call.interface.as_str(), call.method.as_str()) {
        (BusConfig::PROPERTIES_INTERFACE, BusConfig::PROPERTY_GET) => {
            let (Some(interface), Some(property)) = (string_arg(0), string_arg(1)) else {
                return Err(invalid_args("Expected (ss) arguments"));
            };
            properties
                .get(&(interface.to_string(), property.to_string()))
                .map(|value| Some(Value::Tuple(vec![Value::variant(value.clone())])))
                .ok_or_else(|| invalid_args(&format!("No such property '{property}'")))
        }
        (BusConfig::PROPERTIES_INTERFACE, BusConfig::PROPERTY_SET) => {
            let (Some(interface), Some(property), Some(value)) =
                (string_arg(0), string_arg(1), call.args.get(2))
            else {
                return Err(invalid_args("Expected (ssv) arguments"));
            };
            let value = match value {
                Value::Variant(inner) => (**inner).clone(),
                other => other.clone(),
            };
            properties.insert((interface.to_string(), property.to_string()), value);
            Ok(Some(Value::unit()))
        }
        (BusConfig::PROPERTIES_INTERFACE, BusConfig::PROPERTY_GET_ALL) => {
            let Some(interface) = string_arg(0) else {
                return Err(invalid_args("Expected (s) arguments"));
            };
            let all = properties
                .iter()
                .filter(|((iface, _), _)| iface == interface)
                .map(|((_, name), value)| (name.clone(), Value::variant(value.clone())))
                .collect();
            Ok(Some(Value::Tuple(vec![Value::Dict(all)])))
        }
        (BusConfig::PEER_INTERFACE, BusConfig::PEER_PING) => Ok(Some(Value::unit())),
        (interface, method) => Err(TransportError::method_error(
            UNKNOWN_METHOD,
            &format!("No such method '{method}' on interface '{interface}'"),
        )),
    }
}

fn invalid_args(description: &str) -> TransportError {
    TransportError::method_error(INVALID_ARGS_ERROR, description)
}

impl Transport for MemoryTransport {
    type Handle = MemoryHandle;

    fn connect(&self) -> TransportResult<()> {
        let mut state = self.lock();
        if state.connected {
            return Ok(());
        }
        if let Some(message) = &state.connect_failure {
            return Err(TransportError::new(message.clone()));
        }
        state.connected = true;
        state.connections += 1;
        debug!("Memory transport connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn bind_handle(
        &self,
        bus_name: &str,
        interface: &str,
        object_path: &str,
    ) -> TransportResult<Option<MemoryHandle>> {
        let mut state = self.lock();
        if !state.connected {
            return Err(TransportError::new("Not connected"));
        }
        if let Some(message) = &state.bind_failure {
            return Err(TransportError::new(message.clone()));
        }
        if state.bind_yields_nothing {
            return Ok(None);
        }

        state.next_handle += 1;
        let handle = MemoryHandle {
            id: state.next_handle,
            bus_name: bus_name.to_string(),
            interface: interface.to_string(),
            object_path: object_path.to_string(),
        };
        state.binds.push(BindRecord {
            handle_id: handle.id,
            bus_name: handle.bus_name.clone(),
            interface: handle.interface.clone(),
            object_path: handle.object_path.clone(),
        });
        Ok(Some(handle))
    }

    fn sync_call(
        &self,
        handle: &MemoryHandle,
        method: &str,
        args: &[Value],
        flags: CallFlags,
    ) -> TransportResult<Option<Value>> {
        self.dispatch(handle, method, args, flags, false)
    }

    fn call_no_reply(
        &self,
        handle: &MemoryHandle,
        method: &str,
        args: &[Value],
        flags: CallFlags,
    ) -> TransportResult<()> {
        // The backend still runs the method; only the outcome is dropped.
        self.dispatch(handle, method, args, flags, true).map(|_| ())
    }

    fn release_handle(&self, handle: MemoryHandle) {
        self.lock().released.push(handle.id);
    }
}
