//! Transport seam between the proxy and the message bus.
//!
//! The proxy never talks to a bus directly. It holds a [`Transport`], asks it
//! for handles bound to a destination/interface/object-path triple and
//! dispatches calls through those handles.
//!
//! # Implementations
//!
//! - [`MemoryTransport`]: in-process scripted backend (tests, embedding)
//! - `ZbusTransport`: real system or session bus, behind the `zbus` feature

pub mod memory;
#[cfg(feature = "zbus")]
pub mod dbus;

pub use memory::{BindRecord, CallRecord, MemoryHandle, MemoryTransport};
#[cfg(feature = "zbus")]
pub use dbus::{BusType, ZbusHandle, ZbusTransport};

use crate::value::Value;
use enumflags2::{bitflags, BitFlags};
use thiserror::Error;

/// Dispatch flags applied to outgoing method calls.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallFlag {
    /// Do not let the bus start the destination service.
    NoAutoStart = 0x2,
    /// The caller is prepared to wait for interactive authorization.
    AllowInteractiveAuth = 0x4,
}

/// Set of [`CallFlag`]s. Empty by default.
pub type CallFlags = BitFlags<CallFlag>;

/// Failure reported by the transport, carrying the bus's own error text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the text a bus error reply renders to: `<error name>: <description>`.
    pub fn method_error(name: &str, description: &str) -> Self {
        Self::new(format!("{name}: {description}"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result type alias for transport primitives.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Connection and dispatch primitives the proxy is built on.
///
/// All methods block the calling thread. None of them apply a timeout of
/// their own; bounding latency is the transport's connection-level concern.
pub trait Transport {
    /// A handle bound to one destination/interface/object-path triple.
    type Handle;

    /// Establish the bus connection. Connecting an already connected
    /// transport is a no-op.
    fn connect(&self) -> TransportResult<()>;

    /// Whether [`Transport::connect`] has succeeded.
    fn is_connected(&self) -> bool;

    /// Bind a handle. `Ok(None)` means the bus produced no handle and no error.
    fn bind_handle(
        &self,
        bus_name: &str,
        interface: &str,
        object_path: &str,
    ) -> TransportResult<Option<Self::Handle>>;

    /// Call `method` and wait for the reply body.
    ///
    /// `Ok(None)` means the bus returned neither a reply nor an error.
    fn sync_call(
        &self,
        handle: &Self::Handle,
        method: &str,
        args: &[Value],
        flags: CallFlags,
    ) -> TransportResult<Option<Value>>;

    /// Send `method` without waiting for, or expecting, a reply.
    fn call_no_reply(
        &self,
        handle: &Self::Handle,
        method: &str,
        args: &[Value],
        flags: CallFlags,
    ) -> TransportResult<()>;

    /// Give a bound handle back to the transport.
    fn release_handle(&self, handle: Self::Handle);
}
