//! busproxy core - Resilient blocking client proxy for D-Bus services.
//!
//! A [`ProxyHandle`] talks to one object of one service: it dispatches method
//! calls, reads and writes properties, and offers bounded retry procedures for
//! services that are still starting up. Raw bus failures are classified into
//! a small set of typed outcomes ([`ProxyError`]).
//!
//! The bus itself sits behind the [`Transport`] trait. [`ZbusTransport`]
//! (feature `zbus`, on by default) uses a real system or session bus,
//! [`MemoryTransport`] is a scriptable in-process backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use busproxy_core::{BusType, ConnectionSource, ProxyHandle, ServiceEndpoint, SetupMode, ZbusTransport};
//!
//! fn main() -> busproxy_core::Result<()> {
//!     let proxy = ProxyHandle::new(
//!         ConnectionSource::owned(ZbusTransport::new(BusType::System)),
//!         ServiceEndpoint::new(
//!             "org.freedesktop.hostname1",
//!             "org.freedesktop.hostname1",
//!             "/org/freedesktop/hostname1",
//!         ),
//!         SetupMode::Immediate,
//!     )?;
//!
//!     proxy.ping()?;
//!     println!("Hostname: {}", proxy.get_string("Hostname")?);
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod proxy;
pub mod retry;
pub mod transport;
pub mod value;

// Re-export commonly used types
pub use classify::{ClassifiedError, Operation};
pub use config::{Backoff, BusConfig, RetryConfig, RetryDefaults, RetrySchedule};
pub use endpoint::ServiceEndpoint;
pub use error::{ProxyError, Result};
pub use proxy::{CallMode, ConnectionSource, Ownership, ProxyHandle, SetupMode};
pub use retry::{RecordingSleeper, RetryStats, Sleeper, ThreadSleeper};
pub use transport::{
    CallFlag, CallFlags, MemoryTransport, Transport, TransportError, TransportResult,
};
#[cfg(feature = "zbus")]
pub use transport::{BusType, ZbusTransport};
pub use value::Value;
