//! Proxy handle for one remote object.
//!
//! A [`ProxyHandle`] holds two handles bound through its [`Transport`]: one
//! for the object's own interface and one for the standard property-access
//! interface at the same path. Method calls ([`call`]), property access
//! ([`property`]) and the retry procedures ([`probe`]) are all built on these.
//!
//! # Ownership
//!
//! A handle either owns its connection or borrows one shared with other
//! handles ([`ConnectionSource`]). Bound handles are released exactly once,
//! when the proxy is dropped or rebound, and only if the connection is owned.

pub mod call;
pub mod probe;
pub mod property;

pub use call::CallMode;

use crate::config::{BusConfig, RetryConfig};
use crate::endpoint::ServiceEndpoint;
use crate::error::{ProxyError, Result};
use crate::retry::{Sleeper, ThreadSleeper};
use crate::transport::{CallFlags, Transport};
use std::sync::Arc;
use tracing::debug;

/// Where a proxy gets its transport from.
#[derive(Debug)]
pub enum ConnectionSource<T> {
    /// The proxy is responsible for releasing what it binds.
    Owned(Arc<T>),
    /// The connection belongs to someone else; nothing is ever released.
    Borrowed(Arc<T>),
}

impl<T> ConnectionSource<T> {
    /// Wrap a transport the proxy will own.
    pub fn owned(transport: T) -> Self {
        ConnectionSource::Owned(Arc::new(transport))
    }

    /// Share an existing transport.
    pub fn borrowed(transport: &Arc<T>) -> Self {
        ConnectionSource::Borrowed(Arc::clone(transport))
    }

    fn into_parts(self) -> (Arc<T>, Ownership) {
        match self {
            ConnectionSource::Owned(transport) => (transport, Ownership::Owned),
            ConnectionSource::Borrowed(transport) => (transport, Ownership::Borrowed),
        }
    }
}

/// Whether a proxy owns its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Borrowed,
}

/// When the bound handles are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupMode {
    /// Bind both handles during construction.
    #[default]
    Immediate,
    /// Leave binding to an explicit [`ProxyHandle::setup`].
    Deferred,
}

/// Client-side proxy for one object on the bus.
///
/// Not meant for concurrent use; create one handle per thread instead.
pub struct ProxyHandle<T: Transport> {
    transport: Arc<T>,
    ownership: Ownership,
    endpoint: ServiceEndpoint,
    main: Option<T::Handle>,
    properties: Option<T::Handle>,
    call_flags: CallFlags,
    retry: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl<T: Transport> ProxyHandle<T> {
    /// Create a proxy for `endpoint`.
    ///
    /// Fails with [`ProxyError::Validation`] if any endpoint field is empty,
    /// and with [`ProxyError::Setup`] if immediate binding fails.
    pub fn new(
        source: ConnectionSource<T>,
        endpoint: ServiceEndpoint,
        mode: SetupMode,
    ) -> Result<Self> {
        endpoint.validate()?;

        let (transport, ownership) = source.into_parts();
        let mut proxy = Self {
            transport,
            ownership,
            endpoint,
            main: None,
            properties: None,
            call_flags: CallFlags::empty(),
            retry: RetryConfig::default(),
            sleeper: Arc::new(ThreadSleeper),
        };

        if mode == SetupMode::Immediate {
            proxy.setup()?;
        }
        Ok(proxy)
    }

    /// Replace the retry schedules.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replace how retry delays are spent.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Bind whichever of the two handles is not bound yet.
    pub fn setup(&mut self) -> Result<()> {
        if self.main.is_none() {
            self.main = Some(self.bind(&self.endpoint.interface, &self.endpoint.object_path)?);
        }
        if self.properties.is_none() {
            self.properties =
                Some(self.bind(BusConfig::PROPERTIES_INTERFACE, &self.endpoint.object_path)?);
        }
        Ok(())
    }

    /// Release both handles (when owned) and bind them again.
    pub fn rebind(&mut self) -> Result<()> {
        self.release_bound();
        self.setup()
    }

    /// Set the flags applied to every call issued through this proxy.
    pub fn set_call_flags(&mut self, flags: impl Into<CallFlags>) {
        self.call_flags = flags.into();
    }

    pub fn call_flags(&self) -> CallFlags {
        self.call_flags
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    pub fn bus_name(&self) -> &str {
        &self.endpoint.bus_name
    }

    pub fn interface(&self) -> &str {
        &self.endpoint.interface
    }

    pub fn object_path(&self) -> &str {
        &self.endpoint.object_path
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Whether the main-interface handle is bound.
    pub fn is_proxy_initialized(&self) -> bool {
        self.main.is_some()
    }

    /// Whether the property-interface handle is bound.
    pub fn is_property_proxy_initialized(&self) -> bool {
        self.properties.is_some()
    }

    /// Bind a handle for `interface` at `object_path` on this proxy's bus name.
    ///
    /// Connects first unless the transport already is.
    pub(crate) fn bind(&self, interface: &str, object_path: &str) -> Result<T::Handle> {
        if !self.transport.is_connected() {
            self.transport
                .connect()
                .map_err(|e| ProxyError::Setup {
                    message: e.to_string(),
                })?;
        }

        let bus_name = &self.endpoint.bus_name;
        match self.transport.bind_handle(bus_name, interface, object_path) {
            Ok(Some(handle)) => {
                debug!("Bound {} at {} on {}", interface, object_path, bus_name);
                Ok(handle)
            }
            Ok(None) => Err(ProxyError::Setup {
                message: format!("No proxy returned for {interface} at {object_path}"),
            }),
            Err(e) => Err(ProxyError::Setup {
                message: e.to_string(),
            }),
        }
    }

    /// Give a bound handle back, unless the connection is borrowed.
    pub(crate) fn release(&self, handle: T::Handle) {
        match self.ownership {
            Ownership::Owned => self.transport.release_handle(handle),
            Ownership::Borrowed => drop(handle),
        }
    }

    fn release_bound(&mut self) {
        for handle in [self.main.take(), self.properties.take()].into_iter().flatten() {
            self.release(handle);
        }
        if self.ownership == Ownership::Owned {
            debug!("Released proxies for {}", self.endpoint);
        }
    }

    pub(crate) fn main_handle(&self) -> Result<&T::Handle> {
        self.main
            .as_ref()
            .ok_or_else(|| ProxyError::precondition("Proxy has not been initialized"))
    }

    pub(crate) fn property_handle(&self) -> Result<&T::Handle> {
        self.properties
            .as_ref()
            .ok_or_else(|| ProxyError::precondition("Property proxy has not been initialized"))
    }

    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    pub(crate) fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }
}

impl<T: Transport> Drop for ProxyHandle<T> {
    fn drop(&mut self) {
        self.release_bound();
    }
}

impl<T: Transport> std::fmt::Debug for ProxyHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyHandle")
            .field("endpoint", &self.endpoint)
            .field("ownership", &self.ownership)
            .field("proxy_initialized", &self.main.is_some())
            .field("property_proxy_initialized", &self.properties.is_some())
            .field("call_flags", &self.call_flags)
            .finish_non_exhaustive()
    }
}
