//! Retry procedures covering service start-up races.
//!
//! A service activated on demand may accept connections before it has
//! registered its objects. These probes wait for it with bounded retries:
//!
//! - [`ProxyHandle::get_service_version`] retries while the property
//!   interface is unknown
//! - [`ProxyHandle::ping`] retries the peer liveness check
//! - [`ProxyHandle::check_object_exists`] makes a single attempt

use super::ProxyHandle;
use crate::classify::Operation;
use crate::config::BusConfig;
use crate::error::{ProxyError, Result};
use crate::retry::retry_blocking;
use crate::transport::Transport;
use crate::value::Value;
use tracing::{debug, info};

impl<T: Transport> ProxyHandle<T> {
    /// Read the service's `version` property, waiting for the service to
    /// come up.
    ///
    /// Returns an empty string if the service does not declare a version.
    /// Fails with [`ProxyError::ServiceUnavailable`] once every attempt saw
    /// an unknown method; any other failure is returned as is.
    pub fn get_service_version(&self) -> Result<String> {
        let schedule = &self.retry_config().version_probe;
        let (result, stats) = retry_blocking(
            schedule,
            self.sleeper(),
            |_| match self.get_string(BusConfig::VERSION_PROPERTY) {
                Err(e) if e.is_missing_property(BusConfig::VERSION_PROPERTY) => {
                    debug!("{} does not declare a version", self.bus_name());
                    Ok(String::new())
                }
                other => other,
            },
            ProxyError::is_unknown_method,
        );

        match result {
            Err(_) if stats.exhausted => Err(ProxyError::ServiceUnavailable {
                bus_name: self.bus_name().to_string(),
                attempts: stats.attempts,
            }),
            other => other,
        }
    }

    /// Check that the service answers on the peer interface.
    ///
    /// Binds a transient handle for `org.freedesktop.DBus.Peer` at `/`,
    /// which is released again before returning. Access denials are not
    /// retried.
    pub fn ping(&self) -> Result<()> {
        let peer = self.bind(BusConfig::PEER_INTERFACE, BusConfig::PEER_OBJECT_PATH)?;
        let outcome = self.ping_peer(&peer);
        self.release(peer);
        outcome
    }

    fn ping_peer(&self, peer: &T::Handle) -> Result<()> {
        let op = Operation::Call {
            method: BusConfig::PEER_PING,
        };
        let (result, stats) = retry_blocking(
            &self.retry_config().ping,
            self.sleeper(),
            |_| self.invoke(peer, op, BusConfig::PEER_PING, &[]).map(drop),
            |e: &ProxyError| !e.is_access_denied(),
        );

        match result {
            Ok(()) => {
                if stats.attempts > 1 {
                    info!(
                        "{} responded after {} attempts",
                        self.bus_name(),
                        stats.attempts
                    );
                }
                let grace = self.retry_config().ping_grace;
                if !grace.is_zero() {
                    self.sleeper().sleep(grace);
                }
                Ok(())
            }
            Err(_) if stats.exhausted => Err(ProxyError::ServiceUnresponsive {
                bus_name: self.bus_name().to_string(),
                attempts: stats.attempts,
            }),
            Err(e) => Err(e),
        }
    }

    /// Whether the object behind this proxy exists.
    ///
    /// Probes with `GetAll` on the property interface. A successful reply or
    /// an access denial both mean the object is there; any other failure
    /// means it is not.
    pub fn check_object_exists(&self) -> Result<bool> {
        let handle = self.property_handle()?;
        let args = [Value::string(self.interface())];
        let outcome = self.invoke(
            handle,
            Operation::Call {
                method: BusConfig::PROPERTY_GET_ALL,
            },
            BusConfig::PROPERTY_GET_ALL,
            &args,
        );

        match outcome {
            Ok(_) => Ok(true),
            Err(e) if e.is_access_denied() => Ok(true),
            Err(e) => {
                debug!("{} not found: {}", self.endpoint(), e);
                Ok(false)
            }
        }
    }
}
