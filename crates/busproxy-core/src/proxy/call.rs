//! Method invocation on the main interface.

use super::ProxyHandle;
use crate::classify::{classify, Operation};
use crate::error::{ProxyError, Result};
use crate::transport::Transport;
use crate::value::Value;
use tracing::debug;

/// How a method call is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallMode {
    /// Block until the reply or an error arrives.
    #[default]
    Blocking,
    /// Send and return at once. The outcome is never reported.
    FireAndForget,
}

impl<T: Transport> ProxyHandle<T> {
    /// Call `method` on the main interface and wait for its reply.
    ///
    /// The reply is the full return structure, `Value::Tuple(vec![])` for
    /// methods returning nothing.
    pub fn call(&self, method: &str, args: &[Value]) -> Result<Value> {
        let reply = self.dispatch(method, args, CallMode::Blocking)?;
        reply.ok_or(ProxyError::Unspecified)
    }

    /// Send `method` without waiting for it to complete.
    ///
    /// Only argument validation and an unbound proxy are reported; whatever
    /// happens on the bus is discarded.
    pub fn call_no_reply(&self, method: &str, args: &[Value]) -> Result<()> {
        self.dispatch(method, args, CallMode::FireAndForget)
            .map(drop)
    }

    /// Dispatch `method` in the given mode.
    ///
    /// Returns `None` for fire-and-forget calls.
    pub fn dispatch(&self, method: &str, args: &[Value], mode: CallMode) -> Result<Option<Value>> {
        if method.is_empty() {
            return Err(ProxyError::Validation { field: "Method" });
        }
        let handle = self.main_handle()?;

        match mode {
            CallMode::Blocking => self
                .invoke(handle, Operation::Call { method }, method, args)
                .map(Some),
            CallMode::FireAndForget => {
                let sent = self
                    .transport()
                    .call_no_reply(handle, method, args, self.call_flags());
                if let Err(e) = sent {
                    debug!("Discarding failure of {}: {}", method, e);
                }
                Ok(None)
            }
        }
    }

    /// Blocking call on any bound handle, classified for `op`.
    pub(crate) fn invoke(
        &self,
        handle: &T::Handle,
        op: Operation<'_>,
        method: &str,
        args: &[Value],
    ) -> Result<Value> {
        debug!("Calling {} on {}", method, self.object_path());
        let outcome = self
            .transport()
            .sync_call(handle, method, args, self.call_flags());
        classify(op, outcome).map_err(ProxyError::from)
    }
}
