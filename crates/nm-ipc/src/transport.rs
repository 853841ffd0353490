//! Transport abstraction
//!
//! The cache never talks to a socket directly. It issues [`MethodCall`]s and
//! consumes [`Signal`]s through a [`Transport`], so the same client runs on a
//! real bus connection or on the in-memory [`LoopbackBus`](crate::LoopbackBus).

use std::time::Duration;

use async_trait::async_trait;
use nm_variant::{ObjectPath, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{IpcError, Result};
use crate::message::{MatchRule, MethodCall, Signal, DBUS_INTERFACE, DBUS_PATH, DBUS_SERVICE};

/// Stream of signals matching one subscription
pub type SignalStream = mpsc::UnboundedReceiver<Signal>;

/// A bus connection
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Issue a method call and wait for its reply
    async fn call(&self, call: MethodCall, timeout: Duration) -> Result<Vec<Value>>;

    /// Subscribe to signals matching `rule`; dropping the stream unsubscribes
    fn subscribe(&self, rule: MatchRule) -> SignalStream;
}

/// Issue a call that can be abandoned through `cancel`
///
/// A cancelled call reports [`IpcError::Cancelled`] even if the reply was
/// already on its way.
pub async fn call_with_cancel<T: Transport + ?Sized>(
    transport: &T,
    call: MethodCall,
    timeout: Duration,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<Value>> {
    let Some(cancel) = cancel else {
        return transport.call(call, timeout).await;
    };
    if cancel.is_cancelled() {
        return Err(IpcError::Cancelled);
    }

    let member = call.member.clone();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("call {} cancelled", member);
            Err(IpcError::Cancelled)
        }
        reply = transport.call(call, timeout) => {
            if cancel.is_cancelled() {
                Err(IpcError::Cancelled)
            } else {
                reply
            }
        }
    }
}

/// Ask the bus daemon who owns `name`; `None` if nobody does
pub async fn get_name_owner<T: Transport + ?Sized>(
    transport: &T,
    name: &str,
    timeout: Duration,
) -> Result<Option<String>> {
    let path = ObjectPath::new(DBUS_PATH)?;
    let call = MethodCall::new(DBUS_SERVICE, path, DBUS_INTERFACE, "GetNameOwner", vec![Value::from(name)]);
    match transport.call(call, timeout).await {
        Ok(reply) => Ok(reply
            .first()
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)),
        Err(e) if e.is_not_running() => Ok(None),
        Err(e) => Err(e),
    }
}
