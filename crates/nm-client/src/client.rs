//! Async client driving the object cache
//!
//! [`NmClient`] owns the [`ObjectCache`] and one signal subscription on a
//! [`Transport`]. Each processing cycle drains whatever signals are queued,
//! applies them as one batch, settles, and flushes notifications.
//!
//! ```text
//!   Transport ──signals──▶ process_next ──BusEvent──▶ ObjectCache
//!       ▲                        │                        │
//!       │                  owner tracking           settle + flush
//!       └──── call / set_property ◀── application ◀───────┘
//! ```

use std::sync::Arc;

use nm_ipc::{
    call_with_cancel, get_name_owner, managed_objects_to_events, BusEvent, CancellationToken, IpcError, MatchRule,
    MethodCall, Signal, SignalStream, Transport, DBUS_SERVICE, INTERFACE_OBJECT_MANAGER, INTERFACE_PROPERTIES,
};
use nm_variant::{FromValue, ObjectPath, Value};
use tracing::{debug, info, trace, warn};

use crate::cache::{FacadeView, ObjectCache, ObjectHandle};
use crate::catalog::Catalog;
use crate::config::ClientConfig;
use crate::notify::{Emitter, Notification, SubscriptionFilter, SubscriptionId};
use crate::types::{ClientError, Result};

/// Client for the managed service
pub struct NmClient<T: Transport> {
    transport: Arc<T>,
    config: ClientConfig,
    cache: ObjectCache,
    /// Unique bus name of the current service owner
    owner: Option<String>,
    signals: Option<SignalStream>,
}

impl<T: Transport> NmClient<T> {
    pub fn new(transport: Arc<T>, catalog: Arc<Catalog>, config: ClientConfig) -> Self {
        let cache = ObjectCache::new(catalog, &config);
        Self {
            transport,
            config,
            cache,
            owner: None,
            signals: None,
        }
    }

    /// Client over the builtin catalog with configuration from the environment
    pub fn with_builtin(transport: Arc<T>) -> Result<Self> {
        Ok(Self::new(transport, Catalog::builtin()?, ClientConfig::from_env()))
    }

    /// Subscribe to signals, find the service owner, and load the object
    /// tree if the service is running
    ///
    /// A service that is not running is not an error; the cache stays empty
    /// until the service appears.
    pub async fn init(&mut self) -> Result<usize> {
        if self.signals.is_none() {
            // One subscription for everything keeps signals in bus order
            self.signals = Some(self.transport.subscribe(MatchRule::all()));
        }
        self.owner = get_name_owner(self.transport.as_ref(), &self.config.bus_name, self.config.call_timeout).await?;
        match &self.owner {
            Some(owner) => {
                info!("{} is owned by {}", self.config.bus_name, owner);
                let events = self.fetch_managed_objects().await?;
                Ok(self.cache.apply_batch(events))
            }
            None => {
                info!("{} is not running", self.config.bus_name);
                Ok(0)
            }
        }
    }

    /// Wait for at least one signal, then process everything queued
    ///
    /// Returns the number of notifications delivered.
    pub async fn process_next(&mut self) -> Result<usize> {
        let stream = self.signals.as_mut().ok_or(ClientError::Ipc(IpcError::Disconnected))?;
        let first = stream.recv().await.ok_or(ClientError::Ipc(IpcError::Disconnected))?;
        let mut batch = vec![first];
        while let Ok(signal) = stream.try_recv() {
            batch.push(signal);
        }
        self.process_signals(batch).await
    }

    /// Process whatever signals are already queued without waiting
    pub async fn process_pending(&mut self) -> Result<usize> {
        let mut batch = Vec::new();
        if let Some(stream) = self.signals.as_mut() {
            while let Ok(signal) = stream.try_recv() {
                batch.push(signal);
            }
        }
        if batch.is_empty() {
            return Ok(0);
        }
        self.process_signals(batch).await
    }

    async fn process_signals(&mut self, batch: Vec<Signal>) -> Result<usize> {
        trace!("processing {} signals", batch.len());
        let mut reload = false;
        for signal in batch {
            let from_bus = signal.sender == DBUS_SERVICE;
            if !from_bus && !self.accepts(&signal) {
                continue;
            }
            let event = match BusEvent::from_signal(signal) {
                Ok(event) => event,
                Err(e) => {
                    debug!("dropping malformed signal: {}", e);
                    continue;
                }
            };
            match event {
                BusEvent::NameOwnerChanged { name, new_owner, .. } if from_bus => {
                    if name == self.config.bus_name {
                        reload |= self.owner_changed(new_owner);
                    }
                }
                _ if from_bus => {}
                event => self.cache.apply_event(event),
            }
        }

        if reload && self.owner.is_some() {
            match self.fetch_managed_objects().await {
                Ok(events) => {
                    for event in events {
                        self.cache.apply_event(event);
                    }
                }
                Err(ClientError::NotRunning) => {
                    debug!("{} vanished during reload", self.config.bus_name);
                    self.owner_changed(None);
                }
                Err(e) => warn!("reloading objects of {} failed: {}", self.config.bus_name, e),
            }
        }

        self.cache.settle();
        Ok(self.cache.flush())
    }

    /// Returns true when the service gained a new owner
    fn owner_changed(&mut self, new_owner: Option<String>) -> bool {
        if new_owner == self.owner {
            return false;
        }
        if let Some(old) = self.owner.take() {
            info!("{} lost owner {}", self.config.bus_name, old);
            self.cache.withdraw_all();
            // Removals settle before anything from the next owner arrives
            self.cache.settle();
        }
        match new_owner {
            Some(owner) => {
                info!("{} is now owned by {}", self.config.bus_name, owner);
                self.owner = Some(owner);
                true
            }
            None => false,
        }
    }

    /// Signal comes from the current owner and belongs to its object tree
    fn accepts(&self, signal: &Signal) -> bool {
        if self.owner.as_deref() != Some(signal.sender.as_str()) {
            trace!("ignoring signal from {}", signal.sender);
            return false;
        }
        let root = self.config.root_path.as_str();
        let path = signal.path.as_str();
        root == "/" || path == root || (path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/'))
    }

    async fn fetch_managed_objects(&self) -> Result<Vec<BusEvent>> {
        let reply = self
            .call_raw(&self.config.root_path, INTERFACE_OBJECT_MANAGER, "GetManagedObjects", Vec::new(), None)
            .await?;
        let events = managed_objects_to_events(&reply)?;
        debug!("loaded {} objects from {}", events.len(), self.config.bus_name);
        Ok(events)
    }

    // ------------------------------------------------------------------
    // Remote calls
    // ------------------------------------------------------------------

    /// Call a method and return the raw reply arguments
    pub async fn call_raw(
        &self,
        path: &str,
        interface: &str,
        method: &str,
        args: Vec<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<Value>> {
        let owner = self.owner.as_ref().ok_or(ClientError::NotRunning)?;
        let call = MethodCall::new(owner.as_str(), ObjectPath::new(path)?, interface, method, args);
        trace!("call {}.{} on {}", interface, method, path);
        let reply = call_with_cancel(self.transport.as_ref(), call, self.config.call_timeout, cancel)
            .await
            .map_err(IpcError::strip_remote)?;
        Ok(reply)
    }

    /// Call a method returning a single value
    pub async fn call<R: FromValue>(
        &self,
        path: &str,
        interface: &str,
        method: &str,
        args: Vec<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<R> {
        let reply = self.call_raw(path, interface, method, args, cancel).await?;
        let value = reply
            .first()
            .ok_or_else(|| ClientError::Ipc(IpcError::InvalidArgs(format!("{}: empty reply", method))))?;
        Ok(R::from_value(value.unwrap_variant())?)
    }

    /// Call a method whose reply carries nothing
    pub async fn call_void(
        &self,
        path: &str,
        interface: &str,
        method: &str,
        args: Vec<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        self.call_raw(path, interface, method, args, cancel).await?;
        Ok(())
    }

    /// Write a property on the remote object
    ///
    /// The cache is not touched; the change arrives back as a
    /// properties-changed signal.
    pub async fn set_property(
        &self,
        path: &str,
        interface: &str,
        property: &str,
        value: Value,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let args = vec![Value::from(interface), Value::from(property), Value::Variant(Box::new(value))];
        self.call_void(path, INTERFACE_PROPERTIES, "Set", args, cancel).await
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.owner.is_some()
    }

    pub fn cache(&self) -> &ObjectCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ObjectCache {
        &mut self.cache
    }

    pub fn get_object(&self, path: &str) -> Option<ObjectHandle> {
        self.cache.get_object(path)
    }

    /// View of a cached object, failing with `NotCached` for unknown paths
    pub fn object(&self, path: &str) -> Result<FacadeView<'_>> {
        self.cache.view(path).ok_or_else(|| ClientError::NotCached(path.to_string()))
    }

    pub fn is_visible(&self, path: &str) -> bool {
        self.cache.is_visible(path)
    }

    pub fn subscribe<F>(&mut self, filter: SubscriptionFilter, observer: F) -> SubscriptionId
    where
        F: FnMut(&Notification, &mut Emitter<'_>) + Send + 'static,
    {
        self.cache.subscribe(filter, observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.cache.unsubscribe(id)
    }
}
