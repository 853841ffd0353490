//! Object table: event application and reference counting

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use nm_ipc::{BusEvent, Signal};
use nm_variant::{PropMap, Value};
use tracing::{debug, trace, warn};

use super::handle::{ObjectHandle, ReleaseQueue};
use super::object::{CachedObject, InterfaceData, PropSlot};
use super::view::FacadeView;
use crate::catalog::{Catalog, CollectionChange, CollectionEvent, CollectionSpec, IfaceDescriptor, PropertyKind};
use crate::config::{ClientConfig, ProtocolLogLevel};
use crate::marshal::{self, MismatchTracker};
use crate::notify::{Emitter, Notification, NotifyQueue, Priority, SubscriptionFilter, SubscriptionId, Subscribers};
use crate::types::{MarshalError, ObjState, PathPool, RefPath, Result};

/// The table of every known remote object
///
/// All mutation happens through `&mut self` on one logical thread. Incoming
/// events are applied immediately; lifecycle transitions and reference
/// resolution wait for [`settle`](ObjectCache::settle), and observers only
/// hear about the result at [`flush`](ObjectCache::flush).
///
/// Reference holders of an object are the path index (while the peer
/// exports it), every slot watching it, and every [`ObjectHandle`].
pub struct ObjectCache {
    pub(super) catalog: Arc<Catalog>,
    pub(super) log_level: ProtocolLogLevel,
    pub(super) max_settle_rounds: usize,
    pub(super) pool: PathPool,
    pub(super) objects: HashMap<RefPath, CachedObject>,
    /// Objects to revisit at the next settle
    pub(super) dirty: BTreeSet<RefPath>,
    pub(super) releases: ReleaseQueue,
    pub(super) queue: NotifyQueue,
    subscribers: Subscribers,
    mismatches: MismatchTracker,
    pub(super) next_facade_id: u64,
}

impl ObjectCache {
    pub fn new(catalog: Arc<Catalog>, config: &ClientConfig) -> Self {
        Self {
            catalog,
            log_level: config.log_level,
            max_settle_rounds: config.max_settle_rounds.max(1),
            pool: PathPool::new(),
            objects: HashMap::new(),
            dirty: BTreeSet::new(),
            releases: ReleaseQueue::default(),
            queue: NotifyQueue::new(),
            subscribers: Subscribers::new(),
            mismatches: MismatchTracker::new(config.mismatch_warn_threshold),
            next_facade_id: 0,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    // ------------------------------------------------------------------
    // Event application
    // ------------------------------------------------------------------

    /// Apply one bus event without settling
    pub fn apply_event(&mut self, event: BusEvent) {
        match event {
            BusEvent::InterfacesAdded { path, interfaces } => self.add_interfaces(path.as_str(), interfaces),
            BusEvent::InterfacesRemoved { path, interfaces } => {
                let names: Vec<&str> = interfaces.iter().map(String::as_str).collect();
                self.remove_interfaces(path.as_str(), &names);
            }
            BusEvent::PropertiesChanged {
                path,
                interface,
                changed,
                invalidated,
            } => {
                if !invalidated.is_empty() && self.log_level.enables(ProtocolLogLevel::Debug) {
                    debug!("{}: ignoring invalidated {}.{:?}", path, interface, invalidated);
                }
                self.update_properties(path.as_str(), &interface, &changed);
            }
            BusEvent::ObjectRemoved { path } => self.remove_object(path.as_str()),
            BusEvent::NameOwnerChanged { name, .. } => {
                trace!("owner change of {} is handled by the client", name);
            }
            BusEvent::Signal(signal) => self.handle_signal(&signal),
        }
    }

    /// Apply a whole batch, settle, and flush; returns the number of
    /// notifications delivered
    pub fn apply_batch<I>(&mut self, events: I) -> usize
    where
        I: IntoIterator<Item = BusEvent>,
    {
        for event in events {
            self.apply_event(event);
        }
        self.settle();
        self.flush()
    }

    /// Interfaces appeared on an object, with their initial properties
    pub fn add_interfaces(&mut self, path: &str, interfaces: Vec<(String, PropMap)>) {
        let mut known = Vec::with_capacity(interfaces.len());
        for (name, props) in interfaces {
            match self.catalog.get(&name) {
                Some(desc) => known.push((desc, props)),
                None => self.log_unknown_interface(path, &name),
            }
        }
        if known.is_empty() {
            return;
        }

        let path = self.link(path);
        for (desc, props) in known {
            self.attach(&path, desc);
            self.apply_props(&path, desc, &props);
        }
        self.dirty.insert(path);
    }

    /// Interfaces retracted by the peer; their data stays readable by
    /// nobody and is dropped at the next settle
    pub fn remove_interfaces(&mut self, path: &str, interfaces: &[&str]) {
        let Some(obj) = self.objects.get_mut(path) else {
            trace!("{}: removal for unknown object", path);
            return;
        };
        let mut any = false;
        for data in obj.interfaces.iter_mut().filter(|d| !d.removed) {
            if interfaces.contains(&data.desc.name) {
                data.removed = true;
                any = true;
            }
        }
        if any {
            let path = obj.path().clone();
            self.dirty.insert(path);
        }
    }

    /// The peer dropped the object with all of its interfaces
    pub fn remove_object(&mut self, path: &str) {
        let Some(obj) = self.objects.get_mut(path) else {
            trace!("{}: removal for unknown object", path);
            return;
        };
        for data in obj.interfaces.iter_mut() {
            data.removed = true;
        }
        let path = obj.path().clone();
        self.dirty.insert(path);
    }

    /// Withdraw every object, as when the peer leaves the bus
    pub fn withdraw_all(&mut self) {
        for obj in self.objects.values_mut() {
            if obj.interfaces.is_empty() {
                continue;
            }
            for data in obj.interfaces.iter_mut() {
                data.removed = true;
            }
            self.dirty.insert(obj.path().clone());
        }
    }

    /// Apply changed properties of one interface; returns how many stored
    /// values changed. An unknown path is created and linked.
    pub fn update_properties(&mut self, path: &str, interface: &str, changed: &PropMap) -> usize {
        let Some(desc) = self.catalog.get(interface) else {
            self.log_unknown_interface(path, interface);
            return 0;
        };
        let path = self.link(path);
        self.attach(&path, desc);
        let count = self.apply_props(&path, desc, changed);
        self.dirty.insert(path);
        count
    }

    /// Apply a single property and report marshaling failures to the caller
    pub fn apply_property(&mut self, path: &str, interface: &str, property: &str, value: &Value) -> Result<bool> {
        let Some(desc) = self.catalog.get(interface) else {
            self.log_unknown_interface(path, interface);
            return Ok(false);
        };
        let path = self.link(path);
        self.attach(&path, desc);
        self.dirty.insert(path.clone());
        Ok(self.set_property(&path, desc, property, value)?)
    }

    /// Interface data of an object, creating both when missing.
    /// Returns `None` for interfaces the catalog does not know.
    pub fn get_or_create_interface_data(&mut self, path: &str, interface: &str) -> Option<&InterfaceData> {
        let desc = self.catalog.get(interface)?;
        let path = self.link(path);
        let idx = self.attach(&path, desc);
        self.dirty.insert(path.clone());
        self.objects.get(&path).map(|obj| &obj.interfaces[idx])
    }

    /// Route an interface signal to its handler
    pub fn handle_signal(&mut self, signal: &Signal) {
        let Some(desc) = self.catalog.get(&signal.interface) else {
            self.log_unknown_interface(signal.path.as_str(), &signal.interface);
            return;
        };
        let Some(handler) = desc.signal(&signal.member) else {
            if self.log_level.enables(ProtocolLogLevel::Debug) {
                debug!("{}: ignoring unknown signal {}.{}", signal.path, desc.name, signal.member);
            }
            return;
        };

        let found: String = signal.args.iter().map(|a| a.signature().as_str().to_string()).collect();
        if found != handler.signature {
            if self.log_level.enables(ProtocolLogLevel::Debug) {
                debug!(
                    "{}: ignoring {}.{} with arguments ({}), expected ({})",
                    signal.path, desc.name, handler.name, found, handler.signature
                );
            }
            return;
        }

        let Some(path) = self.pool.get(signal.path.as_str()) else {
            return;
        };
        if !self.objects.get(&path).is_some_and(|obj| obj.interface(desc.name).is_some()) {
            trace!("{}: {}.{} for object without that interface", path, desc.name, handler.name);
            return;
        }
        let Some(updates) = (handler.handler)(&signal.args) else {
            return;
        };
        for (property, value) in updates {
            if let Err(err) = self.set_property(&path, desc, property, &value) {
                self.log_marshal_error(&path, &err);
            }
        }
        self.dirty.insert(path);
    }

    fn apply_props(&mut self, path: &RefPath, desc: &'static IfaceDescriptor, props: &PropMap) -> usize {
        let mut changed = 0;
        for (name, value) in props {
            match self.set_property(path, desc, name, value) {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(err) => self.log_marshal_error(path, &err),
            }
        }
        changed
    }

    /// Store one property of a live interface; returns whether it changed
    fn set_property(
        &mut self,
        path: &RefPath,
        desc: &'static IfaceDescriptor,
        name: &str,
        value: &Value,
    ) -> std::result::Result<bool, MarshalError> {
        let Some((idx, prop)) = desc.property(name) else {
            if self.log_level.enables(ProtocolLogLevel::Debug) {
                debug!("{}: ignoring unknown property {}.{}", path, desc.name, name);
            }
            return Ok(false);
        };
        let value = value.unwrap_variant();

        let changed = match prop.kind {
            PropertyKind::Ignored => false,
            PropertyKind::Scalar(coerce) => match self.slot_mut(path, desc.name, idx) {
                Some(PropSlot::Scalar(stored)) => marshal::marshal_scalar(desc.name, prop, coerce, value, stored)?,
                _ => false,
            },
            PropertyKind::Custom(convert) => match self.slot_mut(path, desc.name, idx) {
                Some(PropSlot::Scalar(stored)) => marshal::marshal_custom(desc.name, prop, convert, value, stored)?,
                _ => false,
            },
            PropertyKind::Object(_) => {
                let target = marshal::decode_path(desc.name, prop, value)?.map(|p| self.pool.intern(p.as_str()));
                let previous = match self.slot_mut(path, desc.name, idx) {
                    Some(PropSlot::Object(slot)) => slot.set_target(target.clone()),
                    _ => None,
                };
                match previous {
                    Some(previous) => {
                        if let Some(old) = previous {
                            self.unwatch(path, &old);
                        }
                        if let Some(new) = target {
                            self.watch(path, new);
                        }
                        true
                    }
                    None => false,
                }
            }
            PropertyKind::Collection(spec) => {
                let targets: Vec<RefPath> = marshal::decode_paths(desc.name, prop, value)?
                    .iter()
                    .map(|p| self.pool.intern(p.as_str()))
                    .collect();
                let diff = match self.slot_mut(path, desc.name, idx) {
                    Some(PropSlot::Collection(slot)) => slot.set_targets(targets),
                    _ => return Ok(false),
                };
                if diff.is_empty() {
                    false
                } else {
                    let visible = self.state(path.as_str()) == Some(ObjState::FacadeVisible);
                    for target in diff.added {
                        self.watch(path, target);
                    }
                    for (target, resolved) in diff.removed {
                        if resolved && visible {
                            self.notify_collection(spec, path, desc.name, prop.name, CollectionEvent::Removed(&target));
                        }
                        self.unwatch(path, &target);
                    }
                    true
                }
            }
        };

        if changed {
            trace!("{}: {}.{} changed", path, desc.name, prop.name);
            if self.state(path.as_str()) == Some(ObjState::FacadeVisible) {
                self.queue.property_changed(path, desc.name, prop.name);
            }
        }
        Ok(changed)
    }

    fn slot_mut(&mut self, path: &RefPath, interface: &str, idx: usize) -> Option<&mut PropSlot> {
        self.objects
            .get_mut(path)?
            .interfaces
            .iter_mut()
            .find(|d| !d.removed && d.desc.name == interface)?
            .slots
            .get_mut(idx)
    }

    fn attach(&mut self, path: &RefPath, desc: &'static IfaceDescriptor) -> usize {
        let position = self.catalog.position(desc.name).unwrap_or(usize::MAX);
        let Some(obj) = self.objects.get_mut(path) else {
            return 0;
        };
        // Re-added after a retraction in the same cycle: start from a clean block
        let visible = obj.state == ObjState::FacadeVisible;
        if let Some(old) = obj.take_retracted(desc.name) {
            trace!("{}: interface {} re-added, discarding old values", path, desc.name);
            self.clear_interface(path, old, visible);
        }
        match self.objects.get_mut(path) {
            Some(obj) => obj.attach(desc, position),
            None => 0,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle and reference counting
    // ------------------------------------------------------------------

    fn ensure_object(&mut self, path: &str) -> RefPath {
        let path = self.pool.intern(path);
        if !self.objects.contains_key(&path) {
            trace!("{}: created", path);
            self.objects.insert(path.clone(), CachedObject::new(path.clone()));
        }
        path
    }

    /// Confirm the object on the bus, taking the index link reference
    pub(super) fn link(&mut self, path: &str) -> RefPath {
        let path = self.ensure_object(path);
        if let Some(obj) = self.objects.get_mut(&path) {
            if !obj.indexed {
                obj.indexed = true;
                obj.ever_linked = true;
                obj.cell.retain();
                if !obj.state.is_on_dbus() {
                    self.set_state(&path, ObjState::OnDbus);
                }
            }
        }
        path
    }

    /// Drop the index link; the object stays while anything else holds it
    pub(super) fn unlink(&mut self, path: &RefPath) {
        let Some(obj) = self.objects.get_mut(path) else {
            return;
        };
        if !obj.indexed {
            return;
        }
        obj.indexed = false;
        let next = if obj.watchers.is_empty() {
            ObjState::Unlinked
        } else {
            ObjState::WatchedOnly
        };
        self.set_state(path, next);
        self.release(path);
    }

    /// Register `owner` as watching `target`
    pub(super) fn watch(&mut self, owner: &RefPath, target: RefPath) {
        let target = self.ensure_object(target.as_str());
        let Some(obj) = self.objects.get_mut(&target) else {
            return;
        };
        obj.cell.retain();
        *obj.watchers.entry(owner.clone()).or_insert(0) += 1;
        if obj.state == ObjState::Unlinked {
            self.set_state(&target, ObjState::WatchedOnly);
        }
    }

    pub(super) fn unwatch(&mut self, owner: &RefPath, target: &RefPath) {
        let Some(obj) = self.objects.get_mut(target) else {
            return;
        };
        if let Some(count) = obj.watchers.get_mut(owner) {
            *count -= 1;
            if *count == 0 {
                obj.watchers.remove(owner);
            }
        }
        if obj.watchers.is_empty() && obj.state == ObjState::WatchedOnly {
            self.set_state(target, ObjState::Unlinked);
        }
        self.release(target);
    }

    fn release(&mut self, path: &RefPath) {
        let last = match self.objects.get(path) {
            Some(obj) => obj.cell.release(),
            None => return,
        };
        if last {
            self.try_evict(path);
        }
    }

    /// Evict the object if nothing holds it any more
    pub(super) fn try_evict(&mut self, path: &RefPath) {
        let evictable = self
            .objects
            .get(path)
            .is_some_and(|obj| obj.cell.ref_count() == 0 && !obj.indexed && obj.watchers.is_empty());
        if !evictable {
            return;
        }
        let Some(mut obj) = self.objects.remove(path) else {
            return;
        };
        trace!("{}: evicted", path);
        self.dirty.remove(path);
        for data in obj.interfaces.drain(..) {
            self.clear_interface(path, data, false);
        }
    }

    pub(super) fn set_state(&mut self, path: &RefPath, state: ObjState) {
        let Some(obj) = self.objects.get_mut(path) else {
            return;
        };
        if obj.state == state {
            return;
        }
        trace!("{}: {} -> {}", path, obj.state, state);
        obj.state = state;
        let owners: Vec<RefPath> = obj.watchers.keys().cloned().collect();
        self.dirty.extend(owners);
    }

    /// Release everything a dropped interface block holds. With `notify`,
    /// values that disappear are announced as changes of a visible owner.
    pub(super) fn clear_interface(&mut self, owner: &RefPath, mut data: InterfaceData, notify: bool) {
        let desc = data.desc;
        for (prop, slot) in desc.properties.iter().zip(data.slots.iter_mut()) {
            let had_value = match slot {
                PropSlot::Scalar(value) => value.take().is_some(),
                PropSlot::Ignored => false,
                PropSlot::Object(slot) => {
                    let resolved = slot.resolved_target().is_some();
                    if let Some(target) = slot.clear() {
                        self.unwatch(owner, &target);
                    }
                    resolved
                }
                PropSlot::Collection(slot) => {
                    let mut any = false;
                    for (target, resolved) in slot.clear() {
                        if resolved && notify {
                            if let PropertyKind::Collection(spec) = prop.kind {
                                self.notify_collection(spec, owner, desc.name, prop.name, CollectionEvent::Removed(&target));
                            }
                        }
                        any |= resolved;
                        self.unwatch(owner, &target);
                    }
                    any
                }
            };
            if had_value && notify {
                self.queue.property_changed(owner, desc.name, prop.name);
            }
        }
    }

    /// Run a collection's observer and queue what it returns
    pub(super) fn notify_collection(
        &mut self,
        spec: &CollectionSpec,
        owner: &RefPath,
        interface: &'static str,
        property: &'static str,
        event: CollectionEvent<'_>,
    ) {
        let Some(observer) = spec.observer else {
            return;
        };
        let change = CollectionChange {
            owner,
            interface,
            property,
            event,
        };
        if let Some(notification) = observer(&change) {
            let priority = notification.priority();
            self.queue.enqueue(priority, notification);
        }
    }

    /// Evict objects whose last handle was dropped elsewhere
    pub fn collect(&mut self) -> usize {
        let before = self.objects.len();
        for path in self.releases.drain() {
            self.try_evict(&path);
        }
        self.pool.prune();
        before - self.objects.len()
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    fn log_unknown_interface(&self, path: &str, interface: &str) {
        if self.log_level.enables(ProtocolLogLevel::Debug) {
            debug!("{}: ignoring unknown interface {}", path, interface);
        }
    }

    fn log_marshal_error(&mut self, path: &RefPath, err: &MarshalError) {
        let (interface, property) = err.key();
        if self.mismatches.record(interface, property) {
            if self.log_level.enables(ProtocolLogLevel::Warn) {
                warn!(
                    "{}: {} (seen {} times, the interface catalog may be out of date)",
                    path,
                    err,
                    self.mismatches.count(interface, property)
                );
            }
        } else if self.log_level.enables(ProtocolLogLevel::Debug) {
            debug!("{}: ignoring update: {}", path, err);
        }
    }

    /// Mismatches seen so far for a property
    pub fn mismatch_count(&self, interface: &str, property: &str) -> u32 {
        self.mismatches.count(interface, property)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Handle keeping the object alive, if it is cached
    pub fn get_object(&self, path: &str) -> Option<ObjectHandle> {
        self.objects
            .get(path)
            .map(|obj| ObjectHandle::acquire(&obj.cell, &self.releases))
    }

    pub fn state(&self, path: &str) -> Option<ObjState> {
        self.objects.get(path).map(|obj| obj.state)
    }

    /// References resolved and visibility at least considered
    pub fn is_ready(&self, path: &str) -> bool {
        matches!(
            self.state(path),
            Some(ObjState::FacadeMaybeReady | ObjState::FacadeVisible | ObjState::FacadeHidden)
        )
    }

    pub fn is_visible(&self, path: &str) -> bool {
        self.state(path) == Some(ObjState::FacadeVisible)
    }

    pub fn view(&self, path: &str) -> Option<FacadeView<'_>> {
        self.objects.get(path).map(|obj| FacadeView::new(self, obj))
    }

    /// Live interface data of an object
    pub fn interface_data(&self, path: &str, interface: &str) -> Option<&InterfaceData> {
        self.objects.get(path)?.interface(interface)
    }

    pub fn ref_count(&self, path: &str) -> Option<u32> {
        self.objects.get(path).map(|obj| obj.cell.ref_count())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    /// Visible objects, sorted by path
    pub fn visible_objects(&self) -> Vec<RefPath> {
        let mut paths: Vec<RefPath> = self
            .objects
            .values()
            .filter(|obj| obj.state == ObjState::FacadeVisible)
            .map(|obj| obj.path().clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub fn subscribe<F>(&mut self, filter: SubscriptionFilter, observer: F) -> SubscriptionId
    where
        F: FnMut(&Notification, &mut Emitter<'_>) + Send + 'static,
    {
        self.subscribers.add(filter, Box::new(observer))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    /// Queue work for the next flush
    pub fn enqueue_call<F>(&mut self, priority: Priority, action: F)
    where
        F: FnOnce(&mut Emitter<'_>) + Send + 'static,
    {
        self.queue.enqueue_call(priority, action);
    }

    pub fn pending_notifications(&self) -> usize {
        self.queue.len()
    }

    /// Deliver everything queued this cycle; returns the number of
    /// notifications delivered
    pub fn flush(&mut self) -> usize {
        self.queue.flush(&mut self.subscribers)
    }
}
