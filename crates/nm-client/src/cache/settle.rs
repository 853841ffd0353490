//! Settling: facade selection, reference resolution, visibility
//!
//! Runs after a batch of events has been applied. Every dirty object goes
//! through two phases per round:
//!
//! 1. drop retracted interfaces and pick the facade type from the live
//!    ones, tearing the object down when none are left
//! 2. re-resolve its reference slots against the targets' current states,
//!    then advance its visibility
//!
//! State changes mark the owners of every slot watching the object dirty,
//! so rounds repeat until nothing changes.

use std::collections::HashMap;

use tracing::{error, trace};

use super::object::{InterfaceData, PropSlot};
use super::table::ObjectCache;
use super::view::FacadeView;
use crate::catalog::{CollectionEvent, CollectionSpec, PropertyKind};
use crate::facade::Facade;
use crate::notify::{Notification, Priority};
use crate::resolver::resolve;
use crate::types::{ObjState, RefPath};

/// Collection change found while refreshing, reported once borrows end
enum EntryChange {
    Added(RefPath),
    Removed(RefPath),
    Readiness(bool),
}

impl ObjectCache {
    /// Bring every dirty object to a stable state
    pub fn settle(&mut self) {
        for round in 0..self.max_settle_rounds {
            for path in self.releases.drain() {
                self.try_evict(&path);
            }
            if self.dirty.is_empty() {
                self.pool.prune();
                return;
            }

            let batch: Vec<RefPath> = std::mem::take(&mut self.dirty).into_iter().collect();
            trace!("settle round {}: {} objects", round, batch.len());
            for path in &batch {
                self.update_facade(path);
            }
            for path in &batch {
                self.refresh_references(path);
                self.update_visibility(path);
            }
        }
        error!(
            "object cache did not settle after {} rounds, {} objects left dirty",
            self.max_settle_rounds,
            self.dirty.len()
        );
    }

    fn update_facade(&mut self, path: &RefPath) {
        let Some(obj) = self.objects.get_mut(path) else {
            return;
        };
        let (gone, live): (Vec<InterfaceData>, Vec<InterfaceData>) =
            std::mem::take(&mut obj.interfaces).into_iter().partition(InterfaceData::is_removed);
        obj.interfaces = live;

        let remaining = !obj.interfaces.is_empty();
        let visible = obj.state == ObjState::FacadeVisible;
        let current = obj.facade;
        let chosen = obj
            .interfaces
            .iter()
            .find(|d| d.desc.priority.instantiates() && d.desc.facade.is_some())
            .and_then(|d| d.desc.facade);

        let keeps_facade = matches!((current, chosen), (Some(facade), Some(kind)) if facade.is_type(kind));

        for data in gone {
            trace!("{}: dropping interface {}", path, data.name());
            self.clear_interface(path, data, visible && keeps_facade);
        }
        if !remaining {
            self.teardown(path);
            return;
        }

        if keeps_facade {
            return;
        }
        if let Some(old) = current {
            self.retire_facade(path, old);
        }
        match chosen {
            Some(kind) => {
                self.next_facade_id += 1;
                let facade = Facade {
                    kind,
                    id: self.next_facade_id,
                };
                trace!("{}: facade {} #{}", path, kind.name, facade.id);
                if let Some(obj) = self.objects.get_mut(path) {
                    obj.facade = Some(facade);
                }
                self.set_state(path, ObjState::FacadeNotReady);
            }
            None => self.set_state(path, ObjState::OnDbus),
        }
    }

    fn retire_facade(&mut self, path: &RefPath, old: Facade) {
        let Some(obj) = self.objects.get_mut(path) else {
            return;
        };
        obj.facade = None;
        if obj.state == ObjState::FacadeVisible {
            self.queue.enqueue(
                Priority::BEFORE,
                Notification::ObjectRemoved {
                    path: path.clone(),
                    facade: old.type_name(),
                },
            );
        }
        trace!("{}: retired facade {} #{}", path, old.type_name(), old.id);
    }

    /// Nothing live is left: drop the facade and every held reference, then
    /// give up the index link
    fn teardown(&mut self, path: &RefPath) {
        let Some(obj) = self.objects.get_mut(path) else {
            return;
        };
        let interfaces = std::mem::take(&mut obj.interfaces);
        if let Some(facade) = obj.facade {
            self.retire_facade(path, facade);
        }
        for data in interfaces {
            self.clear_interface(path, data, false);
        }
        self.unlink(path);
    }

    fn refresh_references(&mut self, path: &RefPath) {
        let Some(obj) = self.objects.get(path) else {
            return;
        };

        // Target state, and whether the peer ever confirmed the target
        let mut states: HashMap<RefPath, (Option<ObjState>, bool)> = HashMap::new();
        for data in &obj.interfaces {
            for slot in &data.slots {
                let targets: Vec<&RefPath> = match slot {
                    PropSlot::Object(slot) => slot.target().into_iter().collect(),
                    PropSlot::Collection(slot) => slot.targets().collect(),
                    _ => continue,
                };
                for target in targets {
                    states
                        .entry(target.clone())
                        .or_insert_with(|| match self.objects.get(target) {
                            Some(o) => (Some(o.state), o.ever_linked),
                            None => (None, true),
                        });
                }
            }
        }
        let state_of = |target: &RefPath| states.get(target).copied().unwrap_or((None, true));

        let visible = obj.state == ObjState::FacadeVisible;
        let mut changed: Vec<(&'static str, &'static str)> = Vec::new();
        let mut entries: Vec<(&'static CollectionSpec, &'static str, &'static str, EntryChange)> = Vec::new();

        let Some(obj) = self.objects.get_mut(path) else {
            return;
        };
        for data in obj.interfaces.iter_mut() {
            let desc = data.desc;
            for (prop, slot) in desc.properties.iter().zip(data.slots.iter_mut()) {
                match (prop.kind, slot) {
                    (PropertyKind::Object(spec), PropSlot::Object(slot)) => {
                        let (target, ever_linked) = slot.target().map_or((None, true), state_of);
                        if slot.refresh(resolve(target, ever_linked, spec.ready_without_visible)) && visible {
                            changed.push((desc.name, prop.name));
                        }
                    }
                    (PropertyKind::Collection(spec), PropSlot::Collection(slot)) => {
                        let targets: Vec<RefPath> = slot.targets().cloned().collect();
                        let mut flipped = false;
                        for target in targets {
                            let (state, ever_linked) = state_of(&target);
                            let resolution = resolve(state, ever_linked, spec.ready_without_visible);
                            if let Some(resolved) = slot.refresh(target.as_str(), resolution) {
                                flipped = true;
                                if visible {
                                    let change = if resolved {
                                        EntryChange::Added(target)
                                    } else {
                                        EntryChange::Removed(target)
                                    };
                                    entries.push((spec, desc.name, prop.name, change));
                                }
                            }
                        }
                        if flipped && visible {
                            changed.push((desc.name, prop.name));
                        }
                        if let Some(ready) = slot.take_readiness_change() {
                            trace!("{}: {}.{} ready={}", path, desc.name, prop.name, ready);
                            entries.push((spec, desc.name, prop.name, EntryChange::Readiness(ready)));
                        }
                    }
                    _ => {}
                }
            }
        }

        for (interface, property) in changed {
            self.queue.property_changed(path, interface, property);
        }
        for (spec, interface, property, change) in entries {
            let event = match &change {
                EntryChange::Added(target) => CollectionEvent::Added(target),
                EntryChange::Removed(target) => CollectionEvent::Removed(target),
                EntryChange::Readiness(ready) => CollectionEvent::ReadinessChanged(*ready),
            };
            self.notify_collection(spec, path, interface, property, event);
        }
    }

    /// Advance visibility. Readiness only gates the first decision; after
    /// that the facade's predicate alone moves the object between visible
    /// and hidden.
    fn update_visibility(&mut self, path: &RefPath) {
        let Some(obj) = self.objects.get(path) else {
            return;
        };
        let Some(facade) = obj.facade else {
            return;
        };
        let state = obj.state;
        if state == ObjState::FacadeNotReady && !obj.references_ready() {
            return;
        }

        let shown = facade.kind.is_visible(&FacadeView::new(self, obj));
        let next = if shown {
            ObjState::FacadeVisible
        } else {
            ObjState::FacadeHidden
        };
        if next == state {
            return;
        }

        if state == ObjState::FacadeNotReady {
            self.set_state(path, ObjState::FacadeMaybeReady);
        }
        self.set_state(path, next);
        match next {
            ObjState::FacadeVisible => self.queue.enqueue(
                Priority::AFTER,
                Notification::ObjectAdded {
                    path: path.clone(),
                    facade: facade.type_name(),
                },
            ),
            _ if state == ObjState::FacadeVisible => self.queue.enqueue(
                Priority::BEFORE,
                Notification::ObjectRemoved {
                    path: path.clone(),
                    facade: facade.type_name(),
                },
            ),
            _ => {}
        }
    }
}
