//! Object reference collection slot

use std::collections::HashMap;

use super::Resolution;
use crate::types::RefPath;

#[derive(Clone, Debug)]
struct AoEntry {
    target: RefPath,
    ready: bool,
    resolved: bool,
}

/// What a new target list did to a collection
#[derive(Debug, Default)]
pub struct AoDiff {
    /// Targets that were not in the list before
    pub added: Vec<RefPath>,
    /// Targets that left the list, with whether they were resolved
    pub removed: Vec<(RefPath, bool)>,
}

impl AoDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// State of an `ao` property
///
/// Entries keep the peer's order. `not_ready` always equals the number of
/// entries that are not ready.
#[derive(Clone, Debug)]
pub struct AoSlot {
    entries: Vec<AoEntry>,
    index: HashMap<RefPath, usize>,
    not_ready: usize,
    /// Readiness last reported to the observer
    reported_ready: bool,
}

impl Default for AoSlot {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            not_ready: 0,
            reported_ready: true,
        }
    }
}

impl AoSlot {
    /// Replace the target list. Kept entries keep their state, new ones
    /// start out pending. Repeated paths are expected to be removed already.
    pub fn set_targets(&mut self, targets: Vec<RefPath>) -> AoDiff {
        let mut diff = AoDiff::default();
        let mut old: HashMap<RefPath, AoEntry> = self
            .entries
            .drain(..)
            .map(|e| (e.target.clone(), e))
            .collect();

        self.index.clear();
        for target in targets {
            if self.index.contains_key(&target) {
                continue;
            }
            let entry = match old.remove(&target) {
                Some(entry) => entry,
                None => {
                    diff.added.push(target.clone());
                    AoEntry {
                        target: target.clone(),
                        ready: false,
                        resolved: false,
                    }
                }
            };
            self.index.insert(target, self.entries.len());
            self.entries.push(entry);
        }

        // Report removals in a stable order
        let mut removed: Vec<AoEntry> = old.into_values().collect();
        removed.sort_by(|a, b| a.target.cmp(&b.target));
        diff.removed = removed.into_iter().map(|e| (e.target, e.resolved)).collect();

        self.recount();
        diff
    }

    /// Apply a resolution to the entry for `target`; returns the new
    /// `resolved` flag when it flipped
    pub fn refresh(&mut self, target: &str, resolution: Resolution) -> Option<bool> {
        let idx = *self.index.get(target)?;
        let entry = &mut self.entries[idx];
        if entry.ready != resolution.ready {
            if resolution.ready {
                self.not_ready -= 1;
            } else {
                self.not_ready += 1;
            }
            entry.ready = resolution.ready;
        }
        if entry.resolved != resolution.resolved {
            entry.resolved = resolution.resolved;
            Some(resolution.resolved)
        } else {
            None
        }
    }

    /// Readiness change since the last call, if any
    pub fn take_readiness_change(&mut self) -> Option<bool> {
        let ready = self.is_ready();
        if ready != self.reported_ready {
            self.reported_ready = ready;
            Some(ready)
        } else {
            None
        }
    }

    /// Drop every entry; returns them with their resolved flags
    pub fn clear(&mut self) -> Vec<(RefPath, bool)> {
        self.index.clear();
        self.not_ready = 0;
        self.entries.drain(..).map(|e| (e.target, e.resolved)).collect()
    }

    pub fn is_ready(&self) -> bool {
        self.not_ready == 0
    }

    pub fn not_ready(&self) -> usize {
        self.not_ready
    }

    pub fn contains(&self, target: &str) -> bool {
        self.index.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All targets, in peer order
    pub fn targets(&self) -> impl Iterator<Item = &RefPath> {
        self.entries.iter().map(|e| &e.target)
    }

    /// Targets readers may follow, in peer order
    pub fn resolved(&self) -> impl Iterator<Item = &RefPath> {
        self.entries.iter().filter(|e| e.resolved).map(|e| &e.target)
    }

    fn recount(&mut self) {
        self.not_ready = self.entries.iter().filter(|e| !e.ready).count();
    }
}
