//! Repeated type mismatch tracking

use std::collections::HashMap;

/// Counts type mismatches per (interface, property)
///
/// A single mismatch is expected from a peer newer than the catalog. The
/// same pair failing again and again points at a catalog that is wrong, so
/// the pair is reported once more loudly when it reaches the threshold.
#[derive(Debug)]
pub struct MismatchTracker {
    threshold: u32,
    counts: HashMap<(String, String), u32>,
}

impl MismatchTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            counts: HashMap::new(),
        }
    }

    /// Record one mismatch; returns `true` exactly when the pair reaches the threshold
    pub fn record(&mut self, interface: &str, property: &str) -> bool {
        let count = self
            .counts
            .entry((interface.to_string(), property.to_string()))
            .or_insert(0);
        *count = count.saturating_add(1);
        *count == self.threshold
    }

    pub fn count(&self, interface: &str, property: &str) -> u32 {
        self.counts
            .get(&(interface.to_string(), property.to_string()))
            .copied()
            .unwrap_or(0)
    }
}
