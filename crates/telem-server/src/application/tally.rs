//! IngestionTally: per-device count of successfully decoded frames.
//!
//! Keys are whatever identifier the peer put in the frame.  Nothing verifies
//! it, so two physical devices that claim the same identifier share one
//! counter, and a peer inventing identifiers grows the map without bound.
//! Entries are never removed for the lifetime of the server.

use std::collections::HashMap;

/// In-memory tally of frames received per device identifier.
///
/// # HashMap choice
///
/// `record` runs once per frame, so it needs O(1) amortized updates.  The
/// shutdown report wants identifier order; [`IngestionTally::sorted`] pays
/// for that once at the end.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestionTally {
    counts: HashMap<String, u64>,
}

impl IngestionTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter for `identifier`, creating it at 1 on first sight.
    ///
    /// Returns the new count.
    pub fn record(&mut self, identifier: &str) -> u64 {
        if let Some(count) = self.counts.get_mut(identifier) {
            *count += 1;
            return *count;
        }
        self.counts.insert(identifier.to_owned(), 1);
        1
    }

    /// Count for `identifier`, or `None` if it has never been seen.
    pub fn count(&self, identifier: &str) -> Option<u64> {
        self.counts.get(identifier).copied()
    }

    /// Number of distinct identifiers seen.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total frames recorded across all identifiers.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Entries ordered by identifier.
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> =
            self.counts.iter().map(|(id, count)| (id.as_str(), *count)).collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Shutdown report, one line per identifier.
    pub fn report_lines(&self) -> Vec<String> {
        self.sorted()
            .into_iter()
            .map(|(id, count)| format!("Device: {id}\ttotal messages received: {count}"))
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
