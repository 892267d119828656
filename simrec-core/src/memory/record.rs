//! Interaction records, one per (user, item, occurrence).

use serde::{Deserialize, Serialize};

/// A single recorded consumption of an item by a user.
///
/// Records are only ever appended or removed, never edited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Rating the user gave on this occurrence (`0` = not rated / sentinel).
    pub rating: f64,
    /// Per-user update counter at the time of recording (starts at 1).
    pub step_index: u64,
    /// How many times the user has consumed this item, this occurrence included.
    pub watch_count: u32,
}

/// The chronological log of one (user, item) pair.
#[derive(Debug, Clone, Default)]
pub(crate) struct ItemLog {
    /// Ordinal of the first record of this item in the user's log; used to
    /// return history in a stable first-seen order.
    pub(crate) first_seen: u64,
    pub(crate) records: Vec<InteractionRecord>,
}

impl ItemLog {
    pub(crate) fn latest(&self) -> Option<&InteractionRecord> {
        self.records.last()
    }
}
