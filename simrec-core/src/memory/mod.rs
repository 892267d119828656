//! Interaction memory — the per-user log of consumed items.
//!
//! Layout: `user → item → [InteractionRecord]`, each list chronological.
//! Two invariants hold for every user:
//!
//! - successive records of one (user, item) pair carry watch counts
//!   `1, 2, 3, …` (a `delete_last` rolls the count back with the record);
//! - `step_index` never decreases across the user's whole log.

pub mod record;

pub use record::InteractionRecord;

use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, SimError};
use crate::types::{ItemId, UserId};

use record::ItemLog;

#[derive(Debug, Clone, Default)]
struct UserLog {
    /// Incremented once per `update` call.
    step_counter: u64,
    /// Ordinal handed to the next item seen for the first time.
    next_slot: u64,
    items: BTreeMap<ItemId, ItemLog>,
}

/// Append-only interaction store, exclusively owned by one engine.
#[derive(Debug, Clone, Default)]
pub struct InteractionMemory {
    users: HashMap<UserId, UserLog>,
}

impl InteractionMemory {
    /// Create an empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.users.clear();
    }

    /// Record that `user_id` consumed each item with the paired rating.
    ///
    /// All records of one call share a `step_index`: the user's counter is
    /// advanced once per call, not per item. An empty call records nothing
    /// and leaves the counter untouched.
    ///
    /// # Errors
    /// `Config` if `item_ids` and `ratings` differ in length.
    pub fn update(&mut self, user_id: UserId, item_ids: &[ItemId], ratings: &[f64]) -> Result<()> {
        if item_ids.len() != ratings.len() {
            return Err(SimError::Config(format!(
                "memory update needs one rating per item ({} items, {} ratings)",
                item_ids.len(),
                ratings.len()
            )));
        }
        if item_ids.is_empty() {
            return Ok(());
        }

        let log = self.users.entry(user_id).or_default();
        log.step_counter += 1;
        let step_index = log.step_counter;

        for (item_id, &rating) in item_ids.iter().zip(ratings) {
            let slot = log.next_slot;
            let item_log = log.items.entry(item_id.clone()).or_insert_with(|| ItemLog {
                first_seen: slot,
                records: Vec::new(),
            });
            if item_log.records.is_empty() {
                log.next_slot += 1;
            }
            let watch_count = u32::try_from(item_log.records.len())
                .map_or(u32::MAX, |n| n.saturating_add(1));
            item_log.records.push(InteractionRecord {
                rating,
                step_index,
                watch_count,
            });
        }
        Ok(())
    }

    /// The current-state view of a user: the most recent record of every
    /// item they have consumed, in first-seen order.
    #[must_use]
    pub fn get_history(&self, user_id: UserId) -> Vec<(ItemId, InteractionRecord)> {
        let Some(log) = self.users.get(&user_id) else {
            return Vec::new();
        };
        let mut history: Vec<(u64, ItemId, InteractionRecord)> = log
            .items
            .iter()
            .filter_map(|(id, item_log)| {
                item_log
                    .latest()
                    .map(|record| (item_log.first_seen, id.clone(), *record))
            })
            .collect();
        history.sort_by_key(|(slot, _, _)| *slot);
        history
            .into_iter()
            .map(|(_, id, record)| (id, record))
            .collect()
    }

    /// How many times `user_id` has consumed `item_id` (0 if never).
    #[must_use]
    pub fn num_times_watched(&self, user_id: UserId, item_id: &ItemId) -> u32 {
        self.users
            .get(&user_id)
            .and_then(|log| log.items.get(item_id))
            .and_then(ItemLog::latest)
            .map_or(0, |record| record.watch_count)
    }

    /// Full chronological log for one (user, item) pair; empty if absent.
    #[must_use]
    pub fn records(&self, user_id: UserId, item_id: &ItemId) -> &[InteractionRecord] {
        self.users
            .get(&user_id)
            .and_then(|log| log.items.get(item_id))
            .map_or(&[], |item_log| item_log.records.as_slice())
    }

    /// Number of distinct items recorded for a user.
    #[must_use]
    pub fn num_items(&self, user_id: UserId) -> usize {
        self.users.get(&user_id).map_or(0, |log| log.items.len())
    }

    /// Remove every record of a (user, item) pair.
    ///
    /// # Errors
    /// `UnknownInteraction` if the pair has no records.
    pub fn delete(&mut self, user_id: UserId, item_id: &ItemId) -> Result<()> {
        self.users
            .get_mut(&user_id)
            .and_then(|log| log.items.remove(item_id))
            .map(|_| ())
            .ok_or_else(|| SimError::UnknownInteraction {
                user_id,
                item_id: item_id.clone(),
            })
    }

    /// Remove only the most recent record of a (user, item) pair; the pair
    /// disappears entirely once its last record is gone.
    ///
    /// # Errors
    /// `UnknownInteraction` if the pair has no records.
    pub fn delete_last(&mut self, user_id: UserId, item_id: &ItemId) -> Result<()> {
        let unknown = || SimError::UnknownInteraction {
            user_id,
            item_id: item_id.clone(),
        };
        let log = self.users.get_mut(&user_id).ok_or_else(unknown)?;
        let item_log = log.items.get_mut(item_id).ok_or_else(unknown)?;
        item_log.records.pop().ok_or_else(unknown)?;
        if item_log.records.is_empty() {
            log.items.remove(item_id);
        }
        Ok(())
    }
}
