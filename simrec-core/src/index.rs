//! Action ↔ item bijection.
//!
//! Built once from the catalog's id list: action `i` recommends the `i`-th
//! loaded id. Never mutated afterwards.

use std::collections::HashMap;

use crate::error::{Result, SimError};
use crate::types::ItemId;

/// Two mutually inverse maps between `[0, num_items)` and catalog ids.
#[derive(Debug, Clone)]
pub struct ActionItemIndex {
    action_to_item: Vec<ItemId>,
    item_to_action: HashMap<ItemId, usize>,
}

impl ActionItemIndex {
    /// Build the index from the catalog's ids, in order.
    ///
    /// # Errors
    /// `EmptyCatalog` for an empty list, `DuplicateItem` if an id repeats.
    pub fn new(ids: Vec<ItemId>) -> Result<Self> {
        if ids.is_empty() {
            return Err(SimError::EmptyCatalog);
        }
        let mut item_to_action = HashMap::with_capacity(ids.len());
        for (action, id) in ids.iter().enumerate() {
            if item_to_action.insert(id.clone(), action).is_some() {
                return Err(SimError::DuplicateItem(id.clone()));
            }
        }
        Ok(Self {
            action_to_item: ids,
            item_to_action,
        })
    }

    /// Size of the action space.
    #[must_use]
    pub fn len(&self) -> usize {
        self.action_to_item.len()
    }

    /// Always false: construction rejects empty catalogs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.action_to_item.is_empty()
    }

    /// The item recommended by `action`.
    ///
    /// # Errors
    /// `InvalidAction` when `action >= len()`.
    pub fn item(&self, action: usize) -> Result<&ItemId> {
        self.action_to_item
            .get(action)
            .ok_or(SimError::InvalidAction {
                action,
                num_items: self.len(),
            })
    }

    /// The action that recommends `item`, if it is in the catalog.
    #[must_use]
    pub fn action(&self, item: &ItemId) -> Option<usize> {
        self.item_to_action.get(item).copied()
    }

    /// All ids in action order.
    #[must_use]
    pub fn items(&self) -> &[ItemId] {
        &self.action_to_item
    }
}
