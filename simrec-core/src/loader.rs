//! Catalog and user loaders.
//!
//! Dataset parsing lives outside the core; the engine only needs the two
//! traits below. [`InMemoryCatalog`] and [`UserList`] are the reference
//! implementations, loadable from JSON files.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, SimError};
use crate::types::{Item, ItemId, User, UserId};

/// Source of catalog items.
pub trait ItemsLoader {
    /// Every id in the catalog, in a stable order. Action `i` recommends the
    /// `i`-th id.
    ///
    /// # Errors
    /// Backend-specific load failures.
    fn load_all_ids(&self) -> Result<Vec<ItemId>>;

    /// The items for `ids`, in the same order.
    ///
    /// # Errors
    /// `UnknownItem` for an id the catalog does not hold.
    fn load_items_from_ids(&self, ids: &[ItemId]) -> Result<Vec<Arc<Item>>>;
}

/// Source of synthetic users.
pub trait UsersLoader {
    /// All users, in a stable order. The engine assigns ids `0..N` in this order.
    ///
    /// # Errors
    /// Backend-specific load failures.
    fn get_users(&self) -> Result<Vec<User>>;
}

/// A catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    order: Vec<ItemId>,
    items: HashMap<ItemId, Arc<Item>>,
}

impl InMemoryCatalog {
    /// Build a catalog; ids keep the iteration order of `items`.
    ///
    /// # Errors
    /// `DuplicateItem` if two items share an id.
    pub fn new(items: impl IntoIterator<Item = Item>) -> Result<Self> {
        let mut catalog = Self::default();
        for item in items {
            let id = item.id.clone();
            if catalog.items.insert(id.clone(), Arc::new(item)).is_some() {
                return Err(SimError::DuplicateItem(id));
            }
            catalog.order.push(id);
        }
        Ok(catalog)
    }

    /// Load a JSON object mapping id → item. Ids come out in key order and
    /// override any `id` field inside the item.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Serialization` if it is not valid.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let raw: BTreeMap<String, Item> = serde_json::from_str(&content)?;
        debug!(path = %path.display(), items = raw.len(), "Loaded catalog");
        Self::new(raw.into_iter().map(|(id, mut item)| {
            item.id = ItemId(id);
            item
        }))
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the catalog holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl ItemsLoader for InMemoryCatalog {
    fn load_all_ids(&self) -> Result<Vec<ItemId>> {
        Ok(self.order.clone())
    }

    fn load_items_from_ids(&self, ids: &[ItemId]) -> Result<Vec<Arc<Item>>> {
        ids.iter()
            .map(|id| {
                self.items
                    .get(id)
                    .cloned()
                    .ok_or_else(|| SimError::UnknownItem(id.clone()))
            })
            .collect()
    }
}

/// A fixed list of users.
#[derive(Debug, Clone, Default)]
pub struct UserList {
    users: Vec<User>,
}

impl UserList {
    /// Wrap `users`, renumbering them `0..N` in order.
    #[must_use]
    pub fn new(users: Vec<User>) -> Self {
        let users = users
            .into_iter()
            .zip(0_u32..)
            .map(|(mut user, id)| {
                user.id = UserId(id);
                user
            })
            .collect();
        Self { users }
    }

    /// Load a JSON array of users.
    ///
    /// # Errors
    /// `Io` if the file cannot be read, `Serialization` if it is not valid.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let users: Vec<User> = serde_json::from_str(&content)?;
        debug!(path = %path.display(), users = users.len(), "Loaded users");
        Ok(Self::new(users))
    }
}

impl UsersLoader for UserList {
    fn get_users(&self) -> Result<Vec<User>> {
        Ok(self.users.clone())
    }
}
