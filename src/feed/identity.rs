use super::item::{Item, ItemKey};
use std::collections::HashSet;

/// Identity keys of every item currently rendered in the feed.
///
/// Grows monotonically between resets and is cleared atomically on reset.
/// All insertions go through check-then-insert on the engine's event loop,
/// so no item can be added twice.
#[derive(Debug, Default, Clone)]
pub struct IdentitySet {
    keys: HashSet<ItemKey>,
}

impl IdentitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Record a key. Returns `true` if it was not already present.
    pub fn insert(&mut self, key: ItemKey) -> bool {
        self.keys.insert(key)
    }

    /// Keep only items whose key has not been seen, recording their keys.
    ///
    /// Duplicates inside `items` are collapsed to their first occurrence and
    /// the relative order of the survivors is preserved.
    pub fn retain_unseen(&mut self, items: Vec<Item>) -> Vec<Item> {
        items
            .into_iter()
            .filter(|item| self.keys.insert(item.key().clone()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemKey> {
        self.keys.iter()
    }
}
