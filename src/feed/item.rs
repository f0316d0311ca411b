use serde::Deserialize;
use serde_json::{Map, Value};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Wire field carrying an item's identity key.
pub const IDENTITY_FIELD: &str = "url";

/// Stable, externally issued identity of a feed item (the listing URL).
///
/// Cheap to clone: the key is shared between the feed and the identity set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(Arc<str>);

impl ItemKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemKey {
    fn from(key: &str) -> Self {
        Self(Arc::from(key))
    }
}

impl Borrow<str> for ItemKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One feed entry.
///
/// Only the identity key is interpreted; every other field is an opaque
/// display payload that passes through untouched. Items are never mutated
/// after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    key: ItemKey,
    fields: Arc<Map<String, Value>>,
}

impl Item {
    pub fn new(key: ItemKey, fields: Map<String, Value>) -> Self {
        Self {
            key,
            fields: Arc::new(fields),
        }
    }

    /// Build an item from its wire object. Returns `None` when the object has
    /// no usable identity key.
    pub fn from_fields(fields: Map<String, Value>) -> Option<Self> {
        let key = fields
            .get(IDENTITY_FIELD)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(ItemKey::from)?;
        Some(Self::new(key, fields))
    }

    pub fn key(&self) -> &ItemKey {
        &self.key
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Convenience accessor for string display fields.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Raw list response as served by the backend. Older servers name the list
/// `homes`.
#[derive(Debug, Deserialize)]
struct WirePage {
    #[serde(alias = "homes")]
    items: Vec<Map<String, Value>>,
    page: u32,
    per_page: u32,
    total: u64,
}

/// One decoded page of the remote listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPage {
    /// Items in server order (newest first).
    pub items: Vec<Item>,
    /// 1-based page number the server actually served.
    pub page: u32,
    pub per_page: u32,
    /// Total number of matching items across all pages.
    pub total: u64,
    /// Wire items dropped for lacking an identity key.
    pub skipped: usize,
}

impl ItemPage {
    pub fn new(items: Vec<Item>, page: u32, per_page: u32, total: u64) -> Self {
        Self {
            items,
            page,
            per_page,
            total,
            skipped: 0,
        }
    }

    /// Decode a JSON list response, skipping items without an identity key.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let wire: WirePage = serde_json::from_slice(bytes)?;
        let received = wire.items.len();
        let items: Vec<Item> = wire.items.into_iter().filter_map(Item::from_fields).collect();
        Ok(Self {
            skipped: received - items.len(),
            items,
            page: wire.page,
            per_page: wire.per_page,
            total: wire.total,
        })
    }

    /// `ceil(total / per_page)`; a zero page size is treated as one.
    pub fn total_pages(&self) -> u32 {
        let per_page = u64::from(self.per_page.max(1));
        u32::try_from(self.total.div_ceil(per_page)).unwrap_or(u32::MAX)
    }
}
