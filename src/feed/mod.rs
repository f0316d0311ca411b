//! The listing feed.
//!
//! - [`item`] - feed entries and the wire page they arrive in
//! - [`identity`] - keys already rendered, for deduplication
//! - [`cursor`] - pagination progress and the paging limit
//! - [`engine`] - the [`SyncEngine`] driving reset, scroll and poll
//!
//! # Ordering
//!
//! The feed is newest first. Scroll pages append at the bottom, background
//! polls prepend at the top, and a reset replaces everything. No two entries
//! ever share an identity key.

mod cursor;
mod engine;
mod identity;
mod item;

pub use cursor::{PaginationCursor, PagingState};
pub use engine::{FeedPolicy, PollState, SyncEngine, Viewport};
pub use identity::IdentitySet;
pub use item::{Item, ItemKey, ItemPage, IDENTITY_FIELD};
