//! Dashboard filter settings and their persistence.
//!
//! - [`snapshot`] - the raw form, its normalized snapshot and signature
//! - [`persistence`] - debounced, single-flight saving with retry
//!
//! A successful save whose signature differs from the last accepted one
//! invalidates the feed through [`FeedInvalidator`].

mod persistence;
mod snapshot;

pub use persistence::{FeedInvalidator, PersistenceController, SavePolicy, SaveState};
pub use snapshot::{SettingsForm, SettingsSnapshot, Signature, ValidationError, VALUE_CEILING};
