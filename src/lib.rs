//! Incremental sync for a listings dashboard.
//!
//! Two cooperating controllers run on one event loop owned by
//! [`Dashboard`]:
//!
//! - [`settings::PersistenceController`] debounces settings edits and saves
//!   them with single-flight retry
//! - [`feed::SyncEngine`] keeps a deduplicated, newest-first feed through
//!   reset loads, infinite scroll and a background poll
//!
//! A save whose filter signature changed resets the feed.

pub mod config;
pub mod console;
pub mod dashboard;
pub mod feed;
pub mod remote;
pub mod settings;
mod task;
pub mod view;

pub use config::{Config, ConfigError};
pub use dashboard::{Command, Dashboard, DashboardObserver, DashboardView, Policies};
pub use remote::{HttpRemote, RemoteError, RemoteSource, SharedRemote};
pub use task::{SyncEvent, TimerId};
