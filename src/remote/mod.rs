//! Remote source of truth for settings and listings.
//!
//! The sync core only talks to the backend through [`RemoteSource`]:
//!
//! - **Save settings**: persist a full [`SettingsSnapshot`]
//! - **List items**: fetch one page of the listing feed
//! - **Cancel**: dropping a `list_items` future aborts the request
//!
//! [`HttpRemote`] is the production transport.

mod http;

pub use http::HttpRemote;

use crate::feed::ItemPage;
use crate::settings::SettingsSnapshot;
use futures::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;

/// Errors from a single remote request.
///
/// Which lifecycle issued the request decides how the error is handled:
/// saves and polls retry on a fixed schedule, scroll fetches are dropped,
/// reset fetches surface a load error.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    /// Body was not the expected JSON shape
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// Backend answered `{"ok": false}`
    #[error("Backend rejected the request: {0}")]
    Rejected(String),
    #[error("Response too large")]
    ResponseTooLarge,
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The request was cancelled before it completed
    #[error("Request cancelled")]
    Cancelled,
    /// The task driving the request panicked
    #[error("Request task panicked: {0}")]
    TaskPanicked(String),
}

/// Transport operations the sync core depends on.
///
/// Implementations must be cancel-safe: dropping a returned future aborts
/// the underlying request.
pub trait RemoteSource: Send + Sync {
    fn save_settings<'a>(
        &'a self,
        snapshot: &'a SettingsSnapshot,
    ) -> BoxFuture<'a, Result<(), RemoteError>>;

    fn list_items(&self, page: u32, per_page: u32) -> BoxFuture<'_, Result<ItemPage, RemoteError>>;
}

/// Handle shared between the controllers and their request tasks.
pub type SharedRemote = Arc<dyn RemoteSource>;
