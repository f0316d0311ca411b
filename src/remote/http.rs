use super::{RemoteError, RemoteSource};
use crate::feed::ItemPage;
use crate::settings::SettingsSnapshot;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE};
use reqwest::redirect::Policy;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

// Relative to the base URL, so a base with a path prefix keeps it.
const LIST_PATH: &str = "api/homes";
const SETTINGS_PATH: &str = "dashboard/filters";

/// Resolve `path` below `base`, treating the base path as a directory.
fn endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path)
}

/// Body of the settings endpoint's reply.
#[derive(Debug, Deserialize)]
struct SaveReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Create a redirect policy with loop detection and limited hops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// [`RemoteSource`] over the dashboard's JSON HTTP API.
///
/// SEC: the session cookie is held as a [`SecretString`] and never logged.
pub struct HttpRemote {
    client: reqwest::Client,
    list_url: Url,
    settings_url: Url,
    session_cookie: Option<SecretString>,
    timeout: Duration,
}

impl HttpRemote {
    pub fn new(
        base_url: &Url,
        session_cookie: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .redirect(create_redirect_policy())
            .user_agent(concat!("listing-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            list_url: endpoint(base_url, LIST_PATH)?,
            settings_url: endpoint(base_url, SETTINGS_PATH)?,
            session_cookie,
            timeout,
        })
    }

    /// Send a request with auth and timeout applied, rejecting non-2xx replies.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, RemoteError> {
        let mut request = request.header(ACCEPT, "application/json");
        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie.expose_secret());
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| RemoteError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::HttpStatus(status.as_u16()));
        }

        tokio::time::timeout(self.timeout, read_limited_bytes(response, MAX_RESPONSE_SIZE))
            .await
            .map_err(|_| RemoteError::Timeout)?
    }
}

impl RemoteSource for HttpRemote {
    fn save_settings<'a>(
        &'a self,
        snapshot: &'a SettingsSnapshot,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        async move {
            let body = serde_json::to_vec(snapshot)?;
            let request = self
                .client
                .post(self.settings_url.clone())
                .header(CONTENT_TYPE, "application/json")
                .body(body);

            let bytes = self.send(request).await?;
            let reply: SaveReply = serde_json::from_slice(&bytes)?;
            if !reply.ok {
                return Err(RemoteError::Rejected(
                    reply.error.unwrap_or_else(|| "save failed".to_string()),
                ));
            }
            Ok(())
        }
        .boxed()
    }

    fn list_items(&self, page: u32, per_page: u32) -> BoxFuture<'_, Result<ItemPage, RemoteError>> {
        async move {
            let mut url = self.list_url.clone();
            url.query_pairs_mut()
                .append_pair("page", &page.to_string())
                .append_pair("per_page", &per_page.to_string());

            let bytes = self.send(self.client.get(url)).await?;
            let page = ItemPage::from_json(&bytes)?;

            if page.skipped > 0 {
                tracing::warn!(
                    page = page.page,
                    skipped = page.skipped,
                    "Listing items without an identity key skipped"
                );
            }
            Ok(page)
        }
        .boxed()
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, RemoteError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(RemoteError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(RemoteError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
