//! Configuration file parser for ~/.config/listing-sync/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use crate::dashboard::Policies;
use crate::feed::FeedPolicy;
use crate::settings::{SavePolicy, SettingsForm};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable that overrides `session_cookie`.
pub const SESSION_ENV_VAR: &str = "LISTING_SYNC_SESSION";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
///
/// SEC: Custom Debug impl masks `session_cookie` so the session never ends up
/// in logs or error messages.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dashboard backend, e.g. `https://dashboard.example`.
    pub base_url: String,

    /// Raw `Cookie` header value carrying the dashboard session.
    /// The `LISTING_SYNC_SESSION` env var takes precedence.
    pub session_cookie: Option<String>,

    /// Items requested per page.
    pub per_page: u32,

    /// Deepest page infinite scroll may reach.
    pub max_pages: u32,

    pub timings: Timings,

    /// Settings form as currently stored by the backend.
    pub settings: SettingsForm,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            session_cookie: None,
            per_page: 10,
            max_pages: 5,
            timings: Timings::default(),
            settings: SettingsForm::default(),
        }
    }
}

/// SEC: Mask session_cookie in Debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field(
                "session_cookie",
                &self.session_cookie.as_ref().map(|_| "[REDACTED]"),
            )
            .field("per_page", &self.per_page)
            .field("max_pages", &self.max_pages)
            .field("timings", &self.timings)
            .field("settings", &self.settings)
            .finish()
    }
}

/// The `[timings]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub debounce_ms: u64,
    pub saving_indicator_delay_ms: u64,
    pub success_display_ms: u64,
    pub save_retry_delays_ms: Vec<u64>,
    pub scroll_min_interval_ms: u64,
    pub scroll_threshold_px: u32,
    pub poll_interval_secs: u64,
    pub poll_retry_delays_secs: Vec<u64>,
    pub request_timeout_secs: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            saving_indicator_delay_ms: 1000,
            success_display_ms: 1500,
            save_retry_delays_ms: vec![1000, 5000],
            scroll_min_interval_ms: 1000,
            scroll_threshold_px: 300,
            poll_interval_secs: 60,
            poll_retry_delays_secs: vec![5, 30],
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// SEC: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "base_url",
        "session_cookie",
        "per_page",
        "max_pages",
        "timings",
        "settings",
    ];

    /// `~/.config/listing-sync/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("listing-sync")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), base_url = %config.base_url, "Loaded configuration");
        Ok(config)
    }

    /// Check the values a loaded file may have gotten wrong.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_page == 0 {
            return Err(ConfigError::Invalid("per_page must be at least 1".into()));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid("max_pages must be at least 1".into()));
        }
        self.base_url().map(|_| ())
    }

    /// The parsed backend URL. Plain http is only accepted for localhost.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {}", self.base_url, e)))?;

        match url.scheme() {
            "https" => Ok(url),
            "http" if is_local_host(&url) => Ok(url),
            "http" => Err(ConfigError::Invalid(format!(
                "base_url '{}' must use https",
                self.base_url
            ))),
            scheme => Err(ConfigError::Invalid(format!(
                "base_url scheme '{}' is not supported",
                scheme
            ))),
        }
    }

    /// Session cookie from the environment, falling back to the file.
    pub fn session(&self) -> Option<SecretString> {
        std::env::var(SESSION_ENV_VAR)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.session_cookie.clone())
            .map(SecretString::from)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timings.request_timeout_secs)
    }

    pub fn policies(&self) -> Policies {
        let t = &self.timings;
        Policies {
            save: SavePolicy {
                debounce: Duration::from_millis(t.debounce_ms),
                saving_indicator_delay: Duration::from_millis(t.saving_indicator_delay_ms),
                success_display: Duration::from_millis(t.success_display_ms),
                retry_delays: t
                    .save_retry_delays_ms
                    .iter()
                    .map(|&ms| Duration::from_millis(ms))
                    .collect(),
            },
            feed: FeedPolicy {
                per_page: self.per_page,
                max_pages: self.max_pages,
                scroll_min_interval: Duration::from_millis(t.scroll_min_interval_ms),
                scroll_threshold_px: t.scroll_threshold_px,
                poll_interval: Duration::from_secs(t.poll_interval_secs),
                poll_retry_delays: t
                    .poll_retry_delays_secs
                    .iter()
                    .map(|&s| Duration::from_secs(s))
                    .collect(),
            },
        }
    }
}

fn is_local_host(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    )
}

// ============================================================================
// Tests
// ============================================================================
