/// Host capabilities the coordinator depends on: tabs, the authorization
/// prompt and the clock
pub mod tabs_file;
pub mod terminal;

pub use tabs_file::JsonFileTabs;
pub use terminal::TerminalPrompt;

use crate::models::Tab;
use async_trait::async_trait;
use std::str::FromStr;
use url::Url;

/// Pattern matching the provider's web player tabs
pub const PROVIDER_TAB_PATTERN: &str = "*://open.spotify.com/*";

/// Page opened when no provider tab exists
pub const PROVIDER_HOME_URL: &str = "https://open.spotify.com";

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid tab snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid match pattern: {0}")]
    Pattern(String),
}

/// Enumerates and opens browser tabs
#[async_trait]
pub trait TabService: Send + Sync {
    /// All open tabs, or only those whose URL matches `pattern`
    async fn query(&self, pattern: Option<&MatchPattern>) -> Result<Vec<Tab>, PlatformError>;

    async fn create(&self, url: &str) -> Result<Tab, PlatformError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("The user did not approve access")]
    Cancelled,
    #[error("Authorization prompt failed: {0}")]
    Failed(String),
}

/// Interactive web authorization (the browser's identity popup)
#[async_trait]
pub trait AuthorizationPrompt: Send + Sync {
    /// Open `url` and wait for the redirect; `Ok(None)` when the flow
    /// finished without producing a redirect URL
    async fn launch(&self, url: &Url, interactive: bool) -> Result<Option<String>, PromptError>;
}

pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A browser-style URL match pattern: `<scheme>://<host>/<path>`
///
/// `*` as scheme matches http and https, a leading `*.` in the host matches
/// any subdomain, and `*` in the path matches any run of characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPattern {
    scheme: String,
    host: String,
    path: String,
}

impl MatchPattern {
    pub fn provider_tabs() -> Self {
        Self {
            scheme: "*".to_string(),
            host: "open.spotify.com".to_string(),
            path: "/*".to_string(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };

        let scheme_ok = match self.scheme.as_str() {
            "*" => matches!(url.scheme(), "http" | "https"),
            scheme => url.scheme() == scheme,
        };
        if !scheme_ok {
            return false;
        }

        let host = url.host_str().unwrap_or_default();
        let host_ok = if self.host == "*" {
            true
        } else if let Some(domain) = self.host.strip_prefix("*.") {
            host == domain || host.ends_with(&format!(".{}", domain))
        } else {
            host == self.host
        };
        if !host_ok {
            return false;
        }

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        glob_match(&self.path, &path)
    }
}

impl FromStr for MatchPattern {
    type Err = PlatformError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        let invalid = || PlatformError::Pattern(pattern.to_string());
        let (scheme, rest) = pattern.split_once("://").ok_or_else(invalid)?;
        let (host, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => return Err(invalid()),
        };
        if scheme.is_empty() || host.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            path: path.to_string(),
        })
    }
}

/// Match `text` against `pattern` where `*` is the only wildcard
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = text.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // no wildcard at all
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
