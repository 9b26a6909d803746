/// Domain types shared across the poller, playback client and storage
use serde::{Deserialize, Serialize};

/// Substring identifying tabs that belong to the provider's own web player
pub const PROVIDER_DOMAIN: &str = "spotify.com";

/// A browser tab as reported by the tab service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    /// Tabs without a known URL (e.g. devtools) report an empty string
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub audible: bool,
}

impl Tab {
    pub fn new(url: impl Into<String>, audible: bool) -> Self {
        Self {
            url: url.into(),
            audible,
        }
    }

    /// Whether the tab belongs to the provider itself
    pub fn is_provider(&self) -> bool {
        is_provider_url(&self.url)
    }
}

pub fn is_provider_url(url: &str) -> bool {
    url.contains(PROVIDER_DOMAIN)
}

/// Whether any tab outside the provider is currently making sound
pub fn other_audio_playing(tabs: &[Tab]) -> bool {
    tabs.iter().any(|tab| tab.audible && !tab.is_provider())
}

/// User preferences controlling the poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub auto_pause_enabled: bool,
    pub auto_replay_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_pause_enabled: true,
            auto_replay_enabled: true,
        }
    }
}

/// Source of the tracks queued when playback resumes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaylistSelection {
    /// The user's liked-songs collection
    #[default]
    Liked,
    Playlist(String),
}

impl PlaylistSelection {
    pub const LIKED: &'static str = "liked";

    /// Interpret a stored `selectedPlaylistId` value
    pub fn from_stored(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some(Self::LIKED) => Self::Liked,
            Some(id) => Self::Playlist(normalize_playlist_id(id).to_string()),
        }
    }

    pub fn as_stored(&self) -> &str {
        match self {
            Self::Liked => Self::LIKED,
            Self::Playlist(id) => id,
        }
    }
}

/// Extract the bare playlist id from a `spotify:playlist:` URI or an
/// `open.spotify.com/playlist/` link
pub fn normalize_playlist_id(id: &str) -> &str {
    let id = if id.contains("spotify:playlist:") {
        id.split(':').next_back().unwrap_or(id)
    } else if id.contains("/playlist/") {
        id.split('/').next_back().unwrap_or(id)
    } else {
        id
    };
    id.split('?').next().unwrap_or(id)
}

/// Access token persisted after a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub access_token: String,
    /// Absolute expiration, milliseconds since the Unix epoch
    pub expires_at_ms: i64,
}

impl StoredCredentials {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms
    }
}

/// A provider player instance able to receive playback commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub is_active: bool,
}
