/// Provider API trait and implementations
pub mod spotify;

pub use spotify::SpotifyWebApi;

use crate::models::Device;
use async_trait::async_trait;

/// Error type for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Non-2xx response; `message` comes from the provider's error body
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },
}

/// Playback-control surface of the provider's Web API
///
/// Every call is bearer-authenticated with the token passed in; the token is
/// read from storage by the caller for each operation.
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    /// Devices associated with the account
    async fn devices(&self, token: &str) -> Result<Vec<Device>, ProviderError>;

    /// Track URIs of the first page of the user's liked songs
    async fn liked_track_uris(&self, token: &str, limit: u32) -> Result<Vec<String>, ProviderError>;

    /// Track URIs of the first page of a playlist
    async fn playlist_track_uris(
        &self,
        token: &str,
        playlist_id: &str,
    ) -> Result<Vec<String>, ProviderError>;

    /// Replace the play queue on `device_id` with `uris` and start playing
    async fn play(&self, token: &str, device_id: &str, uris: &[String]) -> Result<(), ProviderError>;

    /// Pause the currently active playback
    async fn pause(&self, token: &str) -> Result<(), ProviderError>;
}
