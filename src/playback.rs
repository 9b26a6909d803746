/// Playback control: pause, resume with a shuffled queue, device resolution
use crate::models::{Device, PlaylistSelection};
use crate::platform::Clock;
use crate::providers::{ProviderError, SpotifyApi};
use crate::storage::{self, KeyValueStore, StorageError};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Upper bound on the queue submitted when playback resumes
pub const MAX_QUEUE_LEN: usize = 50;

/// Page size requested from the liked-songs collection
pub const LIKED_SONGS_LIMIT: u32 = 50;

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Why an operation stopped before reaching the provider's player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoToken,
    TokenExpired,
    NoActiveDevice,
    NoTracks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Paused,
    Started { device_id: String, queued: usize },
    Skipped(SkipReason),
}

/// Issues playback commands using the stored access token
pub struct PlaybackClient {
    api: Arc<dyn SpotifyApi>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl PlaybackClient {
    pub fn new(
        api: Arc<dyn SpotifyApi>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { api, store, clock }
    }

    /// Stored token if present and not yet expired
    async fn usable_token(&self, action: &str) -> Result<Result<String, SkipReason>, StorageError> {
        let Some(credentials) = storage::load_credentials(self.store.as_ref()).await? else {
            error!("No access token available to {}", action);
            return Ok(Err(SkipReason::NoToken));
        };
        if credentials.is_expired(self.clock.now_ms()) {
            warn!("Access token expired, log in again to {}", action);
            return Ok(Err(SkipReason::TokenExpired));
        }
        Ok(Ok(credentials.access_token))
    }

    /// Pause whatever the account is currently playing
    pub async fn pause(&self) -> Result<PlaybackOutcome, PlaybackError> {
        let token = match self.usable_token("pause playback").await? {
            Ok(token) => token,
            Err(reason) => return Ok(PlaybackOutcome::Skipped(reason)),
        };

        if let Err(e) = self.api.pause(&token).await {
            error!("Error pausing playback: {}", e);
            return Err(e.into());
        }

        info!("Playback paused");
        Ok(PlaybackOutcome::Paused)
    }

    /// Start a shuffled queue from the selected source on the active device
    pub async fn resume(&self) -> Result<PlaybackOutcome, PlaybackError> {
        let token = match self.usable_token("start playback").await? {
            Ok(token) => token,
            Err(reason) => return Ok(PlaybackOutcome::Skipped(reason)),
        };

        let Some(device) = self.find_active_device(&token).await else {
            error!("No active Spotify device found");
            return Ok(PlaybackOutcome::Skipped(SkipReason::NoActiveDevice));
        };

        let selection = storage::load_selection(self.store.as_ref()).await?;
        let uris = self.track_uris(&token, &selection).await;
        if uris.is_empty() {
            error!("No tracks found in the selected playlist");
            return Ok(PlaybackOutcome::Skipped(SkipReason::NoTracks));
        }

        let queue = shuffle_queue(uris, &mut rand::thread_rng());
        if let Err(e) = self.api.play(&token, &device.id, &queue).await {
            error!("Error starting playback: {}", e);
            return Err(e.into());
        }

        info!(
            "Playback started on {} ({} tracks queued)",
            device.name,
            queue.len()
        );
        Ok(PlaybackOutcome::Started {
            device_id: device.id,
            queued: queue.len(),
        })
    }

    /// The device currently flagged active, if any
    pub async fn active_device(&self) -> Result<Option<Device>, PlaybackError> {
        match self.usable_token("look up devices").await? {
            Ok(token) => Ok(self.find_active_device(&token).await),
            Err(_) => Ok(None),
        }
    }

    async fn find_active_device(&self, token: &str) -> Option<Device> {
        match self.api.devices(token).await {
            Ok(devices) => devices.into_iter().find(|device| device.is_active),
            Err(e) => {
                error!("Error getting active device: {}", e);
                None
            }
        }
    }

    /// Track URIs of the selected source; fetch failures yield an empty list
    async fn track_uris(&self, token: &str, selection: &PlaylistSelection) -> Vec<String> {
        let result = match selection {
            PlaylistSelection::Liked => self.api.liked_track_uris(token, LIKED_SONGS_LIMIT).await,
            PlaylistSelection::Playlist(id) => self.api.playlist_track_uris(token, id).await,
        };
        result.unwrap_or_else(|e| {
            error!("Error fetching tracks for {:?}: {}", selection, e);
            Vec::new()
        })
    }
}

/// Uniformly shuffle `uris` and keep at most [`MAX_QUEUE_LEN`] of them
pub fn shuffle_queue<R: Rng + ?Sized>(mut uris: Vec<String>, rng: &mut R) -> Vec<String> {
    uris.shuffle(rng);
    uris.truncate(MAX_QUEUE_LEN);
    uris
}
