/// Spotify Autopause - pause the music while other tabs are talking
pub mod auth;
pub mod background;
pub mod commands;
pub mod config;
pub mod models;
pub mod platform;
pub mod playback;
pub mod poller;
pub mod providers;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthError, AuthState, Authenticator};
pub use background::{Background, Collaborators};
pub use config::Config;
pub use models::{Device, PlaylistSelection, Settings, StoredCredentials, Tab};
pub use playback::{PlaybackClient, PlaybackOutcome};
pub use poller::{AudioPoller, Transition};
pub use providers::{ProviderError, SpotifyApi};
pub use storage::{KeyValueStore, StorageArea};
