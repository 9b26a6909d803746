/// Key-value persistence for settings and credentials
pub mod file;

pub use file::JsonFileStore;

use crate::models::{PlaylistSelection, Settings, StoredCredentials};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::Mutex;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const TOKEN_EXPIRATION_KEY: &str = "tokenExpiration";
pub const SELECTED_PLAYLIST_KEY: &str = "selectedPlaylistId";
pub const AUTO_PAUSE_KEY: &str = "autoPauseEnabled";
pub const AUTO_REPLAY_KEY: &str = "autoReplayEnabled";

pub type StoredValues = Map<String, Value>;

/// The two independent scopes of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageArea {
    /// User preferences
    Settings,
    /// Access token, expiry and playlist selection
    Credentials,
}

impl StorageArea {
    pub fn name(&self) -> &'static str {
        match self {
            StorageArea::Settings => "settings",
            StorageArea::Credentials => "credentials",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt storage data: {0}")]
    Json(#[from] serde_json::Error),
}

/// Asynchronous key-value store with per-area namespaces
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the requested keys; missing keys are simply absent from the result
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<StoredValues, StorageError>;

    /// Merge `values` into the area
    async fn set(&self, area: StorageArea, values: StoredValues) -> Result<(), StorageError>;

    async fn remove(&self, area: StorageArea, keys: &[&str]) -> Result<(), StorageError>;
}

/// Volatile store, used by tests and as a fallback when no data dir is available
#[derive(Default)]
pub struct MemoryStore {
    areas: Mutex<HashMap<StorageArea, StoredValues>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<StoredValues, StorageError> {
        let areas = self.areas.lock().await;
        Ok(select_keys(areas.get(&area), keys))
    }

    async fn set(&self, area: StorageArea, values: StoredValues) -> Result<(), StorageError> {
        let mut areas = self.areas.lock().await;
        areas.entry(area).or_default().extend(values);
        Ok(())
    }

    async fn remove(&self, area: StorageArea, keys: &[&str]) -> Result<(), StorageError> {
        let mut areas = self.areas.lock().await;
        if let Some(values) = areas.get_mut(&area) {
            for key in keys {
                values.remove(*key);
            }
        }
        Ok(())
    }
}

pub(crate) fn select_keys(values: Option<&StoredValues>, keys: &[&str]) -> StoredValues {
    let mut selected = StoredValues::new();
    if let Some(values) = values {
        for key in keys {
            if let Some(value) = values.get(*key) {
                selected.insert(key.to_string(), value.clone());
            }
        }
    }
    selected
}

/// Read the user preferences; anything but an explicit `false` means enabled
pub async fn load_settings(store: &dyn KeyValueStore) -> Result<Settings, StorageError> {
    let values = store
        .get(StorageArea::Settings, &[AUTO_PAUSE_KEY, AUTO_REPLAY_KEY])
        .await?;
    let enabled = |key: &str| values.get(key) != Some(&Value::Bool(false));
    Ok(Settings {
        auto_pause_enabled: enabled(AUTO_PAUSE_KEY),
        auto_replay_enabled: enabled(AUTO_REPLAY_KEY),
    })
}

pub async fn save_settings(
    store: &dyn KeyValueStore,
    settings: &Settings,
) -> Result<(), StorageError> {
    let mut values = StoredValues::new();
    values.insert(
        AUTO_PAUSE_KEY.to_string(),
        Value::Bool(settings.auto_pause_enabled),
    );
    values.insert(
        AUTO_REPLAY_KEY.to_string(),
        Value::Bool(settings.auto_replay_enabled),
    );
    store.set(StorageArea::Settings, values).await
}

/// Read the stored access token
///
/// Returns `None` unless both a non-empty token and its expiration are present.
pub async fn load_credentials(
    store: &dyn KeyValueStore,
) -> Result<Option<StoredCredentials>, StorageError> {
    let values = store
        .get(
            StorageArea::Credentials,
            &[ACCESS_TOKEN_KEY, TOKEN_EXPIRATION_KEY],
        )
        .await?;

    let access_token = values
        .get(ACCESS_TOKEN_KEY)
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty());
    // Browsers store timestamps as JS numbers, which may come back as floats
    let expires_at_ms = values.get(TOKEN_EXPIRATION_KEY).and_then(|value| {
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|ms| ms as i64))
    });

    match (access_token, expires_at_ms) {
        (Some(token), Some(expires_at_ms)) => Ok(Some(StoredCredentials {
            access_token: token.to_string(),
            expires_at_ms,
        })),
        (Some(_), None) => {
            tracing::warn!("Stored access token has no expiration, ignoring it");
            Ok(None)
        }
        _ => Ok(None),
    }
}

pub async fn save_credentials(
    store: &dyn KeyValueStore,
    credentials: &StoredCredentials,
) -> Result<(), StorageError> {
    let mut values = StoredValues::new();
    values.insert(
        ACCESS_TOKEN_KEY.to_string(),
        Value::String(credentials.access_token.clone()),
    );
    values.insert(
        TOKEN_EXPIRATION_KEY.to_string(),
        Value::from(credentials.expires_at_ms),
    );
    store.set(StorageArea::Credentials, values).await
}

pub async fn clear_credentials(store: &dyn KeyValueStore) -> Result<(), StorageError> {
    store
        .remove(
            StorageArea::Credentials,
            &[ACCESS_TOKEN_KEY, TOKEN_EXPIRATION_KEY],
        )
        .await
}

pub async fn load_selection(store: &dyn KeyValueStore) -> Result<PlaylistSelection, StorageError> {
    let values = store
        .get(StorageArea::Credentials, &[SELECTED_PLAYLIST_KEY])
        .await?;
    Ok(PlaylistSelection::from_stored(
        values.get(SELECTED_PLAYLIST_KEY).and_then(Value::as_str),
    ))
}

pub async fn save_selection(
    store: &dyn KeyValueStore,
    selection: &PlaylistSelection,
) -> Result<(), StorageError> {
    let mut values = StoredValues::new();
    values.insert(
        SELECTED_PLAYLIST_KEY.to_string(),
        Value::String(selection.as_stored().to_string()),
    );
    store.set(StorageArea::Credentials, values).await
}
