//! Hand-written doubles for the collaborator traits
use crate::models::{Device, StoredCredentials, Tab};
use crate::platform::{AuthorizationPrompt, Clock, MatchPattern, PlatformError, PromptError, TabService};
use crate::providers::{ProviderError, SpotifyApi};
use crate::storage::{self, MemoryStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

pub const T0: i64 = 1_700_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Devices,
    LikedTracks(u32),
    PlaylistTracks(String),
    Play { device_id: String, uris: Vec<String> },
    Pause,
}

/// Records every call and answers from canned data
#[derive(Default)]
pub struct RecordingApi {
    pub devices: Vec<Device>,
    pub liked: Vec<String>,
    pub playlists: HashMap<String, Vec<String>>,
    pub fail_pause: bool,
    pub fail_devices: bool,
    pub calls: Mutex<Vec<ApiCall>>,
}

impl RecordingApi {
    pub fn with_active_device() -> Self {
        Self {
            devices: vec![
                Device {
                    id: "idle".to_string(),
                    name: "Phone".to_string(),
                    is_active: false,
                },
                Device {
                    id: "desk".to_string(),
                    name: "Desktop".to_string(),
                    is_active: true,
                },
            ],
            liked: track_uris(10),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pause_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ApiCall::Pause))
            .count()
    }

    pub fn play_calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::Play { device_id, uris } => Some((device_id, uris)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn track_uris(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("spotify:track:{}", i)).collect()
}

#[async_trait]
impl SpotifyApi for RecordingApi {
    async fn devices(&self, _token: &str) -> Result<Vec<Device>, ProviderError> {
        self.record(ApiCall::Devices);
        if self.fail_devices {
            return Err(ProviderError::Api {
                status: 503,
                message: "Service unavailable".to_string(),
            });
        }
        Ok(self.devices.clone())
    }

    async fn liked_track_uris(&self, _token: &str, limit: u32) -> Result<Vec<String>, ProviderError> {
        self.record(ApiCall::LikedTracks(limit));
        Ok(self.liked.clone())
    }

    async fn playlist_track_uris(
        &self,
        _token: &str,
        playlist_id: &str,
    ) -> Result<Vec<String>, ProviderError> {
        self.record(ApiCall::PlaylistTracks(playlist_id.to_string()));
        self.playlists
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| ProviderError::Api {
                status: 404,
                message: "Resource not found".to_string(),
            })
    }

    async fn play(&self, _token: &str, device_id: &str, uris: &[String]) -> Result<(), ProviderError> {
        self.record(ApiCall::Play {
            device_id: device_id.to_string(),
            uris: uris.to_vec(),
        });
        Ok(())
    }

    async fn pause(&self, _token: &str) -> Result<(), ProviderError> {
        self.record(ApiCall::Pause);
        if self.fail_pause {
            return Err(ProviderError::Api {
                status: 404,
                message: "Player command failed: No active device found".to_string(),
            });
        }
        Ok(())
    }
}

pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn at(now_ms: i64) -> Self {
        Self(AtomicI64::new(now_ms))
    }

    pub fn set(&self, now_ms: i64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-memory tab list that tests mutate between ticks
#[derive(Default)]
pub struct StaticTabs {
    tabs: Mutex<Vec<Tab>>,
    created: Mutex<Vec<String>>,
    pub fail: bool,
}

impl StaticTabs {
    pub fn new(tabs: Vec<Tab>) -> Self {
        Self {
            tabs: Mutex::new(tabs),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn set(&self, tabs: Vec<Tab>) {
        *self.tabs.lock().unwrap() = tabs;
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl TabService for StaticTabs {
    async fn query(&self, pattern: Option<&MatchPattern>) -> Result<Vec<Tab>, PlatformError> {
        if self.fail {
            return Err(PlatformError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "tabs unavailable",
            )));
        }
        let tabs = self.tabs.lock().unwrap().clone();
        Ok(match pattern {
            Some(pattern) => tabs.into_iter().filter(|t| pattern.matches(&t.url)).collect(),
            None => tabs,
        })
    }

    async fn create(&self, url: &str) -> Result<Tab, PlatformError> {
        self.created.lock().unwrap().push(url.to_string());
        let tab = Tab::new(url, false);
        self.tabs.lock().unwrap().push(tab.clone());
        Ok(tab)
    }
}

/// Prompt returning a preset outcome and remembering the URLs it was shown
pub struct ScriptedPrompt {
    outcome: Mutex<Option<Result<Option<String>, PromptError>>>,
    launched: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn redirect(url: &str) -> Self {
        Self::with_outcome(Ok(Some(url.to_string())))
    }

    pub fn with_outcome(outcome: Result<Option<String>, PromptError>) -> Self {
        Self {
            outcome: Mutex::new(Some(outcome)),
            launched: Mutex::new(Vec::new()),
        }
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthorizationPrompt for ScriptedPrompt {
    async fn launch(&self, url: &Url, _interactive: bool) -> Result<Option<String>, PromptError> {
        self.launched.lock().unwrap().push(url.to_string());
        self.outcome
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Err(PromptError::Cancelled))
    }
}

/// Memory store already holding a token expiring at `expires_at_ms`
pub async fn store_with_token(token: &str, expires_at_ms: i64) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    storage::save_credentials(
        store.as_ref(),
        &StoredCredentials {
            access_token: token.to_string(),
            expires_at_ms,
        },
    )
    .await
    .unwrap();
    store
}
