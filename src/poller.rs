/// Audio-activity poller: pauses the music while other tabs make sound
use crate::models::{other_audio_playing, Settings};
use crate::platform::TabService;
use crate::playback::PlaybackClient;
use crate::storage::{self, KeyValueStore};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Change in non-provider audio observed by a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Stopped,
    Unchanged,
}

pub struct AudioPoller {
    tabs: Arc<dyn TabService>,
    store: Arc<dyn KeyValueStore>,
    playback: Arc<PlaybackClient>,
    is_audio_playing: AtomicBool,
}

impl AudioPoller {
    pub fn new(
        tabs: Arc<dyn TabService>,
        store: Arc<dyn KeyValueStore>,
        playback: Arc<PlaybackClient>,
    ) -> Self {
        Self {
            tabs,
            store,
            playback,
            is_audio_playing: AtomicBool::new(false),
        }
    }

    /// Whether a non-provider tab was audible at the last tick
    pub fn is_audio_playing(&self) -> bool {
        self.is_audio_playing.load(Ordering::SeqCst)
    }

    /// Observe the tabs once and react to a transition
    pub async fn tick(&self) -> Transition {
        let settings = match storage::load_settings(self.store.as_ref()).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Could not read settings, using defaults: {}", e);
                Settings::default()
            }
        };

        let tabs = match self.tabs.query(None).await {
            Ok(tabs) => tabs,
            Err(e) => {
                error!("Error querying tabs: {}", e);
                return Transition::Unchanged;
            }
        };

        let audible = other_audio_playing(&tabs);
        let was_audible = self.is_audio_playing.swap(audible, Ordering::SeqCst);
        debug!("{} tabs, other audio playing: {}", tabs.len(), audible);

        match (was_audible, audible) {
            (false, true) => {
                if settings.auto_pause_enabled {
                    info!("Other audio started, pausing Spotify");
                    if let Err(e) = self.playback.pause().await {
                        error!("Auto-pause failed: {}", e);
                    }
                } else {
                    debug!("Other audio started, auto-pause disabled");
                }
                Transition::Started
            }
            (true, false) => {
                if settings.auto_replay_enabled {
                    info!("Other audio stopped, resuming Spotify");
                    if let Err(e) = self.playback.resume().await {
                        error!("Auto-replay failed: {}", e);
                    }
                } else {
                    debug!("Other audio stopped, auto-replay disabled");
                }
                Transition::Stopped
            }
            _ => Transition::Unchanged,
        }
    }

    /// Tick every `period` until `shutdown` completes
    pub async fn run<F>(&self, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!("Audio poller started ({}ms interval)", period.as_millis());
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
        info!("Audio poller stopped");
    }
}
