/// Background coordinator: owns the poller and answers control messages
use crate::auth::Authenticator;
use crate::commands;
use crate::config::{Config, ConfigError};
use crate::platform::{AuthorizationPrompt, Clock, JsonFileTabs, SystemClock, TabService};
use crate::playback::PlaybackClient;
use crate::poller::AudioPoller;
use crate::providers::{ProviderError, SpotifyApi, SpotifyWebApi};
use crate::storage::{JsonFileStore, KeyValueStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to create HTTP client: {0}")]
    Provider(#[from] ProviderError),
}

/// Host capabilities the coordinator is built from
pub struct Collaborators {
    pub store: Arc<dyn KeyValueStore>,
    pub tabs: Arc<dyn TabService>,
    pub prompt: Arc<dyn AuthorizationPrompt>,
    pub clock: Arc<dyn Clock>,
    pub api: Arc<dyn SpotifyApi>,
}

impl Collaborators {
    /// File-backed stores and tabs in the data dir, the reqwest Web API client
    pub fn from_config(
        config: &Config,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Result<Self, SetupError> {
        let data_dir = config.data_dir()?;
        let tabs_file = config.tabs_file()?;
        debug!(
            "Using data dir {} and tabs file {}",
            data_dir.display(),
            tabs_file.display()
        );

        Ok(Self {
            store: Arc::new(JsonFileStore::new(data_dir)),
            tabs: Arc::new(JsonFileTabs::new(tabs_file)),
            prompt,
            clock: Arc::new(SystemClock),
            api: Arc::new(SpotifyWebApi::from_config(&config.spotify)?),
        })
    }
}

pub struct Background {
    auth: Authenticator,
    playback: Arc<PlaybackClient>,
    poller: Arc<AudioPoller>,
    tabs: Arc<dyn TabService>,
    store: Arc<dyn KeyValueStore>,
    poll_interval: Duration,
}

impl Background {
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let Collaborators {
            store,
            tabs,
            prompt,
            clock,
            api,
        } = collaborators;

        let playback = Arc::new(PlaybackClient::new(api, store.clone(), clock.clone()));
        let auth = Authenticator::new(config.spotify.clone(), prompt, store.clone(), clock);
        let poller = Arc::new(AudioPoller::new(
            tabs.clone(),
            store.clone(),
            playback.clone(),
        ));

        Self {
            auth,
            playback,
            poller,
            tabs,
            store,
            poll_interval: config.poll_interval(),
        }
    }

    pub fn from_config(
        config: &Config,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Result<Self, SetupError> {
        Ok(Self::new(config, Collaborators::from_config(config, prompt)?))
    }

    pub fn auth(&self) -> &Authenticator {
        &self.auth
    }

    pub fn playback(&self) -> &PlaybackClient {
        &self.playback
    }

    pub fn poller(&self) -> &AudioPoller {
        &self.poller
    }

    pub fn tabs(&self) -> &dyn TabService {
        self.tabs.as_ref()
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Run the poller and answer one JSON message per input line until
    /// `input` reaches EOF
    pub async fn serve<R, W>(self: Arc<Self>, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let poller = self.poller.clone();
        let period = self.poll_interval;
        let poll_task = tokio::spawn(async move {
            poller
                .run(period, async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        info!("Listening for control messages");
        let result = self.handle_messages(input, &mut output).await;

        let _ = shutdown_tx.send(());
        if let Err(e) = poll_task.await {
            error!("Poller task failed: {}", e);
        }
        info!("Control channel closed, shutting down");
        result
    }

    async fn handle_messages<R, W>(&self, input: R, output: &mut W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let response = commands::dispatch_line(self, &line).await;
            let mut encoded = serde_json::to_string(&response)?;
            encoded.push('\n');
            output.write_all(encoded.as_bytes()).await?;
            output.flush().await?;
        }
        Ok(())
    }
}
