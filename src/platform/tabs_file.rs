/// Tab service backed by a JSON snapshot written by the browser bridge
use super::{MatchPattern, PlatformError, TabService};
use crate::models::Tab;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

/// Reads `[{"url": ..., "audible": ...}, ...]` from a file on every query
pub struct JsonFileTabs {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileTabs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_tabs(&self) -> Result<Vec<Tab>, PlatformError> {
        // No snapshot yet means the bridge has not reported any tabs
        if !fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }
        let json = fs::read_to_string(&self.path).await?;
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&json)?)
    }
}

#[async_trait]
impl TabService for JsonFileTabs {
    async fn query(&self, pattern: Option<&MatchPattern>) -> Result<Vec<Tab>, PlatformError> {
        let tabs = self.read_tabs().await?;
        Ok(match pattern {
            Some(pattern) => tabs
                .into_iter()
                .filter(|tab| pattern.matches(&tab.url))
                .collect(),
            None => tabs,
        })
    }

    async fn create(&self, url: &str) -> Result<Tab, PlatformError> {
        let _guard = self.write_lock.lock().await;
        let mut tabs = self.read_tabs().await?;
        let tab = Tab::new(url, false);
        tabs.push(tab.clone());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&tabs)?).await?;

        tracing::info!("Opened tab {}", url);
        Ok(tab)
    }
}
