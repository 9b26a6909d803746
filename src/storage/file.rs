/// JSON-file backed store, one file per storage area
use super::{select_keys, KeyValueStore, StorageArea, StorageError, StoredValues};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct JsonFileStore {
    dir: PathBuf,
    // serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn area_path(&self, area: StorageArea) -> PathBuf {
        self.dir.join(format!("{}.json", area.name()))
    }

    async fn read_area(&self, area: StorageArea) -> Result<StoredValues, StorageError> {
        let path = self.area_path(area);
        if !fs::try_exists(&path).await? {
            return Ok(StoredValues::new());
        }

        let json = fs::read_to_string(&path).await?;
        if json.trim().is_empty() {
            return Ok(StoredValues::new());
        }
        Ok(serde_json::from_str(&json)?)
    }

    /// Write to a sibling temp file, then rename it over the area file so
    /// readers only ever see a complete document
    async fn write_area(&self, area: StorageArea, values: &StoredValues) -> Result<(), StorageError> {
        let path = self.area_path(area);
        let tmp_path = self.dir.join(format!(".{}.json.tmp", area.name()));
        fs::create_dir_all(&self.dir).await?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)
            .await?;

        // Credentials hold a bearer token, keep them private (600) before any byte lands
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if area == StorageArea::Credentials {
                file.set_permissions(std::fs::Permissions::from_mode(0o600))
                    .await?;
            }
        }

        file.write_all(serde_json::to_string_pretty(values)?.as_bytes())
            .await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp_path, &path).await?;

        tracing::debug!("Wrote {} store to {:?}", area.name(), path);
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, area: StorageArea, keys: &[&str]) -> Result<StoredValues, StorageError> {
        let values = self.read_area(area).await?;
        Ok(select_keys(Some(&values), keys))
    }

    async fn set(&self, area: StorageArea, values: StoredValues) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut current = self.read_area(area).await?;
        current.extend(values);
        self.write_area(area, &current).await
    }

    async fn remove(&self, area: StorageArea, keys: &[&str]) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut current = self.read_area(area).await?;
        let before = current.len();
        for key in keys {
            current.remove(*key);
        }
        if current.len() == before {
            return Ok(());
        }
        self.write_area(area, &current).await
    }
}
