/// Preferences
///
/// Durable string records that survive restarts. The only record in use is
/// [`ETH_SIGNED`]: the topic of the last session whose sign-in succeeded.
///
use std::collections::BTreeMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;

use crate::constants::{ETH_SIGNED, PREFERENCES_NAME};
use crate::error::{Error, Result};

pub trait PreferenceStore: Send + Sync + 'static {
    fn get_string(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send;

    /// `None` removes the record. Once the future resolves the write is
    /// durable.
    fn set_string(
        &self,
        key: &str,
        value: Option<String>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn signed_eth(&self) -> impl Future<Output = Result<Option<String>>> + Send {
        self.get_string(ETH_SIGNED)
    }

    fn set_signed_eth(
        &self,
        topic: Option<String>,
    ) -> impl Future<Output = Result<()>> + Send {
        self.set_string(ETH_SIGNED, topic)
    }
}

/// Preferences kept as one JSON object in `<dir>/walletconnect.json`.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FilePreferences {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{PREFERENCES_NAME}.json")),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, records: &BTreeMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl PreferenceStore for FilePreferences {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load().await?.remove(key))
    }

    async fn set_string(&self, key: &str, value: Option<String>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let (mut records, unreadable) = match self.load().await {
            Ok(records) => (records, false),
            Err(Error::SerdeJsonError(e)) => {
                warn!("overwriting unreadable {}: {e}", self.path.display());
                (BTreeMap::new(), true)
            }
            Err(e) => return Err(e),
        };
        let changed = match value {
            Some(value) => records.insert(key.to_string(), value.clone()) != Some(value),
            None => records.remove(key).is_some(),
        };
        if changed || unreadable {
            self.save(&records).await?;
        }
        Ok(())
    }
}

/// Process-local preferences. Clones share the same records.
#[derive(Clone, Debug, Default)]
pub struct MemoryPreferences {
    records: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryPreferences {
    pub fn with_signed_eth(topic: &str) -> Self {
        let prefs = Self::default();
        prefs
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ETH_SIGNED.to_string(), topic.to_string());
        prefs
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl PreferenceStore for MemoryPreferences {
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    async fn set_string(&self, key: &str, value: Option<String>) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        match value {
            Some(value) => records.insert(key.to_string(), value),
            None => records.remove(key),
        };
        Ok(())
    }
}
