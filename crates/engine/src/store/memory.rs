//! In-memory snapshot store.
//!
//! Backs tests and the no-database fallback. `with_latency` injects a fixed
//! write delay so the coordinator's in-flight races can be exercised under
//! paused time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use sheetbldr_domain::{CharacterId, Snapshot};

use crate::error::StoreError;
use crate::store::ports::{CharacterStore, SettingsStore};

#[derive(Default)]
pub struct MemoryStore {
    characters: RwLock<HashMap<CharacterId, Snapshot>>,
    settings: RwLock<HashMap<String, String>>,
    active: RwLock<Option<CharacterId>>,
    save_count: AtomicUsize,
    latency: Option<Duration>,
    fail_saves: RwLock<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Completed `save` calls (failed attempts included).
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    /// Make subsequent saves fail, for retry-path tests.
    pub async fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.write().await = fail;
    }

    pub async fn snapshot_for(&self, id: CharacterId) -> Option<Snapshot> {
        self.characters.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl CharacterStore for MemoryStore {
    async fn save(&self, id: CharacterId, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.save_count.fetch_add(1, Ordering::SeqCst);
        if *self.fail_saves.read().await {
            return Err(StoreError::Database("memory store failing saves".to_string()));
        }
        self.characters.write().await.insert(id, snapshot.clone());
        Ok(())
    }

    async fn set_current(&self, id: CharacterId) -> Result<(), StoreError> {
        *self.active.write().await = Some(id);
        Ok(())
    }

    async fn load_current(&self) -> Result<Option<(CharacterId, Snapshot)>, StoreError> {
        let Some(id) = *self.active.read().await else {
            return Ok(None);
        };
        Ok(self
            .characters
            .read()
            .await
            .get(&id)
            .cloned()
            .map(|snapshot| (id, snapshot)))
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.settings.read().await.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.settings
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
