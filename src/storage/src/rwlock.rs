use async_trait::async_trait;
use log::info;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::engine::{apply_to_map, KvEngine};
use crate::types::{Operation, Reply, StoreError};

/// Default storage engine: a single map guarded by one RwLock.
///
/// Reads proceed concurrently; every mutation takes the write lock, so
/// per-key application is trivially atomic no matter whether the writer
/// is a client command or a remote apply. Good enough for the write
/// rates a single replicated node sees; use [`crate::ShardedEngine`]
/// when write contention matters.
pub struct RwLockEngine {
    map: RwLock<HashMap<String, String>>,
}

impl RwLockEngine {
    pub fn new() -> Self {
        info!("initializing rwlock storage engine");
        RwLockEngine {
            map: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for RwLockEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvEngine for RwLockEngine {
    async fn get(&self, key: &str) -> Option<String> {
        let map = self.map.read().await;
        map.get(key).cloned()
    }

    async fn apply(&self, op: &Operation) -> Result<Reply, StoreError> {
        let mut map = self.map.write().await;
        apply_to_map(&mut map, op)
    }

    async fn keys_count(&self) -> usize {
        self.map.read().await.len()
    }
}
