use async_trait::async_trait;
use log::info;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tokio::sync::RwLock;

use crate::engine::{apply_to_map, KvEngine};
use crate::types::{Operation, Reply, StoreError};

/// Number of shards (must be power of 2 for efficient hashing)
const DEFAULT_SHARD_COUNT: usize = 64;

/// Sharded storage engine for high-concurrency access.
///
/// Keys are distributed across shards by hash; each shard has its own
/// RwLock, so writers to different keys rarely contend. Selected with
/// `engine = "sharded"` in the node configuration.
pub struct ShardedEngine {
    shards: Vec<RwLock<HashMap<String, String>>>,
    shard_count: usize,
}

impl ShardedEngine {
    /// Create a sharded engine with the default number of shards (64).
    pub fn new() -> Self {
        Self::with_shard_count(DEFAULT_SHARD_COUNT)
    }

    /// Create a sharded engine with a specific number of shards.
    pub fn with_shard_count(count: usize) -> Self {
        // Round up so the index mask works
        let count = count.next_power_of_two();
        let shards = (0..count).map(|_| RwLock::new(HashMap::new())).collect();

        info!("initializing sharded storage engine with {} shards", count);

        ShardedEngine {
            shards,
            shard_count: count,
        }
    }

    #[inline]
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) & (self.shard_count - 1)
    }
}

impl Default for ShardedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvEngine for ShardedEngine {
    async fn get(&self, key: &str) -> Option<String> {
        let shard = self.shards[self.shard_index(key)].read().await;
        shard.get(key).cloned()
    }

    async fn apply(&self, op: &Operation) -> Result<Reply, StoreError> {
        let mut shard = self.shards[self.shard_index(op.key())].write().await;
        apply_to_map(&mut shard, op)
    }

    async fn keys_count(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().await.len();
        }
        total
    }
}
