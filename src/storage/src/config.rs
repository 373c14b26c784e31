use std::str::FromStr;
use std::sync::Arc;

use crate::engine::KvEngine;
use crate::rwlock::RwLockEngine;
use crate::sharded::ShardedEngine;

/// Storage engine selection, from the `engine` key in the node config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// Single RwLock'd map (default).
    RwLock,
    /// Hash-sharded maps, one lock per shard.
    Sharded,
}

/// The configured engine name was not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEngine(pub String);

impl std::fmt::Display for UnknownEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown storage engine '{}' (expected \"rwlock\" or \"sharded\")",
            self.0
        )
    }
}

impl std::error::Error for UnknownEngine {}

impl FromStr for EngineKind {
    type Err = UnknownEngine;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rwlock" => Ok(EngineKind::RwLock),
            "sharded" => Ok(EngineKind::Sharded),
            other => Err(UnknownEngine(other.to_string())),
        }
    }
}

/// Construct the engine named by the configuration.
pub fn build_engine(kind: EngineKind) -> Arc<dyn KvEngine> {
    match kind {
        EngineKind::RwLock => Arc::new(RwLockEngine::new()),
        EngineKind::Sharded => Arc::new(ShardedEngine::new()),
    }
}
