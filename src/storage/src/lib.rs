// Core modules
pub mod types;
pub mod config;
pub mod engine;
pub mod rwlock;
pub mod sharded;
pub mod store;

// Re-export main types for convenience
pub use types::{current_timestamp_ms, Operation, Reply, StoreError};
pub use config::{build_engine, EngineKind, UnknownEngine};
pub use engine::KvEngine;
pub use rwlock::RwLockEngine;
pub use sharded::ShardedEngine;
pub use store::Store;
