use serde::{Deserialize, Serialize};
use storage::{current_timestamp_ms, Operation};

/// The unit of replication: one committed mutation, stamped with the
/// publishing node's identity and a per-origin sequence number.
///
/// `origin` exists only for loop prevention; it is never used for
/// storage addressing. `sequence` is monotonic per origin for the
/// lifetime of the process. `timestamp_ms` is advisory wall-clock time;
/// no cross-node ordering is derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationEvent {
    pub origin: String,
    pub sequence: u64,
    pub timestamp_ms: u64,
    pub operation: Operation,
}

impl ReplicationEvent {
    pub fn new(origin: String, sequence: u64, operation: Operation) -> Self {
        ReplicationEvent {
            origin,
            sequence,
            timestamp_ms: current_timestamp_ms(),
            operation,
        }
    }
}
