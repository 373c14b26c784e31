use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single mutation against the key-value store.
///
/// Operations are produced by two callers: the client command path
/// (which commits them locally and hands them to the replication layer)
/// and the remote-apply path (which replays operations received from
/// peers). Both paths go through the same per-key application logic.
///
/// The serde representation is the shared wire vocabulary: a tagged map
/// like `{"op": "SET", "key": "k", "value": "v"}`. Both wire formats
/// (JSON and CBOR) serialize this same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Operation {
    #[serde(rename = "SET")]
    Set { key: String, value: String },
    #[serde(rename = "DEL")]
    Delete { key: String },
    #[serde(rename = "INC")]
    Increment { key: String, delta: i64 },
    #[serde(rename = "DEC")]
    Decrement { key: String, delta: i64 },
    #[serde(rename = "APPEND")]
    Append { key: String, suffix: String },
    #[serde(rename = "PREPEND")]
    Prepend { key: String, prefix: String },
}

impl Operation {
    /// The key this operation targets.
    pub fn key(&self) -> &str {
        match self {
            Operation::Set { key, .. }
            | Operation::Delete { key }
            | Operation::Increment { key, .. }
            | Operation::Decrement { key, .. }
            | Operation::Append { key, .. }
            | Operation::Prepend { key, .. } => key,
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Set { .. } => "SET",
            Operation::Delete { .. } => "DEL",
            Operation::Increment { .. } => "INC",
            Operation::Decrement { .. } => "DEC",
            Operation::Append { .. } => "APPEND",
            Operation::Prepend { .. } => "PREPEND",
        }
    }
}

/// Result of successfully applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// SET succeeded.
    Ok,
    /// DEL removed an existing key.
    Deleted,
    /// DEL targeted an absent key (nothing changed).
    NotFound,
    /// INC/DEC produced this new value.
    Number(i64),
    /// APPEND/PREPEND produced this new value.
    Value(String),
}

impl Reply {
    /// Whether the operation actually changed stored state.
    ///
    /// A DEL of an absent key is a successful no-op; it must not be
    /// announced to the replication layer.
    pub fn mutated(&self) -> bool {
        !matches!(self, Reply::NotFound)
    }
}

/// Error applying an operation to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// INC/DEC against a value that does not parse as an integer.
    NotNumeric { key: String },
    /// INC/DEC would overflow i64.
    Overflow { key: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotNumeric { key } => {
                write!(f, "value for key '{}' is not an integer", key)
            }
            StoreError::Overflow { key } => {
                write!(f, "numeric overflow for key '{}'", key)
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
