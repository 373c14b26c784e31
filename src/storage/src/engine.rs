use async_trait::async_trait;
use std::collections::HashMap;

use crate::types::{Operation, Reply, StoreError};

/// Abstraction over the in-memory key-value engines.
///
/// The engine is the only resource shared between the client-write path
/// and the remote-apply path, so implementations must serialize per-key
/// mutations regardless of which caller invokes them.
#[async_trait]
pub trait KvEngine: Send + Sync {
    /// Look up a key. Returns `None` if absent.
    async fn get(&self, key: &str) -> Option<String>;

    /// Apply a mutation atomically.
    async fn apply(&self, op: &Operation) -> Result<Reply, StoreError>;

    /// Number of keys currently stored.
    async fn keys_count(&self) -> usize;
}

/// Apply an operation to a plain map.
///
/// Shared by every engine so that local and remote writers observe
/// identical semantics. Callers must hold whatever lock guards `map`
/// for the duration of the call.
pub(crate) fn apply_to_map(
    map: &mut HashMap<String, String>,
    op: &Operation,
) -> Result<Reply, StoreError> {
    match op {
        Operation::Set { key, value } => {
            map.insert(key.clone(), value.clone());
            Ok(Reply::Ok)
        }
        Operation::Delete { key } => {
            if map.remove(key).is_some() {
                Ok(Reply::Deleted)
            } else {
                Ok(Reply::NotFound)
            }
        }
        Operation::Increment { key, delta } => {
            let next = shift_numeric(map, key, *delta, i64::checked_add)?;
            Ok(Reply::Number(next))
        }
        Operation::Decrement { key, delta } => {
            let next = shift_numeric(map, key, *delta, i64::checked_sub)?;
            Ok(Reply::Number(next))
        }
        Operation::Append { key, suffix } => {
            let entry = map.entry(key.clone()).or_default();
            entry.push_str(suffix);
            Ok(Reply::Value(entry.clone()))
        }
        Operation::Prepend { key, prefix } => {
            let entry = map.entry(key.clone()).or_default();
            entry.insert_str(0, prefix);
            Ok(Reply::Value(entry.clone()))
        }
    }
}

/// An absent key counts from zero; a present value must parse as i64.
fn shift_numeric(
    map: &mut HashMap<String, String>,
    key: &str,
    delta: i64,
    combine: fn(i64, i64) -> Option<i64>,
) -> Result<i64, StoreError> {
    let current = match map.get(key) {
        Some(raw) => raw.parse::<i64>().map_err(|_| StoreError::NotNumeric {
            key: key.to_string(),
        })?,
        None => 0,
    };
    let next = combine(current, delta).ok_or_else(|| StoreError::Overflow {
        key: key.to_string(),
    })?;
    map.insert(key.to_string(), next.to_string());
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn set_overwrites() {
        let mut map = map_with(&[("k", "old")]);
        let reply = apply_to_map(
            &mut map,
            &Operation::Set {
                key: "k".to_string(),
                value: "new".to_string(),
            },
        )
        .unwrap();
        assert_eq!(reply, Reply::Ok);
        assert_eq!(map["k"], "new");
    }

    #[test]
    fn delete_reports_presence() {
        let mut map = map_with(&[("k", "v")]);
        let op = Operation::Delete {
            key: "k".to_string(),
        };
        assert_eq!(apply_to_map(&mut map, &op).unwrap(), Reply::Deleted);
        assert_eq!(apply_to_map(&mut map, &op).unwrap(), Reply::NotFound);
    }

    #[test]
    fn increment_from_absent_starts_at_zero() {
        let mut map = HashMap::new();
        let reply = apply_to_map(
            &mut map,
            &Operation::Increment {
                key: "n".to_string(),
                delta: 5,
            },
        )
        .unwrap();
        assert_eq!(reply, Reply::Number(5));
        assert_eq!(map["n"], "5");
    }

    #[test]
    fn decrement_existing_value() {
        let mut map = map_with(&[("n", "10")]);
        let reply = apply_to_map(
            &mut map,
            &Operation::Decrement {
                key: "n".to_string(),
                delta: 3,
            },
        )
        .unwrap();
        assert_eq!(reply, Reply::Number(7));
    }

    #[test]
    fn increment_non_numeric_fails_without_mutating() {
        let mut map = map_with(&[("k", "hello")]);
        let err = apply_to_map(
            &mut map,
            &Operation::Increment {
                key: "k".to_string(),
                delta: 1,
            },
        )
        .unwrap_err();
        assert_eq!(
            err,
            StoreError::NotNumeric {
                key: "k".to_string()
            }
        );
        assert_eq!(map["k"], "hello");
    }

    #[test]
    fn increment_overflow_is_detected() {
        let mut map = map_with(&[("n", &i64::MAX.to_string())]);
        let err = apply_to_map(
            &mut map,
            &Operation::Increment {
                key: "n".to_string(),
                delta: 1,
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Overflow { .. }));
    }

    #[test]
    fn append_and_prepend_create_when_absent() {
        let mut map = HashMap::new();
        apply_to_map(
            &mut map,
            &Operation::Append {
                key: "s".to_string(),
                suffix: "world".to_string(),
            },
        )
        .unwrap();
        let reply = apply_to_map(
            &mut map,
            &Operation::Prepend {
                key: "s".to_string(),
                prefix: "hello ".to_string(),
            },
        )
        .unwrap();
        assert_eq!(reply, Reply::Value("hello world".to_string()));
    }
}
