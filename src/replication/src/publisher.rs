use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use storage::Operation;
use tokio::sync::mpsc;

use crate::codec::{encode, WireFormat};
use crate::config::ReplicationConfig;
use crate::connection::ConnectionManager;
use crate::event::ReplicationEvent;

/// Turns locally committed mutations into published events.
///
/// Operations arrive on the store's commit channel, already applied
/// locally; nothing that happens here can fail the originating client
/// write. Each event gets the next per-origin sequence number, is
/// encoded in the configured wire format, and is published to this
/// node's events subtopic with bounded retries. Publication is
/// best-effort at-least-once: under persistent transport failure the
/// event is dropped with a warning.
pub struct Publisher {
    connection: Arc<ConnectionManager>,
    topic: String,
    origin: String,
    format: WireFormat,
    sequence: AtomicU64,
    publish_timeout: Duration,
    publish_retries: u32,
}

impl Publisher {
    pub fn new(connection: Arc<ConnectionManager>, cfg: &ReplicationConfig) -> Self {
        Publisher {
            connection,
            topic: cfg.publish_topic(),
            origin: cfg.client_id.clone(),
            format: cfg.wire_format,
            sequence: AtomicU64::new(0),
            publish_timeout: Duration::from_millis(cfg.publish_timeout_ms),
            publish_retries: cfg.publish_retries.max(1),
        }
    }

    /// Stamp an operation with origin, sequence, and timestamp.
    fn next_event(&self, operation: Operation) -> ReplicationEvent {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        ReplicationEvent::new(self.origin.clone(), sequence, operation)
    }

    /// Drain the commit channel until the store drops its sender.
    pub async fn run(self, mut commits: mpsc::UnboundedReceiver<Operation>) {
        while let Some(operation) = commits.recv().await {
            let event = self.next_event(operation);
            let payload = match encode(&event, self.format) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("dropping unencodable event seq={}: {}", event.sequence, e);
                    continue;
                }
            };
            self.publish_with_retry(&event, payload).await;
        }
        debug!("commit channel closed, publisher stopped");
    }

    async fn publish_with_retry(&self, event: &ReplicationEvent, payload: Vec<u8>) {
        let mut delay = Duration::from_millis(250);
        for attempt in 1..=self.publish_retries {
            let send = self.connection.publish(&self.topic, payload.clone());
            match tokio::time::timeout(self.publish_timeout, send).await {
                Ok(Ok(())) => {
                    debug!(
                        "published {} seq={} ({} bytes, {})",
                        event.operation.name(),
                        event.sequence,
                        payload.len(),
                        self.format
                    );
                    return;
                }
                Ok(Err(e)) => {
                    warn!(
                        "publish attempt {}/{} failed for seq={}: {}",
                        attempt, self.publish_retries, event.sequence, e
                    );
                }
                Err(_) => {
                    warn!(
                        "publish attempt {}/{} timed out for seq={}",
                        attempt, self.publish_retries, event.sequence
                    );
                }
            }
            if attempt < self.publish_retries {
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, self.publish_timeout);
            }
        }
        warn!(
            "giving up on event seq={} after {} attempts",
            event.sequence, self.publish_retries
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::connection::ConnectionManager;

    fn publisher(client_id: &str) -> Publisher {
        let cfg = test_config(client_id);
        let (connection, _inbound) = ConnectionManager::connect(&cfg);
        Publisher::new(Arc::new(connection), &cfg)
    }

    #[tokio::test]
    async fn sequence_is_monotonic_from_one() {
        let publisher = publisher("node1");
        let op = Operation::Set {
            key: "k".to_string(),
            value: "v".to_string(),
        };
        let first = publisher.next_event(op.clone());
        let second = publisher.next_event(op.clone());
        let third = publisher.next_event(op);
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(third.sequence, 3);
    }

    #[tokio::test]
    async fn events_carry_the_configured_origin_and_topic() {
        let publisher = publisher("node42");
        let event = publisher.next_event(Operation::Delete {
            key: "k".to_string(),
        });
        assert_eq!(event.origin, "node42");
        assert_eq!(publisher.topic, "ripple_test/events/node42");
    }
}
