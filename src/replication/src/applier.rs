use log::{debug, warn};
use storage::Store;
use tokio::sync::mpsc;

use crate::codec::decode;
use crate::connection::InboundMessage;

/// Consumes bus messages and applies foreign events to the local store.
///
/// Three containment rules keep a hostile or broken bus from touching
/// node stability: undecodable payloads are logged and discarded, a
/// node's own events are dropped by origin comparison (the loop
/// prevention rule, and it holds for every event regardless of which
/// subtopic carried it), and apply failures are logged and dropped.
/// Nothing here crashes or blocks the consuming loop.
pub struct Applier {
    store: Store,
    node_id: String,
}

impl Applier {
    pub fn new(store: Store, node_id: String) -> Self {
        Applier { store, node_id }
    }

    /// Process inbound messages until the connection closes the channel.
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>) {
        while let Some(message) = inbound.recv().await {
            self.handle(&message.topic, &message.payload).await;
        }
        debug!("inbound channel closed, applier stopped");
    }

    async fn handle(&self, topic: &str, payload: &[u8]) {
        let event = match decode(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    "discarding undecodable payload on {} ({} bytes): {}",
                    topic,
                    payload.len(),
                    e
                );
                return;
            }
        };

        if event.origin == self.node_id {
            debug!("ignoring own event seq={}", event.sequence);
            return;
        }

        // apply_remote cannot re-trigger publication; see Store.
        match self.store.apply_remote(&event.operation).await {
            Ok(_) => debug!(
                "applied {} from {} seq={}",
                event.operation.name(),
                event.origin,
                event.sequence
            ),
            Err(e) => warn!(
                "dropping {} from {} seq={}: {}",
                event.operation.name(),
                event.origin,
                event.sequence,
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode, WireFormat};
    use crate::event::ReplicationEvent;
    use std::sync::Arc;
    use storage::{Operation, RwLockEngine};

    fn applier(node_id: &str) -> (Applier, Store) {
        let store = Store::new(Arc::new(RwLockEngine::new()));
        (Applier::new(store.clone(), node_id.to_string()), store)
    }

    fn set_event(origin: &str, key: &str, value: &str) -> Vec<u8> {
        let event = ReplicationEvent::new(
            origin.to_string(),
            1,
            Operation::Set {
                key: key.to_string(),
                value: value.to_string(),
            },
        );
        encode(&event, WireFormat::Cbor).unwrap()
    }

    #[tokio::test]
    async fn applies_foreign_events() {
        let (applier, store) = applier("node1");
        applier
            .handle("ripple_test/events/node2", &set_event("node2", "k", "v"))
            .await;
        assert_eq!(store.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn never_applies_own_events() {
        let (applier, store) = applier("node1");
        // Same origin as the applier's identity, even though it arrived
        // over the bus like any other message.
        applier
            .handle("ripple_test/events/node1", &set_event("node1", "k", "v"))
            .await;
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn remote_apply_does_not_republish() {
        let (applier, store) = applier("node1");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        store.set_commit_hook(tx);

        applier
            .handle("ripple_test/events/node2", &set_event("node2", "k", "v"))
            .await;
        assert_eq!(store.get("k").await, Some("v".to_string()));
        // The commit hook saw nothing: no re-broadcast loop.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_payload_leaves_the_node_functional() {
        let (applier, store) = applier("node1");
        applier.handle("ripple_test/events/evil", b"\xff\x00garbage").await;
        applier.handle("ripple_test/events/evil", b"{\"almost\": \"json\"").await;
        // A normal event right after is applied fine.
        applier
            .handle("ripple_test/events/node2", &set_event("node2", "after", "ok"))
            .await;
        assert_eq!(store.get("after").await, Some("ok".to_string()));
    }

    #[tokio::test]
    async fn apply_failure_is_contained() {
        let (applier, store) = applier("node1");
        store
            .apply_remote(&Operation::Set {
                key: "k".to_string(),
                value: "not_a_number".to_string(),
            })
            .await
            .unwrap();

        let event = ReplicationEvent::new(
            "node2".to_string(),
            1,
            Operation::Increment {
                key: "k".to_string(),
                delta: 1,
            },
        );
        let payload = encode(&event, WireFormat::Json).unwrap();
        applier.handle("ripple_test/events/node2", &payload).await;

        // The bad increment was dropped; the stored value is intact and
        // the applier keeps working.
        assert_eq!(store.get("k").await, Some("not_a_number".to_string()));
        applier
            .handle("ripple_test/events/node2", &set_event("node2", "k2", "v2"))
            .await;
        assert_eq!(store.get("k2").await, Some("v2".to_string()));
    }

    #[tokio::test]
    async fn accepts_both_wire_formats() {
        let (applier, store) = applier("node1");
        let event = ReplicationEvent::new(
            "node2".to_string(),
            1,
            Operation::Set {
                key: "j".to_string(),
                value: "json".to_string(),
            },
        );
        applier
            .handle(
                "ripple_test/events/node2",
                &encode(&event, WireFormat::Json).unwrap(),
            )
            .await;
        applier
            .handle("ripple_test/events/node2", &set_event("node2", "c", "cbor"))
            .await;
        assert_eq!(store.get("j").await, Some("json".to_string()));
        assert_eq!(store.get("c").await, Some("cbor".to_string()));
    }
}
