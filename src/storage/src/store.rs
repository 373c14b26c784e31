use std::sync::{Arc, RwLock};
use tokio::sync::{mpsc, Mutex};

use crate::engine::KvEngine;
use crate::types::{Operation, Reply, StoreError};

/// Facade over the storage engine with two distinct write entry points.
///
/// `apply_local` is for client commands: after a mutation commits it
/// notifies the replication layer through the commit hook (when one is
/// installed). `apply_remote` is for operations received from peers and
/// structurally cannot reach the hook, so a node can never re-broadcast
/// what it heard from the bus.
///
/// The hook is fire-and-forget: an unbounded channel send that cannot
/// fail the originating client write, and whose receiver may lag or be
/// gone entirely (replication disabled, or shutting down).
///
/// Local writes are serialized by `commit_order` so events enter the
/// hook channel in exactly the order their mutations committed. Without
/// that, two racing writes to one key could announce in the reverse of
/// their commit order and peers would converge to the stale value.
/// Remote applies never announce and so never take the lock.
#[derive(Clone)]
pub struct Store {
    engine: Arc<dyn KvEngine>,
    commit_tx: Arc<RwLock<Option<mpsc::UnboundedSender<Operation>>>>,
    commit_order: Arc<Mutex<()>>,
}

impl Store {
    pub fn new(engine: Arc<dyn KvEngine>) -> Self {
        Store {
            engine,
            commit_tx: Arc::new(RwLock::new(None)),
            commit_order: Arc::new(Mutex::new(())),
        }
    }

    /// Install the commit hook. Called once when replication starts.
    pub fn set_commit_hook(&self, tx: mpsc::UnboundedSender<Operation>) {
        if let Ok(mut slot) = self.commit_tx.write() {
            *slot = Some(tx);
        }
    }

    /// Remove the commit hook on shutdown so in-flight writes stop
    /// queueing events for a publisher that no longer runs.
    pub fn clear_commit_hook(&self) {
        if let Ok(mut slot) = self.commit_tx.write() {
            *slot = None;
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.engine.get(key).await
    }

    /// Client-write path: apply, then announce the committed operation.
    ///
    /// Only mutations that changed state are announced; a DEL of an
    /// absent key replicates nothing. Apply and announce happen under
    /// one lock so announcement order always matches commit order.
    pub async fn apply_local(&self, op: Operation) -> Result<Reply, StoreError> {
        let _order = self.commit_order.lock().await;
        let reply = self.engine.apply(&op).await?;
        if reply.mutated() {
            if let Ok(slot) = self.commit_tx.read() {
                if let Some(tx) = slot.as_ref() {
                    // Receiver gone means replication stopped; the local
                    // write already succeeded either way.
                    let _ = tx.send(op);
                }
            }
        }
        Ok(reply)
    }

    /// Remote-apply path: never touches the commit hook.
    pub async fn apply_remote(&self, op: &Operation) -> Result<Reply, StoreError> {
        self.engine.apply(op).await
    }
}
