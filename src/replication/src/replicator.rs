use std::sync::Arc;

use log::info;
use storage::Store;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::applier::Applier;
use crate::config::ReplicationConfig;
use crate::connection::ConnectionManager;
use crate::publisher::Publisher;

/// Wires the replication engine to a store and runs it.
///
/// Owns the bus connection and the publisher/applier tasks. One
/// replicator per node process; multiple independent instances can
/// coexist in one test process because nothing here is global.
pub struct Replicator {
    connection: Arc<ConnectionManager>,
    store: Store,
    tasks: Vec<JoinHandle<()>>,
}

impl Replicator {
    /// Connect to the bus, install the commit hook, and start the
    /// publisher and applier tasks.
    pub fn start(cfg: &ReplicationConfig, store: Store) -> Self {
        let (connection, inbound_rx) = ConnectionManager::connect(cfg);
        let connection = Arc::new(connection);

        let (commit_tx, commit_rx) = mpsc::unbounded_channel();
        store.set_commit_hook(commit_tx);

        let publisher = Publisher::new(connection.clone(), cfg);
        let applier = Applier::new(store.clone(), cfg.client_id.clone());

        let tasks = vec![
            tokio::spawn(publisher.run(commit_rx)),
            tokio::spawn(applier.run(inbound_rx)),
        ];

        info!(
            "replication active: node {} publishing to {} ({})",
            cfg.client_id,
            cfg.publish_topic(),
            cfg.wire_format
        );

        Replicator {
            connection,
            store,
            tasks,
        }
    }

    /// Stop replicating and release the bus connection.
    ///
    /// Clearing the commit hook first stops new events from queueing;
    /// the disconnect stops the supervisor, which closes the inbound
    /// channel and lets the applier drain out. In-flight publishes are
    /// abandoned.
    pub async fn shutdown(self) {
        self.store.clear_commit_hook();
        self.connection.disconnect().await;
        for task in self.tasks {
            task.abort();
        }
        info!("replication stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::{Operation, RwLockEngine};

    #[tokio::test]
    async fn start_installs_hook_and_shutdown_removes_it() {
        let cfg = crate::config::test_config("node1");
        let store = Store::new(Arc::new(RwLockEngine::new()));

        let replicator = Replicator::start(&cfg, store.clone());
        // Local writes succeed whether or not the broker is reachable.
        store
            .apply_local(Operation::Set {
                key: "k".to_string(),
                value: "v".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(store.get("k").await, Some("v".to_string()));

        replicator.shutdown().await;
        store
            .apply_local(Operation::Set {
                key: "k2".to_string(),
                value: "v2".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(store.get("k2").await, Some("v2".to_string()));
    }
}
