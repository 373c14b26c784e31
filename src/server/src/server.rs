use log::info;
use storage::{Reply, Store};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::command::{Command, Response};
use crate::error::ServerError;

/// TCP command listener.
///
/// Accepts one connection per client and spawns a handler task for
/// each; handlers run until the client disconnects or the shutdown
/// channel fires. All writes go through `Store::apply_local`, so the
/// replication layer (when running) hears about every committed
/// mutation without the server knowing it exists.
pub struct Server {
    store: Store,
    host: String,
    port: u16,
}

impl Server {
    pub fn new(store: Store, host: String, port: u16) -> Self {
        Server { store, host, port }
    }

    pub async fn run(&self, shutdown_tx: broadcast::Sender<()>) -> Result<(), ServerError> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr).await?;

        info!("ripple is listening on {} (TCP)", addr);

        loop {
            let mut shutdown_rx = shutdown_tx.subscribe();

            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let store = self.store.clone();
                            let mut client_shutdown_rx = shutdown_tx.subscribe();

                            info!("new connection from {}", peer_addr);

                            tokio::spawn(async move {
                                let result = handle_client(stream, store, &mut client_shutdown_rx).await;

                                if let Err(e) = result {
                                    info!("connection closed from {}: {}", peer_addr, e);
                                } else {
                                    info!("connection closed from {}", peer_addr);
                                }
                            });
                        }
                        Err(e) => {
                            info!("failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received, stopping server");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_client<S>(
    stream: S,
    store: Store,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        tokio::select! {
            result = reader.read_line(&mut line) => {
                if result? == 0 {
                    return Ok(());
                }
                let response = execute(&store, line.trim_end_matches(['\r', '\n'])).await;
                write_half
                    .write_all(format!("{}\r\n", response).as_bytes())
                    .await?;
            }
            _ = shutdown_rx.recv() => {
                return Ok(());
            }
        }
    }
}

/// Run one command against the store and shape the wire response.
async fn execute(store: &Store, line: &str) -> Response {
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(e) => return Response::Error(e.to_string()),
    };

    let op = match command {
        Command::Get { key } => {
            return match store.get(&key).await {
                Some(value) => Response::Value(value),
                None => Response::NotFound,
            };
        }
        // Every other command is a mutation.
        other => match other.into_operation() {
            Some(op) => op,
            None => return Response::Error("unsupported command".to_string()),
        },
    };
    match store.apply_local(op).await {
        Ok(Reply::Ok) => Response::Ok,
        Ok(Reply::Deleted) => Response::Deleted,
        Ok(Reply::NotFound) => Response::NotFound,
        Ok(Reply::Number(n)) => Response::Value(n.to_string()),
        Ok(Reply::Value(v)) => Response::Value(v),
        Err(e) => Response::Error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use storage::RwLockEngine;
    use tokio::io::AsyncReadExt;

    fn store() -> Store {
        Store::new(Arc::new(RwLockEngine::new()))
    }

    async fn roundtrip(store: &Store, commands: &str) -> Vec<String> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut shutdown_rx = shutdown_tx.subscribe();
        let store = store.clone();

        let handler = tokio::spawn(async move {
            let _ = handle_client(server, store, &mut shutdown_rx).await;
        });

        let (mut read, mut write) = tokio::io::split(client);
        write.write_all(commands.as_bytes()).await.unwrap();
        write.shutdown().await.unwrap();
        drop(write);

        let mut output = String::new();
        read.read_to_string(&mut output).await.unwrap();
        handler.await.unwrap();

        output
            .split("\r\n")
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    #[tokio::test]
    async fn set_get_del_flow() {
        let store = store();
        let responses = roundtrip(
            &store,
            "SET k hello world\r\nGET k\r\nDEL k\r\nGET k\r\nDEL k\r\n",
        )
        .await;
        assert_eq!(
            responses,
            vec!["OK", "VALUE hello world", "DELETED", "NOT_FOUND", "NOT_FOUND"]
        );
    }

    #[tokio::test]
    async fn numeric_and_string_operations() {
        let store = store();
        let responses = roundtrip(
            &store,
            "SET n 10\r\nINC n\r\nDEC n 4\r\nAPPEND s world\r\nPREPEND s hello \r\nGET s\r\n",
        )
        .await;
        assert_eq!(
            responses,
            vec![
                "OK",
                "VALUE 11",
                "VALUE 7",
                "VALUE world",
                "VALUE hello world",
                "VALUE hello world"
            ]
        );
    }

    #[tokio::test]
    async fn empty_value_roundtrip() {
        let store = store();
        let responses = roundtrip(&store, "SET k \"\"\r\nGET k\r\n").await;
        assert_eq!(responses, vec!["OK", "VALUE \"\""]);
    }

    #[tokio::test]
    async fn errors_do_not_kill_the_connection() {
        let store = store();
        let responses = roundtrip(
            &store,
            "BOGUS\r\nGET\r\nSET k v\r\nINC k\r\nGET k\r\n",
        )
        .await;
        assert_eq!(responses.len(), 5);
        assert!(responses[0].starts_with("ERROR"));
        assert!(responses[1].starts_with("ERROR"));
        assert_eq!(responses[2], "OK");
        assert!(responses[3].starts_with("ERROR")); // INC on non-numeric
        assert_eq!(responses[4], "VALUE v");
    }

    #[tokio::test]
    async fn large_values_survive_line_parsing() {
        let store = store();
        let big = "x".repeat(16 * 1024);
        let responses =
            roundtrip(&store, &format!("SET big {}\r\nGET big\r\n", big)).await;
        assert_eq!(responses[0], "OK");
        assert_eq!(responses[1], format!("VALUE {}", big));
    }

    #[tokio::test]
    async fn mutations_reach_the_commit_hook_but_reads_do_not() {
        let store = store();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        store.set_commit_hook(tx);

        roundtrip(&store, "SET k v\r\nGET k\r\nINC n\r\n").await;

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.name(), "SET");
        assert_eq!(second.name(), "INC");
        assert!(rx.try_recv().is_err());
    }
}
