//! Server orchestration: accept loop, connection tracking, auto-save, and
//! the graceful shutdown sequence.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use numera::{FileStore, Registry, SnapshotStore};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::connection::handle_connection;

/// How often the coalesced snapshot is flushed to disk.
const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5);

pub struct Server {
    config: ServerConfig,
    registry: Arc<Registry>,
    store: Arc<FileStore>,
    shutdown: CancellationToken,
    connections: Arc<AtomicU64>,
}

impl Server {
    /// Opens the snapshot and restores every dispenser. Must complete
    /// before the listener starts accepting, so the first `get` on a
    /// restored dispenser sees the saved position.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let store = Arc::new(FileStore::open(&config.data_dir)?);
        let registry = Arc::new(Registry::new(
            Arc::clone(&store) as Arc<dyn SnapshotStore>
        ));
        let restored = registry.load();
        tracing::info!(restored, "snapshot loaded");

        Ok(Self {
            config,
            registry,
            store,
            shutdown: CancellationToken::new(),
            connections: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Token that stops the accept loop and every connection when
    /// cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serves until the shutdown token fires, then drains and saves.
    ///
    /// Shutdown order matters: stop accepting, let in-flight connections
    /// finish (bounded), run every dispenser's graceful save, flush the
    /// snapshot. The auto-save task dies with the token; the final flush
    /// belongs to the registry.
    pub async fn run(self, listener: TcpListener) -> anyhow::Result<()> {
        let autosave = spawn_autosave(Arc::clone(&self.store), self.shutdown.clone());

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let registry = Arc::clone(&self.registry);
                            let token = self.shutdown.clone();
                            let connections = Arc::clone(&self.connections);
                            let read_timeout = self.config.read_timeout;
                            connections.fetch_add(1, Ordering::Relaxed);
                            tokio::spawn(async move {
                                handle_connection(stream, peer, registry, token, read_timeout)
                                    .await;
                                connections.fetch_sub(1, Ordering::Relaxed);
                            });
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to accept connection");
                        }
                    }
                }
            }
        }

        tracing::info!(
            active = self.connections.load(Ordering::Relaxed),
            "draining connections"
        );
        let drained = timeout(self.config.shutdown_timeout, async {
            while self.connections.load(Ordering::Relaxed) > 0 {
                sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                active = self.connections.load(Ordering::Relaxed),
                "drain timed out"
            );
        }

        self.registry.shutdown();
        autosave.abort();
        tracing::info!("server stopped");
        Ok(())
    }
}

fn spawn_autosave(store: Arc<FileStore>, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(AUTOSAVE_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = store.flush() {
                        tracing::warn!(error = %err, "snapshot auto-save failed");
                    }
                }
            }
        }
    })
}
