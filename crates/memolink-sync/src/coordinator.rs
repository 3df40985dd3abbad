//! The apply loop
//!
//! A [`SyncCoordinator`] owns the [`SyncEngine`] on a single tokio task.
//! Local commands (sent through a [`CoordinatorHandle`]) and deliveries from
//! the peer link are applied one at a time, in arrival order.

use bytes::Bytes;
use memolink_core::{MemoId, MemoRecord, TransportError};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, warn};

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};

/// Commands from the local device
enum Command {
    Record {
        audio: Bytes,
        duration_seconds: f64,
        title: Option<String>,
        reply: oneshot::Sender<SyncResult<MemoRecord>>,
    },
    Delete {
        id: MemoId,
        reply: oneshot::Sender<SyncResult<bool>>,
    },
    Resync {
        reply: oneshot::Sender<SyncResult<usize>>,
    },
    PendingAssemblies {
        reply: oneshot::Sender<usize>,
    },
}

/// Cloneable handle for submitting local commands to the apply loop
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Store a finished recording; see [`SyncEngine::create_local`]
    pub async fn record(
        &self,
        audio: Bytes,
        duration_seconds: f64,
        title: Option<String>,
    ) -> SyncResult<MemoRecord> {
        self.request(|reply| Command::Record {
            audio,
            duration_seconds,
            title,
            reply,
        })
        .await?
    }

    /// Delete a memo; see [`SyncEngine::delete_local`]
    pub async fn delete(&self, id: MemoId) -> SyncResult<bool> {
        self.request(|reply| Command::Delete { id, reply }).await?
    }

    /// Re-announce every stored memo; see [`SyncEngine::resync_all`]
    pub async fn resync_all(&self) -> SyncResult<usize> {
        self.request(|reply| Command::Resync { reply }).await?
    }

    /// Number of inbound memos with only one half received
    pub async fn pending_assemblies(&self) -> SyncResult<usize> {
        self.request(|reply| Command::PendingAssemblies { reply })
            .await
    }

    /// Whether the apply loop is still accepting commands
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> SyncResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SyncError::CoordinatorClosed)?;
        response.await.map_err(|_| SyncError::CoordinatorClosed)
    }
}

/// Background apply loop
pub struct SyncCoordinator {
    engine: SyncEngine,
    commands: mpsc::Receiver<Command>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl SyncCoordinator {
    /// Spawn the apply loop as a background task
    ///
    /// The loop runs until a shutdown signal arrives, or until every handle
    /// is dropped and the link is closed. It stays inside the caller's
    /// current span.
    pub fn spawn(
        engine: SyncEngine,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(engine.config().command_capacity.max(1));
        let coordinator = Self {
            engine,
            commands: rx,
            shutdown_rx,
        };

        let task = tokio::spawn(
            async move {
                coordinator.run().await;
            }
            .in_current_span(),
        );

        (CoordinatorHandle { commands: tx }, task)
    }

    async fn run(mut self) {
        info!(mode = ?self.engine.config().mode, "Sync coordinator started");

        let link = self.engine.link();
        let mut commands_open = true;
        let mut link_open = true;

        while commands_open || link_open {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    info!("Sync coordinator shutting down");
                    break;
                }
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("All coordinator handles dropped");
                        commands_open = false;
                    }
                },
                delivery = link.recv(), if link_open => match delivery {
                    Ok(delivery) => self.engine.handle_delivery(delivery).await,
                    Err(TransportError::Closed) => {
                        warn!("Peer link closed, no further deliveries");
                        link_open = false;
                    }
                    Err(e) => warn!(error = %e, "Failed to receive from peer"),
                },
            }
        }

        info!("Sync coordinator stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        // A dropped reply receiver only means the caller stopped waiting
        match command {
            Command::Record {
                audio,
                duration_seconds,
                title,
                reply,
            } => {
                let result = self
                    .engine
                    .create_local(audio, duration_seconds, title)
                    .await;
                let _ = reply.send(result);
            }
            Command::Delete { id, reply } => {
                let _ = reply.send(self.engine.delete_local(id).await);
            }
            Command::Resync { reply } => {
                let _ = reply.send(self.engine.resync_all().await);
            }
            Command::PendingAssemblies { reply } => {
                let _ = reply.send(self.engine.pending_assemblies());
            }
        }
    }
}
