//! Per-connection operation queue
//!
//! This module implements the "single owner" pattern for a transport.
//!
//! # Architecture
//!
//! One worker task owns the `Box<dyn Transport>`. Everything else talks to it
//! through a cloneable [`QueueController`], which pushes commands into an
//! unbounded mpsc channel. The worker pops one command, runs it against the
//! transport to completion, replies on the command's oneshot, and only then
//! pops the next one.
//!
//! Consequences:
//! - operations on one connection never overlap and settle in enqueue order
//! - a failed operation is just a reply; the worker keeps going
//! - different connections have different workers and run independently
//!
//! # Usage
//!
//! ```ignore
//! let queue = spawn_queue_worker(transport, "conn-1".to_string());
//!
//! // Enqueued now, in this order, whatever order they are awaited in
//! let listing = queue.list("/pub");
//! let upload = queue.write("/pub/a.txt", b"hello".to_vec());
//!
//! upload.await?;
//! let entries = listing.await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::error::TransferError;
use super::transport::Transport;
use super::types::RemoteEntry;

type Reply<T> = oneshot::Sender<Result<T, TransferError>>;

/// Commands sent to the queue worker
pub enum QueueCommand {
    List {
        path: String,
        reply_tx: Reply<Vec<RemoteEntry>>,
    },

    Read {
        path: String,
        reply_tx: Reply<Vec<u8>>,
    },

    Write {
        path: String,
        data: Vec<u8>,
        reply_tx: Reply<()>,
    },

    Delete {
        path: String,
        reply_tx: Reply<()>,
    },

    Mkdir {
        path: String,
        reply_tx: Reply<()>,
    },

    Rename {
        from: String,
        to: String,
        reply_tx: Reply<()>,
    },

    /// Close the transport and stop the worker
    Close { reply_tx: Reply<()> },
}

/// Result of an enqueued operation.
///
/// The operation is already scheduled when this is returned; awaiting it only
/// collects the outcome. Dropping it does not cancel the operation.
#[must_use = "the operation runs regardless, but its result is lost if not awaited"]
pub struct PendingOp<T> {
    reply_rx: oneshot::Receiver<Result<T, TransferError>>,
    connection_id: String,
}

impl<T> Future for PendingOp<T> {
    type Output = Result<T, TransferError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.reply_rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Worker went away without answering
            Poll::Ready(Err(_)) => Poll::Ready(Err(TransferError::NotConnected(
                this.connection_id.clone(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Handle for scheduling operations on one connection.
///
/// Cloning is cheap (a channel sender and a flag). The transport closes once
/// [`QueueController::close`] runs or the last clone is dropped.
#[derive(Clone)]
pub struct QueueController {
    cmd_tx: mpsc::UnboundedSender<QueueCommand>,
    /// Transport's own `is_open`, refreshed after every operation
    open: Arc<AtomicBool>,
    connection_id: String,
}

impl QueueController {
    fn enqueue<T>(&self, build: impl FnOnce(Reply<T>) -> QueueCommand) -> PendingOp<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.cmd_tx.send(build(reply_tx)).is_err() {
            // The rejected command (and its reply sender) is dropped here,
            // so the PendingOp resolves to NotConnected.
            debug!(
                "Enqueue on stopped worker for connection {}",
                self.connection_id
            );
        }
        PendingOp {
            reply_rx,
            connection_id: self.connection_id.clone(),
        }
    }

    pub fn list(&self, path: &str) -> PendingOp<Vec<RemoteEntry>> {
        let path = path.to_string();
        self.enqueue(|reply_tx| QueueCommand::List { path, reply_tx })
    }

    pub fn read(&self, path: &str) -> PendingOp<Vec<u8>> {
        let path = path.to_string();
        self.enqueue(|reply_tx| QueueCommand::Read { path, reply_tx })
    }

    pub fn write(&self, path: &str, data: Vec<u8>) -> PendingOp<()> {
        let path = path.to_string();
        self.enqueue(|reply_tx| QueueCommand::Write {
            path,
            data,
            reply_tx,
        })
    }

    pub fn delete(&self, path: &str) -> PendingOp<()> {
        let path = path.to_string();
        self.enqueue(|reply_tx| QueueCommand::Delete { path, reply_tx })
    }

    pub fn mkdir(&self, path: &str) -> PendingOp<()> {
        let path = path.to_string();
        self.enqueue(|reply_tx| QueueCommand::Mkdir { path, reply_tx })
    }

    pub fn rename(&self, from: &str, to: &str) -> PendingOp<()> {
        let (from, to) = (from.to_string(), to.to_string());
        self.enqueue(|reply_tx| QueueCommand::Rename { from, to, reply_tx })
    }

    /// Close the transport after everything already enqueued has settled
    pub fn close(&self) -> PendingOp<()> {
        self.enqueue(|reply_tx| QueueCommand::Close { reply_tx })
    }

    /// Worker running and transport open
    pub fn is_open(&self) -> bool {
        !self.cmd_tx.is_closed() && self.open.load(Ordering::SeqCst)
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }
}

/// Spawn the queue worker for one connection.
///
/// Takes ownership of the transport and returns the controller used to
/// schedule operations on it.
pub fn spawn_queue_worker(transport: Box<dyn Transport>, connection_id: String) -> QueueController {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<QueueCommand>();
    let open = Arc::new(AtomicBool::new(transport.is_open()));
    let open_flag = open.clone();
    let worker_id = connection_id.clone();

    tokio::spawn(async move {
        let mut transport = transport;
        let connection_id = worker_id;
        let mut closed = false;

        debug!("Queue worker started for connection {}", connection_id);

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                QueueCommand::List { path, reply_tx } => {
                    let result = transport.list(&path).await;
                    send_reply(reply_tx, result, "list", &connection_id);
                }

                QueueCommand::Read { path, reply_tx } => {
                    let result = transport.read(&path).await;
                    send_reply(reply_tx, result, "read", &connection_id);
                }

                QueueCommand::Write {
                    path,
                    data,
                    reply_tx,
                } => {
                    let result = transport.write(&path, &data).await;
                    send_reply(reply_tx, result, "write", &connection_id);
                }

                QueueCommand::Delete { path, reply_tx } => {
                    let result = transport.delete(&path).await;
                    send_reply(reply_tx, result, "delete", &connection_id);
                }

                QueueCommand::Mkdir { path, reply_tx } => {
                    let result = transport.mkdir(&path).await;
                    send_reply(reply_tx, result, "mkdir", &connection_id);
                }

                QueueCommand::Rename { from, to, reply_tx } => {
                    let result = transport.rename(&from, &to).await;
                    send_reply(reply_tx, result, "rename", &connection_id);
                }

                QueueCommand::Close { reply_tx } => {
                    info!("Close requested for connection {}", connection_id);
                    let result = transport.close().await;
                    if let Err(e) = &result {
                        warn!("Closing connection {} failed: {}", connection_id, e);
                    }
                    closed = true;
                    open_flag.store(false, Ordering::SeqCst);
                    let _ = reply_tx.send(result);
                    break;
                }
            }

            open_flag.store(transport.is_open(), Ordering::SeqCst);
        }

        // === Cleanup phase ===
        open_flag.store(false, Ordering::SeqCst);
        drain_pending_commands(&mut cmd_rx, &connection_id);

        if !closed {
            info!("All controllers dropped for connection {}", connection_id);
            if let Err(e) = transport.close().await {
                warn!("Closing connection {} failed: {}", connection_id, e);
            }
        }

        debug!("Queue worker terminated for connection {}", connection_id);
    });

    QueueController {
        cmd_tx,
        open,
        connection_id,
    }
}

fn send_reply<T>(
    reply_tx: Reply<T>,
    result: Result<T, TransferError>,
    op: &str,
    connection_id: &str,
) {
    if reply_tx.send(result).is_err() {
        // Operation already ran; only the result is lost
        debug!(
            "Caller dropped before receiving {} result on connection {}",
            op, connection_id
        );
    }
}

fn not_connected<T>(connection_id: &str) -> Result<T, TransferError> {
    Err(TransferError::NotConnected(connection_id.to_string()))
}

/// Answer every command still queued behind a close with NotConnected
fn drain_pending_commands(cmd_rx: &mut mpsc::UnboundedReceiver<QueueCommand>, connection_id: &str) {
    // Close receiver first, prevent new messages
    cmd_rx.close();

    let mut drained = 0usize;
    while let Ok(cmd) = cmd_rx.try_recv() {
        drained += 1;
        match cmd {
            QueueCommand::List { reply_tx, .. } => {
                let _ = reply_tx.send(not_connected(connection_id));
            }
            QueueCommand::Read { reply_tx, .. } => {
                let _ = reply_tx.send(not_connected(connection_id));
            }
            QueueCommand::Write { reply_tx, .. }
            | QueueCommand::Delete { reply_tx, .. }
            | QueueCommand::Mkdir { reply_tx, .. }
            | QueueCommand::Rename { reply_tx, .. }
            | QueueCommand::Close { reply_tx } => {
                let _ = reply_tx.send(not_connected(connection_id));
            }
        }
    }

    if drained > 0 {
        debug!(
            "Rejected {} queued commands on closed connection {}",
            drained, connection_id
        );
    }
}
