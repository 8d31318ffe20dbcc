//! Channel-serialized registry of live WebSocket connections.
//!
//! One task owns the connection set exclusively. Registration,
//! unregistration, and broadcast all arrive as commands on a single mpsc
//! channel, so no registry mutation can ever race an in-flight broadcast
//! pass. Sends are hand-offs to per-connection unbounded queues; a slow
//! socket never stalls the pass for the others.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use odk_schemas::OrderEvent;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

enum RegistryCmd {
    Register {
        id: Uuid,
        peer: SocketAddr,
        tx: mpsc::UnboundedSender<Message>,
    },
    Unregister {
        id: Uuid,
    },
    Broadcast {
        event: OrderEvent,
    },
}

struct Connection {
    id: Uuid,
    /// Peer address, used only for diagnostic logging.
    peer: SocketAddr,
    tx: mpsc::UnboundedSender<Message>,
}

/// Cloneable handle to the registry task.
#[derive(Clone)]
pub struct Registry {
    cmd_tx: mpsc::UnboundedSender<RegistryCmd>,
    population: Arc<AtomicUsize>,
}

impl Registry {
    /// Spawn the owner task and return a handle to it.
    pub fn spawn() -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let population = Arc::new(AtomicUsize::new(0));
        tokio::spawn(run(cmd_rx, Arc::clone(&population)));
        Self { cmd_tx, population }
    }

    /// Add a connection. Called once per connection, from the socket handler
    /// that owns its receive loop.
    pub fn register(&self, id: Uuid, peer: SocketAddr, tx: mpsc::UnboundedSender<Message>) {
        let _ = self.cmd_tx.send(RegistryCmd::Register { id, peer, tx });
    }

    /// Remove a connection. Removing an id already pruned by a failed send
    /// is a no-op.
    pub fn unregister(&self, id: Uuid) {
        let _ = self.cmd_tx.send(RegistryCmd::Unregister { id });
    }

    /// Push `event` to every connection registered at the time the command
    /// is processed, in registration order.
    pub fn broadcast(&self, event: OrderEvent) {
        let _ = self.cmd_tx.send(RegistryCmd::Broadcast { event });
    }

    /// Connections currently registered. Diagnostic only; may lag the task
    /// by whatever is still queued on the command channel.
    pub fn client_count(&self) -> usize {
        self.population.load(Ordering::Relaxed)
    }
}

async fn run(mut cmd_rx: mpsc::UnboundedReceiver<RegistryCmd>, population: Arc<AtomicUsize>) {
    let mut conns: Vec<Connection> = Vec::new();

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            RegistryCmd::Register { id, peer, tx } => {
                conns.push(Connection { id, peer, tx });
                debug!(%id, %peer, clients = conns.len(), "ws client registered");
            }
            RegistryCmd::Unregister { id } => {
                conns.retain(|c| c.id != id);
            }
            RegistryCmd::Broadcast { event } => {
                let payload = match serde_json::to_string(&event) {
                    Ok(p) => p,
                    Err(err) => {
                        error!(?err, "failed to serialize broadcast event");
                        continue;
                    }
                };
                // A failed send means the connection's receive loop is gone;
                // prune it now instead of waiting for its handler to exit.
                conns.retain(|c| match c.tx.send(Message::Text(payload.clone())) {
                    Ok(()) => true,
                    Err(_) => {
                        warn!(id = %c.id, peer = %c.peer, "dropping ws client: send failed");
                        false
                    }
                });
            }
        }
        population.store(conns.len(), Ordering::Relaxed);
    }
}
