use crate::protocol::Message;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info};

/// Identity of one open connection. Two connections to the same remote get
/// distinct ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Messages a connection may have waiting for its writer. Anything beyond
/// this is dropped for that peer.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

#[derive(Clone)]
struct PeerHandle {
    addr: String,
    outbound: Sender<Message>,
}

/// Non-blocking enqueue. A full queue drops `message`; a closed one reports
/// the peer gone.
fn offer(id: ConnectionId, outbound: &Sender<Message>, message: Message) -> bool {
    match outbound.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(message)) => {
            debug!(
                "outbound queue for peer {} is full, dropping {:?}",
                id,
                message.message_type()
            );
            false
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Open connections keyed by id. Entries are added when a connection is
/// established and removed when it closes or errors.
#[derive(Default)]
pub struct PeerRegistry {
    next_id: AtomicU64,
    peers: RwLock<HashMap<ConnectionId, PeerHandle>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned map still holds valid senders, so keep using it.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectionId, PeerHandle>> {
        self.peers.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectionId, PeerHandle>> {
        self.peers.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a connection and hands back the queue its writer drains.
    pub fn register(&self, addr: impl Into<String>) -> (ConnectionId, Receiver<Message>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbound, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let addr = addr.into();
        info!("peer {} connected from {}", id, addr);
        self.write().insert(id, PeerHandle { addr, outbound });
        (id, rx)
    }

    pub fn remove(&self, id: ConnectionId) -> bool {
        match self.write().remove(&id) {
            Some(peer) => {
                info!("peer {} ({}) disconnected", id, peer.addr);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Remote `host:port` of every connection, duplicates included.
    pub fn addresses(&self) -> Vec<String> {
        self.read().values().map(|p| p.addr.clone()).collect()
    }

    /// Queues `message` for one connection. False if it is gone or its queue
    /// is full.
    pub fn send(&self, id: ConnectionId, message: Message) -> bool {
        let Some(outbound) = self.read().get(&id).map(|p| p.outbound.clone()) else {
            debug!("dropping {:?} for vanished peer {}", message.message_type(), id);
            return false;
        };
        offer(id, &outbound, message)
    }

    /// Queues `message` for every connection, skipping any that closed in the
    /// meantime or are not draining. Returns how many accepted it.
    pub fn broadcast(&self, message: &Message) -> usize {
        let targets: Vec<(ConnectionId, Sender<Message>)> = self
            .read()
            .iter()
            .map(|(id, p)| (*id, p.outbound.clone()))
            .collect();

        let mut delivered = 0;
        for (id, outbound) in targets {
            if offer(id, &outbound, message.clone()) {
                delivered += 1;
            } else {
                debug!("broadcast skipped peer {}", id);
            }
        }
        delivered
    }
}
