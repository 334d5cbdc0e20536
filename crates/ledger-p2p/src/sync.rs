use crate::peers::{ConnectionId, PeerRegistry};
use crate::protocol::Message;
use ledger_core::chain::{Chain, ChainStore};
use ledger_core::consensus::check_structure;
use ledger_core::Block;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What handling one inbound message did to local state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A query was answered.
    Replied,
    /// The frame could not be decoded or the trailing block was malformed.
    Discarded,
    /// The peer is not ahead of us.
    NotAhead,
    /// The received head extended ours and was appended.
    Appended,
    /// The received head extended ours but failed validation.
    AppendRejected,
    /// The peer is ahead on another branch; its full chain was requested.
    QueriedAll,
    /// The received chain replaced ours.
    Replaced,
    /// The received chain was invalid or not longer.
    ReplaceRejected,
}

/// Keeps the local chain converging with every connected peer. Every
/// mutation goes through `Chain`, which validates and serializes it.
pub struct Synchronizer<S: ChainStore> {
    chain: Chain<S>,
    peers: Arc<PeerRegistry>,
}

impl<S: ChainStore> Synchronizer<S> {
    pub fn new(chain: Chain<S>, peers: Arc<PeerRegistry>) -> Self {
        Self { chain, peers }
    }

    pub fn chain(&self) -> &Chain<S> {
        &self.chain
    }

    pub fn peers(&self) -> &Arc<PeerRegistry> {
        &self.peers
    }

    /// Registers a freshly opened connection and asks it for its head.
    pub fn on_connect(
        &self,
        addr: impl Into<String>,
    ) -> (ConnectionId, tokio::sync::mpsc::Receiver<Message>) {
        let (id, rx) = self.peers.register(addr);
        self.peers.send(id, Message::QueryLatest);
        (id, rx)
    }

    pub fn on_disconnect(&self, id: ConnectionId) {
        self.peers.remove(id);
    }

    fn latest_message(&self) -> Option<Message> {
        match self.chain.latest_block() {
            Ok(head) => Some(Message::ResponseBlockchain(vec![head])),
            Err(e) => {
                warn!("cannot read chain head: {}", e);
                None
            }
        }
    }

    fn chain_message(&self) -> Option<Message> {
        match self.chain.current_chain() {
            Ok(blocks) => Some(Message::ResponseBlockchain(blocks)),
            Err(e) => {
                warn!("cannot read chain: {}", e);
                None
            }
        }
    }

    /// Announces our head to every peer. Fire and forget.
    pub fn broadcast_latest(&self) -> usize {
        match self.latest_message() {
            Some(message) => self.peers.broadcast(&message),
            None => 0,
        }
    }

    /// Entry point for a raw text frame from connection `from`.
    pub fn handle_frame(&self, from: ConnectionId, frame: &str) -> SyncOutcome {
        match Message::decode(frame) {
            Ok(message) => self.handle_message(from, message),
            Err(e) => {
                debug!("discarding frame from {}: {} ({})", from, e, frame);
                SyncOutcome::Discarded
            }
        }
    }

    pub fn handle_message(&self, from: ConnectionId, message: Message) -> SyncOutcome {
        debug!("received {:?} from {}", message.message_type(), from);
        match message {
            Message::QueryLatest => {
                if let Some(reply) = self.latest_message() {
                    self.peers.send(from, reply);
                }
                SyncOutcome::Replied
            }
            Message::QueryAll => {
                if let Some(reply) = self.chain_message() {
                    self.peers.send(from, reply);
                }
                SyncOutcome::Replied
            }
            Message::ResponseBlockchain(blocks) => self.handle_blockchain_response(from, blocks),
        }
    }

    /// Fork reconciliation for a block sequence received from `from`.
    pub fn handle_blockchain_response(&self, from: ConnectionId, blocks: Vec<Block>) -> SyncOutcome {
        let Some(received) = blocks.last() else {
            debug!("received empty chain from {}", from);
            return SyncOutcome::Discarded;
        };
        if let Err(e) = check_structure(received) {
            debug!("discarding chain from {}: {}", from, e);
            return SyncOutcome::Discarded;
        }
        let held = match self.chain.latest_block() {
            Ok(head) => head,
            Err(e) => {
                warn!("cannot read chain head: {}", e);
                return SyncOutcome::Discarded;
            }
        };

        if received.index <= held.index {
            debug!(
                "received chain is not longer than ours (theirs {}, ours {})",
                received.index, held.index
            );
            return SyncOutcome::NotAhead;
        }

        info!(
            "blockchain possibly behind: we have {}, peer {} has {}",
            held.index, from, received.index
        );

        if held.hash == received.previous_hash {
            let received = received.clone();
            if self.chain.append_if_valid(received) {
                self.broadcast_latest();
                SyncOutcome::Appended
            } else {
                SyncOutcome::AppendRejected
            }
        } else if blocks.len() == 1 {
            info!("querying full chain from peer {}", from);
            self.peers.send(from, Message::QueryAll);
            SyncOutcome::QueriedAll
        } else if self.chain.replace_if_better(blocks) {
            self.broadcast_latest();
            SyncOutcome::Replaced
        } else {
            SyncOutcome::ReplaceRejected
        }
    }
}
