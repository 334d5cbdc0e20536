use crate::error::P2pError;
use crate::peers::{ConnectionId, PeerRegistry};
use crate::sync::Synchronizer;
use crate::transport;
use ledger_core::chain::{Chain, ChainStore};
use ledger_core::{Block, ChainError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Local control surface: what an operator (or the HTTP shim) can ask of a
/// running peer.
pub struct Node<S: ChainStore> {
    sync: Arc<Synchronizer<S>>,
}

impl<S: ChainStore> Clone for Node<S> {
    fn clone(&self) -> Self {
        Self {
            sync: Arc::clone(&self.sync),
        }
    }
}

impl<S: ChainStore + 'static> Node<S> {
    pub fn new(chain: Chain<S>) -> Self {
        let peers = Arc::new(PeerRegistry::new());
        Self {
            sync: Arc::new(Synchronizer::new(chain, peers)),
        }
    }

    pub fn synchronizer(&self) -> &Arc<Synchronizer<S>> {
        &self.sync
    }

    pub fn current_chain(&self) -> Result<Vec<Block>, ChainError> {
        self.sync.chain().current_chain()
    }

    /// Mines on a blocking thread so gossip keeps flowing, appends, then
    /// announces the new head.
    pub async fn mine_new_block(&self, data: String) -> Result<Block, P2pError> {
        let chain = self.sync.chain().clone();
        let block = tokio::task::spawn_blocking(move || chain.mine_next(&data)).await??;
        self.sync.broadcast_latest();
        Ok(block)
    }

    pub fn list_peers(&self) -> Vec<String> {
        self.sync.peers().addresses()
    }

    pub async fn add_peer(&self, url: &str) -> Result<ConnectionId, P2pError> {
        transport::connect_to_peer(url, Arc::clone(&self.sync)).await
    }

    /// Binds the peer listener and serves it in the background.
    pub async fn listen(&self, addr: &str) -> Result<SocketAddr, P2pError> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        tokio::spawn(transport::serve(listener, Arc::clone(&self.sync)));
        Ok(local)
    }
}
