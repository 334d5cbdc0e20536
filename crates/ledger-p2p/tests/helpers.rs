#![allow(dead_code)]

use ledger_core::chain::Chain;
use ledger_core::mine::{mine_block, BlockTemplate};
use ledger_core::{genesis_block, unix_now, Block};
use ledger_p2p::{Node, PeerRegistry, Synchronizer};
use ledger_storage::MemoryStore;
use std::sync::Arc;
use std::time::Duration;

pub fn extend(prev: &Block, data: &str) -> Block {
    let template = BlockTemplate {
        index: prev.index + 1,
        previous_hash: prev.hash.clone(),
        timestamp: unix_now(),
        data: data.to_string(),
        difficulty: 0,
    };
    mine_block(template, || false).expect("mining is never aborted here")
}

/// Independent valid chain of `len` blocks whose payloads carry `tag`.
pub fn fork_blocks(len: usize, tag: &str) -> Vec<Block> {
    let mut blocks = vec![genesis_block()];
    while blocks.len() < len {
        let next = extend(blocks.last().unwrap(), &format!("{tag}-{}", blocks.len()));
        blocks.push(next);
    }
    blocks
}

pub fn chain_from(blocks: Vec<Block>) -> Chain<MemoryStore> {
    Chain::new(Arc::new(MemoryStore::with_blocks(blocks)))
}

pub fn synchronizer(chain: Chain<MemoryStore>) -> Synchronizer<MemoryStore> {
    Synchronizer::new(chain, Arc::new(PeerRegistry::new()))
}

pub fn fresh_node() -> Node<MemoryStore> {
    let chain = Chain::new(Arc::new(MemoryStore::new()));
    chain.ensure_genesis().expect("Failed to write genesis");
    Node::new(chain)
}

pub fn node_with(blocks: Vec<Block>) -> Node<MemoryStore> {
    Node::new(chain_from(blocks))
}

/// Polls `cond` until it holds or five seconds pass.
pub async fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}
