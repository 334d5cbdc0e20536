#![allow(dead_code)]

use ledger_core::chain::Chain;
use ledger_core::mine::{mine_block, BlockTemplate};
use ledger_core::{genesis_block, unix_now, Block};
use ledger_storage::MemoryStore;
use std::sync::Arc;

/// A fresh chain holding only the genesis block.
pub fn create_chain() -> Chain<MemoryStore> {
    let chain = Chain::new(Arc::new(MemoryStore::new()));
    chain.ensure_genesis().expect("Failed to write genesis");
    chain
}

pub fn mine_on(prev: &Block, data: &str, difficulty: u32) -> Block {
    let template = BlockTemplate {
        index: prev.index + 1,
        previous_hash: prev.hash.clone(),
        timestamp: unix_now(),
        data: data.to_string(),
        difficulty,
    };
    mine_block(template, || false).expect("mining is never aborted here")
}

/// Valid chain of `len` blocks starting at genesis, payloads tagged with `tag`.
pub fn build_chain(len: usize, tag: &str) -> Vec<Block> {
    let mut blocks = vec![genesis_block()];
    while blocks.len() < len {
        let next = mine_on(blocks.last().unwrap(), &format!("{tag}-{}", blocks.len()), 0);
        blocks.push(next);
    }
    blocks
}

pub fn create_chain_with(blocks: Vec<Block>) -> Chain<MemoryStore> {
    Chain::new(Arc::new(MemoryStore::with_blocks(blocks)))
}
