use crate::consensus::{current_difficulty, validate_block, validate_chain};
use crate::error::ChainError;
use crate::mine::{mine_block_parallel, BlockTemplate};
use crate::{genesis_block, unix_now, Block};
use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Trait the storage backends should implement for the chain to operate.
/// This lives in `ledger-core` to avoid a circular dependency.
///
/// Implementations only store; they never validate. All mutation goes
/// through [`Chain`], which serializes it.
pub trait ChainStore: Send + Sync {
    fn put_block(&self, block: &Block) -> Result<()>;
    fn get_block(&self, index: u64) -> Result<Option<Block>>;
    fn blocks(&self) -> Result<Vec<Block>>;
    fn tip(&self) -> Result<Option<Block>>;
    fn replace_all(&self, blocks: Vec<Block>) -> Result<()>;
    fn len(&self) -> Result<usize>;
}

/// Chain façade: validation and fork choice on top of a `ChainStore`.
/// Clones share the same store and the same mutation lock.
pub struct Chain<S: ChainStore> {
    store: Arc<S>,
    write_lock: Arc<Mutex<()>>,
    version: Arc<AtomicU64>,
}

impl<S: ChainStore> Clone for Chain<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            write_lock: Arc::clone(&self.write_lock),
            version: Arc::clone(&self.version),
        }
    }
}

impl<S: ChainStore> Chain<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| anyhow!("chain write lock poisoned"))
    }

    /// Ensure the genesis block exists. Idempotent.
    pub fn ensure_genesis(&self) -> Result<()> {
        let _guard = self.lock()?;
        if self.store.get_block(0)?.is_none() {
            self.store.put_block(&genesis_block())?;
        }
        Ok(())
    }

    /// Bumped on every append or replace.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn current_chain(&self) -> Result<Vec<Block>, ChainError> {
        Ok(self.store.blocks()?)
    }

    pub fn latest_block(&self) -> Result<Block, ChainError> {
        Ok(self
            .store
            .tip()?
            .ok_or_else(|| anyhow!("chain store holds no blocks"))?)
    }

    pub fn len(&self) -> Result<usize, ChainError> {
        Ok(self.store.len()?)
    }

    pub fn difficulty(&self) -> Result<u32, ChainError> {
        Ok(current_difficulty(&self.store.blocks()?))
    }

    /// Validates `block` against the current head and appends it.
    pub fn try_append(&self, block: Block) -> Result<(), ChainError> {
        let _guard = self.lock()?;
        let head = self.latest_block()?;
        validate_block(&block, &head)?;
        self.store.put_block(&block)?;
        self.version.fetch_add(1, Ordering::AcqRel);
        info!("appended block {} ({})", block.index, block.hash);
        Ok(())
    }

    pub fn append_if_valid(&self, block: Block) -> bool {
        let index = block.index;
        match self.try_append(block) {
            Ok(()) => true,
            Err(e) => {
                warn!("refused block {}: {}", index, e);
                false
            }
        }
    }

    /// Longest fully valid chain wins; ties keep the current chain.
    pub fn try_replace(&self, candidate: Vec<Block>) -> Result<(), ChainError> {
        validate_chain(&candidate)?;
        let _guard = self.lock()?;
        let current = self.store.len()?;
        if candidate.len() <= current {
            return Err(ChainError::NotLonger {
                candidate: candidate.len(),
                current,
            });
        }
        let length = candidate.len();
        self.store.replace_all(candidate)?;
        self.version.fetch_add(1, Ordering::AcqRel);
        info!("replaced chain of length {} with received chain of length {}", current, length);
        Ok(())
    }

    pub fn replace_if_better(&self, candidate: Vec<Block>) -> bool {
        match self.try_replace(candidate) {
            Ok(()) => true,
            Err(e) => {
                warn!("received chain not adopted: {}", e);
                false
            }
        }
    }

    /// Mines a block carrying `data` on top of the current head and appends it.
    /// The search is abandoned as soon as the head moves.
    pub fn mine_next(&self, data: &str) -> Result<Block, ChainError> {
        let (template, start_version) = {
            let _guard = self.lock()?;
            let blocks = self.store.blocks()?;
            let head = blocks
                .last()
                .ok_or_else(|| anyhow!("chain store holds no blocks"))?;
            let template = BlockTemplate {
                index: head.index + 1,
                previous_hash: head.hash.clone(),
                timestamp: unix_now(),
                data: data.to_string(),
                difficulty: current_difficulty(&blocks),
            };
            (template, self.version())
        };

        let block = mine_block_parallel(template, || self.version() != start_version)
            .ok_or(ChainError::MiningAborted)?;

        let _guard = self.lock()?;
        if self.version() != start_version {
            return Err(ChainError::StaleHead);
        }
        let head = self.latest_block()?;
        validate_block(&block, &head)?;
        self.store.put_block(&block)?;
        self.version.fetch_add(1, Ordering::AcqRel);
        info!("appended mined block {} ({})", block.index, block.hash);
        Ok(block)
    }
}
