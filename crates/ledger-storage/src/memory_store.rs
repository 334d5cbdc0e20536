use anyhow::{anyhow, bail, Result};
use ledger_core::{chain::ChainStore, Block};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// Process-resident block sequence. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
  blocks: RwLock<Vec<Block>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    info!("memory store opened");
    Self::default()
  }

  pub fn with_blocks(blocks: Vec<Block>) -> Self {
    Self {
      blocks: RwLock::new(blocks),
    }
  }

  pub fn clear(&self) -> Result<()> {
    self.write()?.clear();
    Ok(())
  }

  fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Block>>> {
    self.blocks.read().map_err(|_| anyhow!("block list lock poisoned"))
  }

  fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Block>>> {
    self.blocks.write().map_err(|_| anyhow!("block list lock poisoned"))
  }
}

impl ChainStore for MemoryStore {
  /// Stores `block` at its own index. Writing below the tip drops everything
  /// after it; writing past the tip is refused.
  fn put_block(&self, block: &Block) -> Result<()> {
    let mut blocks = self.write()?;
    let index = block.index as usize;
    if index > blocks.len() {
      bail!("block {} leaves a gap after tip {}", index, blocks.len());
    }
    blocks.truncate(index);
    blocks.push(block.clone());
    debug!("stored block {}", index);
    Ok(())
  }

  fn get_block(&self, index: u64) -> Result<Option<Block>> {
    Ok(self.read()?.get(index as usize).cloned())
  }

  fn blocks(&self) -> Result<Vec<Block>> {
    Ok(self.read()?.clone())
  }

  fn tip(&self) -> Result<Option<Block>> {
    Ok(self.read()?.last().cloned())
  }

  fn replace_all(&self, blocks: Vec<Block>) -> Result<()> {
    *self.write()? = blocks;
    Ok(())
  }

  fn len(&self) -> Result<usize> {
    Ok(self.read()?.len())
  }
}
