use crate::{finish_digest, prefix_hasher, pow::count_leading_zero_bits, Block};
use rayon::prelude::*;
use sha2::Sha256;
use tracing::{debug, info};

/// Everything a block needs except the nonce and the resulting hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTemplate {
    pub index: u64,
    pub previous_hash: String,
    pub timestamp: u64,
    pub data: String,
    pub difficulty: u32,
}

impl BlockTemplate {
    fn hasher(&self) -> Sha256 {
        prefix_hasher(self.index, &self.previous_hash, self.timestamp, &self.data)
    }

    fn seal(self, nonce: u64) -> Block {
        let hash = hex::encode(finish_digest(self.hasher(), nonce));
        Block {
            index: self.index,
            hash,
            previous_hash: self.previous_hash,
            timestamp: self.timestamp,
            data: self.data,
            difficulty: self.difficulty,
            nonce,
        }
    }
}

/// Tries nonces 0, 1, 2, ... until the hash has at least `difficulty` leading
/// zero bits. Returns `None` once `should_abort` reports true.
pub fn mine_block<F>(template: BlockTemplate, should_abort: F) -> Option<Block>
where
    F: Fn() -> bool,
{
    let base = template.hasher();
    let mut nonce = 0u64;
    loop {
        if should_abort() {
            debug!("mining of block {} aborted at nonce {}", template.index, nonce);
            return None;
        }
        let hash = finish_digest(base.clone(), nonce);
        if count_leading_zero_bits(&hash) >= template.difficulty {
            break;
        }
        nonce = nonce.wrapping_add(1);
    }

    let block = template.seal(nonce);
    info!(
        "Mined block {} with nonce {} and hash {}",
        block.index, block.nonce, block.hash
    );
    Some(block)
}

/// Same search spread over the rayon pool. `find_first` keeps the result
/// identical to the sequential search: the lowest qualifying nonce wins.
pub fn mine_block_parallel<F>(template: BlockTemplate, should_abort: F) -> Option<Block>
where
    F: Fn() -> bool + Sync,
{
    let base = template.hasher();
    let target = template.difficulty;

    let found = (0u64..u64::MAX).into_par_iter().find_first(|nonce| {
        if should_abort() {
            return true;
        }
        let hash = finish_digest(base.clone(), *nonce);
        count_leading_zero_bits(&hash) >= target
    })?;

    if should_abort() {
        debug!("parallel mining of block {} aborted", template.index);
        return None;
    }

    let block = template.seal(found);
    info!(
        "Mined block {} with nonce {} and hash {}",
        block.index, block.nonce, block.hash
    );
    Some(block)
}
