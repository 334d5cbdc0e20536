//! Difficulty schedule and the block / chain validation pipeline.

use crate::constants::{
    BLOCK_GENERATION_INTERVAL, DIFFICULTY_ADJUSTMENT_INTERVAL, HASH_HEX_SIZE, TIMESTAMP_TOLERANCE,
};
use crate::error::{ChainValidationError, ValidationError};
use crate::pow::leading_zero_bits;
use crate::{genesis_block, unix_now, Block};

/// Difficulty the next block on top of `chain` must be mined at.
pub fn current_difficulty(chain: &[Block]) -> u32 {
    let Some(latest) = chain.last() else {
        return 0;
    };
    if latest.index != 0 && latest.index % DIFFICULTY_ADJUSTMENT_INTERVAL == 0 {
        adjusted_difficulty(latest, chain)
    } else {
        latest.difficulty
    }
}

fn adjusted_difficulty(latest: &Block, chain: &[Block]) -> u32 {
    let Some(start) = chain
        .len()
        .checked_sub(DIFFICULTY_ADJUSTMENT_INTERVAL as usize)
        .map(|i| &chain[i])
    else {
        return latest.difficulty;
    };

    let expected = BLOCK_GENERATION_INTERVAL * DIFFICULTY_ADJUSTMENT_INTERVAL;
    let taken = latest.timestamp.saturating_sub(start.timestamp);
    if taken < expected / 2 {
        start.difficulty + 1
    } else if taken > expected * 2 {
        start.difficulty.saturating_sub(1)
    } else {
        start.difficulty
    }
}

fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Field-level sanity that the type system does not already guarantee.
/// The genesis block is exempt; it is compared verbatim instead.
pub fn check_structure(block: &Block) -> Result<(), ValidationError> {
    if block.is_genesis() {
        return Ok(());
    }
    if block.hash.len() != HASH_HEX_SIZE || !is_lower_hex(&block.hash) {
        return Err(ValidationError::Structure("hash is not a 64 digit hex string"));
    }
    if block.previous_hash.is_empty() {
        return Err(ValidationError::Structure("previous hash is empty"));
    }
    Ok(())
}

pub fn is_valid_block_structure(block: &Block) -> bool {
    check_structure(block).is_ok()
}

pub fn is_valid_timestamp(block: &Block, previous: &Block, now: u64) -> bool {
    block.timestamp.saturating_add(TIMESTAMP_TOLERANCE) > previous.timestamp
        && block.timestamp < now.saturating_add(TIMESTAMP_TOLERANCE)
}

/// Runs every check against `previous`, stopping at the first failure.
pub fn validate_block_at(block: &Block, previous: &Block, now: u64) -> Result<(), ValidationError> {
    check_structure(block)?;

    if block.index != previous.index + 1 {
        return Err(ValidationError::Index {
            expected: previous.index + 1,
            got: block.index,
        });
    }

    if block.previous_hash != previous.hash {
        return Err(ValidationError::Linkage {
            expected: previous.hash.clone(),
            got: block.previous_hash.clone(),
        });
    }

    let computed = block.calculate_hash();
    if computed != block.hash {
        return Err(ValidationError::HashMismatch {
            computed,
            claimed: block.hash.clone(),
        });
    }

    if !is_valid_timestamp(block, previous, now) {
        return Err(ValidationError::Timestamp {
            timestamp: block.timestamp,
            previous: previous.timestamp,
            now,
        });
    }

    // Counted on the recomputed hash, never the claimed one.
    let zeros = leading_zero_bits(&computed);
    if zeros < block.difficulty {
        return Err(ValidationError::ProofOfWork {
            difficulty: block.difficulty,
            zeros,
        });
    }

    Ok(())
}

pub fn validate_block(block: &Block, previous: &Block) -> Result<(), ValidationError> {
    validate_block_at(block, previous, unix_now())
}

pub fn validate_chain_at(chain: &[Block], now: u64) -> Result<(), ChainValidationError> {
    let first = chain.first().ok_or(ChainValidationError::Empty)?;
    if *first != genesis_block() {
        return Err(ChainValidationError::GenesisMismatch);
    }
    for pair in chain.windows(2) {
        validate_block_at(&pair[1], &pair[0], now).map_err(|source| ChainValidationError::Block {
            index: pair[1].index,
            source,
        })?;
    }
    Ok(())
}

pub fn validate_chain(chain: &[Block]) -> Result<(), ChainValidationError> {
    validate_chain_at(chain, unix_now())
}

pub fn is_valid_chain(chain: &[Block]) -> bool {
    validate_chain(chain).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate_hash;
    use crate::mine::{mine_block, BlockTemplate};

    fn next_block(previous: &Block, timestamp: u64, difficulty: u32) -> Block {
        let template = BlockTemplate {
            index: previous.index + 1,
            previous_hash: previous.hash.clone(),
            timestamp,
            data: format!("block {}", previous.index + 1),
            difficulty,
        };
        mine_block(template, || false).expect("never aborted")
    }

    /// Chain of `len` blocks spaced `spacing` seconds apart, all at `difficulty`.
    fn chain_with_spacing(len: usize, spacing: u64, difficulty: u32) -> Vec<Block> {
        let mut chain = vec![genesis_block()];
        while chain.len() < len {
            let prev = chain.last().unwrap();
            let ts = prev.timestamp + spacing;
            chain.push(next_block(prev, ts, difficulty));
        }
        chain
    }

    #[test]
    fn difficulty_of_genesis_only_chain_is_zero() {
        assert_eq!(current_difficulty(&[genesis_block()]), 0);
        assert_eq!(current_difficulty(&[]), 0);
    }

    #[test]
    fn difficulty_unchanged_between_adjustments() {
        let chain = chain_with_spacing(10, 1, 2);
        assert_eq!(chain.last().unwrap().index, 9);
        assert_eq!(current_difficulty(&chain), 2);
    }

    #[test]
    fn difficulty_increases_when_blocks_come_twice_as_fast() {
        // 9 gaps of 5s = 45s, below half of the 100s target.
        let chain = chain_with_spacing(11, 5, 1);
        assert_eq!(chain.last().unwrap().index, 10);
        assert_eq!(current_difficulty(&chain), 2);
    }

    #[test]
    fn difficulty_decreases_when_blocks_come_twice_as_slow() {
        // 9 gaps of 25s = 225s, above twice the 100s target.
        let chain = chain_with_spacing(11, 25, 1);
        assert_eq!(current_difficulty(&chain), 0);
    }

    #[test]
    fn difficulty_decrease_floors_at_zero() {
        let chain = chain_with_spacing(11, 25, 0);
        assert_eq!(current_difficulty(&chain), 0);
    }

    #[test]
    fn difficulty_unchanged_within_band() {
        // 9 gaps of 11s = 99s, close to target.
        let chain = chain_with_spacing(11, 11, 1);
        assert_eq!(current_difficulty(&chain), 1);
    }

    #[test]
    fn valid_block_passes_every_check() {
        let genesis = genesis_block();
        let block = next_block(&genesis, unix_now(), 4);
        assert_eq!(validate_block(&block, &genesis), Ok(()));
    }

    #[test]
    fn structure_failures_are_reported_first() {
        let genesis = genesis_block();
        let mut block = next_block(&genesis, unix_now(), 0);
        block.index = 7;
        block.hash = "xyz".into();
        assert!(!is_valid_block_structure(&block));
        assert!(matches!(
            validate_block(&block, &genesis),
            Err(ValidationError::Structure(_))
        ));

        let mut block = next_block(&genesis, unix_now(), 0);
        block.previous_hash = String::new();
        assert!(matches!(
            validate_block(&block, &genesis),
            Err(ValidationError::Structure(_))
        ));
    }

    #[test]
    fn wrong_index_is_rejected() {
        let genesis = genesis_block();
        let mut block = next_block(&genesis, unix_now(), 0);
        block.index = 2;
        assert_eq!(
            validate_block(&block, &genesis),
            Err(ValidationError::Index { expected: 1, got: 2 })
        );
    }

    #[test]
    fn broken_linkage_is_rejected() {
        let genesis = genesis_block();
        let mut block = next_block(&genesis, unix_now(), 0);
        block.previous_hash = "ab".repeat(32);
        assert!(matches!(
            validate_block(&block, &genesis),
            Err(ValidationError::Linkage { .. })
        ));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let genesis = genesis_block();
        let mut block = next_block(&genesis, unix_now(), 0);
        block.data = "tampered".into();
        assert!(matches!(
            validate_block(&block, &genesis),
            Err(ValidationError::HashMismatch { .. })
        ));
    }

    #[test]
    fn timestamps_outside_tolerance_are_rejected() {
        let now = 1_700_000_000;
        let mut previous = genesis_block();
        previous.timestamp = now;

        let too_old = next_block(&previous, now - TIMESTAMP_TOLERANCE, 0);
        assert!(matches!(
            validate_block_at(&too_old, &previous, now),
            Err(ValidationError::Timestamp { .. })
        ));

        let too_new = next_block(&previous, now + TIMESTAMP_TOLERANCE, 0);
        assert!(matches!(
            validate_block_at(&too_new, &previous, now),
            Err(ValidationError::Timestamp { .. })
        ));

        let drifted = next_block(&previous, now - TIMESTAMP_TOLERANCE + 1, 0);
        assert_eq!(validate_block_at(&drifted, &previous, now), Ok(()));
    }

    #[test]
    fn claimed_difficulty_must_be_met() {
        let genesis = genesis_block();
        let now = unix_now();
        // Find a nonce whose hash has no leading zero bit, then claim difficulty 1.
        let mut block = next_block(&genesis, now, 0);
        while leading_zero_bits(&block.hash) > 0 {
            block.nonce += 1;
            block.hash = block.calculate_hash();
        }
        block.difficulty = 1;
        assert_eq!(
            validate_block(&block, &genesis),
            Err(ValidationError::ProofOfWork {
                difficulty: 1,
                zeros: 0
            })
        );
    }

    #[test]
    fn chain_validation_requires_canonical_genesis() {
        assert_eq!(validate_chain(&[]), Err(ChainValidationError::Empty));

        let mut forged = genesis_block();
        forged.data = "Another Genesis".into();
        assert_eq!(
            validate_chain(&[forged]),
            Err(ChainValidationError::GenesisMismatch)
        );

        let mut rehashed = genesis_block();
        rehashed.hash = calculate_hash(0, "", rehashed.timestamp, &rehashed.data, 0);
        assert!(!is_valid_chain(&[rehashed]));
        assert!(is_valid_chain(&[genesis_block()]));
    }

    #[test]
    fn chain_validation_reports_first_bad_block() {
        let now = unix_now();
        let mut chain = vec![genesis_block()];
        for i in 0..4 {
            let prev = chain.last().unwrap();
            chain.push(next_block(prev, now - 10 + i, 0));
        }
        assert!(is_valid_chain(&chain));

        chain[2].data = "rewritten".into();
        assert!(matches!(
            validate_chain(&chain),
            Err(ChainValidationError::Block {
                index: 2,
                source: ValidationError::HashMismatch { .. }
            })
        ));
    }
}
