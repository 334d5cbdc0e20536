use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod chain;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod mine;

pub use error::{ChainError, ChainValidationError, ValidationError};

pub type Hash = [u8; 32];

/// A single entry of the ledger. Field names and order match the wire format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Block {
    pub index: u64,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: u64,
    pub data: String,
    pub difficulty: u32,
    pub nonce: u64,
}

impl Block {
    /// Recomputes the content hash from the block's own fields.
    pub fn calculate_hash(&self) -> String {
        calculate_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.data,
            self.nonce,
        )
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }
}

/// Hasher pre-loaded with everything but the nonce, so mining only feeds the
/// changing suffix.
pub fn prefix_hasher(index: u64, previous_hash: &str, timestamp: u64, data: &str) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(index.to_string());
    hasher.update(previous_hash);
    hasher.update(timestamp.to_string());
    hasher.update(data);
    hasher
}

pub fn finish_digest(mut hasher: Sha256, nonce: u64) -> Hash {
    hasher.update(nonce.to_string());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// SHA-256 over `index ‖ previousHash ‖ timestamp ‖ data ‖ nonce`.
pub fn block_digest(index: u64, previous_hash: &str, timestamp: u64, data: &str, nonce: u64) -> Hash {
    finish_digest(prefix_hasher(index, previous_hash, timestamp, data), nonce)
}

pub fn calculate_hash(index: u64, previous_hash: &str, timestamp: u64, data: &str, nonce: u64) -> String {
    hex::encode(block_digest(index, previous_hash, timestamp, data, nonce))
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The hard-coded first block of every valid chain. Its hash is an opaque
/// constant and is never re-derived.
pub fn genesis_block() -> Block {
    Block {
        index: 0,
        hash: constants::GENESIS_HASH.to_string(),
        previous_hash: String::new(),
        timestamp: constants::GENESIS_TIMESTAMP,
        data: constants::GENESIS_DATA.to_string(),
        difficulty: 0,
        nonce: 0,
    }
}

pub mod pow {
    use super::Hash;
    use crate::constants::BYTE;

    pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 8;
            } else {
                total += b.leading_zeros();
                break;
            }
        }
        total
    }

    /// Expands a hex string to its bit string, four bits per digit, keeping
    /// leading zeros. Returns `None` if any character is not a hex digit.
    pub fn hex_to_binary(hex: &str) -> Option<String> {
        let mut out = String::with_capacity(hex.len() * BYTE / 2);
        for c in hex.chars() {
            let nibble = c.to_digit(16)?;
            out.push_str(&format!("{nibble:04b}"));
        }
        Some(out)
    }

    /// Leading zero bits of a hex-encoded digest. Non-hex input counts as zero.
    pub fn leading_zero_bits(hex: &str) -> u32 {
        hex_to_binary(hex)
            .map(|bits| bits.chars().take_while(|c| *c == '0').count() as u32)
            .unwrap_or(0)
    }

    pub fn hash_matches_difficulty(hex: &str, difficulty: u32) -> bool {
        leading_zero_bits(hex) >= difficulty
    }
}
