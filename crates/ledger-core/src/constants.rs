pub const BYTE: usize = 8;
pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Target seconds between two blocks.
pub const BLOCK_GENERATION_INTERVAL: u64 = 10;
/// Number of blocks between two difficulty adjustments.
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 10;
/// Allowed clock drift, in seconds, against the previous block and wall time.
pub const TIMESTAMP_TOLERANCE: u64 = 60;

pub const GENESIS_HASH: &str = "816534932c2b7154836da6afc367695e6337db8a921823784c14378abed4f7d7";
pub const GENESIS_TIMESTAMP: u64 = 1_465_154_705;
pub const GENESIS_DATA: &str = "My Genesis Block!!!";
