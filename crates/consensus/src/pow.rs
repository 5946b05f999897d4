//! Proof-of-work (PoW) block sealing.
//!
//! A block satisfies difficulty `d` when the first `d` hex digits of its
//! digest are all `0`. Finding a nonce is a plain brute-force search: the
//! expected number of attempts is `16^d`, so difficulty is a latency dial
//! rather than a security parameter on a single node.

use medichain_core::{Block, BlockData, BlockTemplate, Hash, PreviousHash};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Largest meaningful difficulty: a SHA-256 digest has 64 hex digits.
pub const MAX_DIFFICULTY: u32 = 64;

/// How many nonces are tried between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Errors that can occur while mining.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PowError {
    #[error("difficulty {difficulty} exceeds maximum of {max}")]
    DifficultyTooHigh { difficulty: u32, max: u32 },

    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("no nonce found within {attempts} attempts")]
    Exhausted { attempts: u64 },
}

pub type Result<T> = std::result::Result<T, PowError>;

/// Proof-of-work configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowConfig {
    /// Required number of leading zero hex digits.
    pub difficulty: u32,
    /// Upper bound on nonces tried per block (`None` = unbounded).
    #[serde(default)]
    pub max_attempts: Option<u64>,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            difficulty: 4,
            max_attempts: None,
        }
    }
}

impl PowConfig {
    /// Create a new configuration with the given difficulty and no attempt bound.
    pub fn new(difficulty: u32) -> Self {
        Self {
            difficulty,
            max_attempts: None,
        }
    }

    /// Bound the nonce search.
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(PowError::DifficultyTooHigh {
                difficulty: self.difficulty,
                max: MAX_DIFFICULTY,
            });
        }
        Ok(())
    }
}

/// Check whether a digest meets a difficulty target.
pub fn meets_difficulty(hash: &Hash, difficulty: u32) -> bool {
    hash.leading_zero_digits() >= difficulty
}

/// Shared flag used to abandon an in-flight nonce search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Nonce searcher for a fixed configuration.
#[derive(Debug, Clone)]
pub struct Miner {
    config: PowConfig,
}

impl Miner {
    /// Create a miner, rejecting unusable configurations.
    pub fn new(config: PowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &PowConfig {
        &self.config
    }

    /// Mine a block with no way to cancel it.
    pub fn mine(&self, template: BlockTemplate) -> Result<Block> {
        self.mine_with(template, &CancelToken::new())
    }

    /// Search nonces from 0 upward until the digest meets the difficulty.
    ///
    /// The cancel flag is polled before the first attempt and every 1024
    /// attempts after that.
    pub fn mine_with(&self, template: BlockTemplate, cancel: &CancelToken) -> Result<Block> {
        let PowConfig {
            difficulty,
            max_attempts,
        } = self.config;
        let started = Instant::now();
        debug!(index = template.index(), difficulty, "mining block");

        let mut nonce: u64 = 0;
        loop {
            let attempts = nonce;
            if max_attempts.is_some_and(|max| attempts >= max) {
                return Err(PowError::Exhausted { attempts });
            }
            if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                debug!(index = template.index(), attempts, "mining cancelled");
                return Err(PowError::Cancelled { attempts });
            }

            let hash = template.hash_with_nonce(nonce);
            if meets_difficulty(&hash, difficulty) {
                info!(
                    index = template.index(),
                    nonce,
                    hash = %hash,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "block sealed"
                );
                return Ok(template.seal_with_hash(nonce, hash));
            }

            nonce = nonce
                .checked_add(1)
                .ok_or(PowError::Exhausted { attempts: u64::MAX })?;
        }
    }
}

/// Mine a block over `data` on top of `previous_hash`.
pub fn mine(
    index: u64,
    data: BlockData,
    previous_hash: PreviousHash,
    difficulty: u32,
) -> Result<Block> {
    Miner::new(PowConfig::new(difficulty))?.mine(BlockTemplate::new(index, data, previous_hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> BlockTemplate {
        BlockTemplate::new(1, BlockData::Transactions(vec![]), Hash::ZERO.into())
            .with_timestamp("2024-01-01T00:00:00.000000")
    }

    #[test]
    fn test_mined_block_meets_difficulty() {
        for difficulty in 0..=2 {
            let block = Miner::new(PowConfig::new(difficulty))
                .unwrap()
                .mine(template())
                .unwrap();
            assert!(block.is_sealed());
            assert!(block.hash().to_hex().starts_with(&"0".repeat(difficulty as usize)));
        }
    }

    #[test]
    fn test_first_qualifying_nonce_is_chosen() {
        let block = Miner::new(PowConfig::new(1)).unwrap().mine(template()).unwrap();
        let t = template();
        for nonce in 0..block.nonce() {
            assert!(!meets_difficulty(&t.hash_with_nonce(nonce), 1));
        }
    }

    #[test]
    fn test_difficulty_zero_uses_nonce_zero() {
        let block = Miner::new(PowConfig::new(0)).unwrap().mine(template()).unwrap();
        assert_eq!(block.nonce(), 0);
    }

    #[test]
    fn test_difficulty_too_high_rejected() {
        let err = Miner::new(PowConfig::new(65)).unwrap_err();
        assert_eq!(
            err,
            PowError::DifficultyTooHigh {
                difficulty: 65,
                max: MAX_DIFFICULTY
            }
        );
    }

    #[test]
    fn test_max_attempts_exhausted() {
        // 16^12 expected attempts; three will not find one.
        let miner = Miner::new(PowConfig::new(12).with_max_attempts(3)).unwrap();
        assert_eq!(
            miner.mine(template()).unwrap_err(),
            PowError::Exhausted { attempts: 3 }
        );
    }

    #[test]
    fn test_cancelled_search_stops() {
        let miner = Miner::new(PowConfig::new(40)).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = miner.mine_with(template(), &cancel).unwrap_err();
        assert_eq!(err, PowError::Cancelled { attempts: 0 });
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_meets_difficulty() {
        let mut bytes = [0xffu8; 32];
        bytes[0] = 0x00;
        bytes[1] = 0x0a;
        let hash = Hash::from_bytes(bytes);
        assert!(meets_difficulty(&hash, 0));
        assert!(meets_difficulty(&hash, 3));
        assert!(!meets_difficulty(&hash, 4));
    }

    #[test]
    fn test_free_mine_function() {
        let block = mine(1, BlockData::Transactions(vec![]), Hash::ZERO.into(), 1).unwrap();
        assert_eq!(block.index(), 1);
        assert!(block.hash().to_hex().starts_with('0'));
    }
}
