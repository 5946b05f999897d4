//! Block and chain validation rules.
//!
//! A chain is valid when block 0 is a sealed genesis block, every block's
//! stored digest equals the digest recomputed from its fields, and each
//! later block's `previous_hash` equals the stored digest of the block
//! before it. There is no partial validity: the
//! first failing block invalidates the whole chain.

use crate::pow::meets_difficulty;
use medichain_core::Block;
use thiserror::Error;

/// Reasons a chain is corrupt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("chain has no blocks")]
    EmptyChain,

    #[error("block 0 is not a genesis block")]
    InvalidGenesis,

    #[error("block {index}: stored hash does not match block contents")]
    HashMismatch { index: u64 },

    #[error("block {index}: previous_hash does not match the preceding block")]
    BrokenLink { index: u64 },

    #[error("block {index}: hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: u64, difficulty: u32 },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Single-block checks.
pub struct BlockValidator;

impl BlockValidator {
    /// The stored digest matches the recomputed one.
    pub fn validate_seal(block: &Block) -> Result<()> {
        if !block.is_sealed() {
            return Err(ValidationError::HashMismatch {
                index: block.index(),
            });
        }
        Ok(())
    }

    /// `block.previous_hash` points at `parent`'s stored digest.
    pub fn validate_link(block: &Block, parent: &Block) -> Result<()> {
        if !block.previous_hash().points_to(&parent.hash()) {
            return Err(ValidationError::BrokenLink {
                index: block.index(),
            });
        }
        Ok(())
    }

    /// The stored digest meets the difficulty target. Genesis is exempt.
    pub fn validate_work(block: &Block, difficulty: u32) -> Result<()> {
        if block.is_genesis() || meets_difficulty(&block.hash(), difficulty) {
            return Ok(());
        }
        Err(ValidationError::InsufficientWork {
            index: block.index(),
            difficulty,
        })
    }

    /// Seal and link checks for a non-genesis block.
    pub fn validate_full(block: &Block, parent: &Block) -> Result<()> {
        Self::validate_seal(block)?;
        Self::validate_link(block, parent)?;
        Ok(())
    }
}

/// Whole-chain checks.
pub struct ChainValidator;

impl ChainValidator {
    /// Verify the genesis seal, then seal and linkage for blocks `1..`,
    /// stopping at the first failure.
    pub fn verify(blocks: &[Block]) -> Result<()> {
        let genesis = blocks.first().ok_or(ValidationError::EmptyChain)?;
        if !genesis.is_genesis() {
            return Err(ValidationError::InvalidGenesis);
        }
        BlockValidator::validate_seal(genesis)?;
        for pair in blocks.windows(2) {
            BlockValidator::validate_full(&pair[1], &pair[0])?;
        }
        Ok(())
    }

    /// [`ChainValidator::verify`] plus a proof-of-work check on every
    /// non-genesis block against `difficulty`.
    pub fn verify_with_work(blocks: &[Block], difficulty: u32) -> Result<()> {
        Self::verify(blocks)?;
        for block in blocks {
            BlockValidator::validate_work(block, difficulty)?;
        }
        Ok(())
    }

    /// Boolean form of [`ChainValidator::verify`].
    pub fn is_valid(blocks: &[Block]) -> bool {
        Self::verify(blocks).is_ok()
    }
}
