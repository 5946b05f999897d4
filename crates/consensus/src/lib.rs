//! Proof-of-work mining and chain validation for medichain.
//!
//! This crate provides:
//! - Difficulty targets (leading zero hex digits of the block digest)
//! - A brute-force nonce search that can be cancelled or bounded
//! - Block and chain validation rules (seal and parent-link checks)
//!
//! # Example
//!
//! ```rust,no_run
//! use medichain_consensus::{ChainValidator, Miner, PowConfig};
//! use medichain_core::{Block, BlockData, BlockTemplate};
//!
//! let genesis = Block::genesis();
//! let miner = Miner::new(PowConfig::new(2)).unwrap();
//!
//! let template = BlockTemplate::new(1, BlockData::Transactions(vec![]), genesis.hash().into());
//! let block = miner.mine(template).unwrap();
//! assert!(block.hash().to_hex().starts_with("00"));
//!
//! ChainValidator::verify(&[genesis, block]).unwrap();
//! ```

pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use pow::{meets_difficulty, mine, CancelToken, Miner, PowConfig, PowError, MAX_DIFFICULTY};
pub use validator::{BlockValidator, ChainValidator, ValidationError};
