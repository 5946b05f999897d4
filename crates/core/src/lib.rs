//! Core ledger primitives for medichain.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - Cryptographic primitives (SHA-256 digests, P-256 signing keys)
//! - Canonical JSON encoding shared by block sealing and signing
//! - EMR-creation transactions
//! - Blocks, block templates and the genesis sentinel
//! - Patient/doctor identity directories

pub mod block;
pub mod canonical;
pub mod crypto;
pub mod hash;
pub mod identity;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use block::{current_timestamp, Block, BlockData, BlockTemplate, PreviousHash, GENESIS_DATA};
pub use canonical::{to_canonical_bytes, CanonicalError};
pub use crypto::{sign_canonical, verify_canonical, CryptoError, Keypair, PrivateKey, PublicKey, Signature};
pub use hash::{hash, Hash, H256};
pub use identity::{
    Doctor, DoctorDirectory, MemoryDirectory, Patient, PatientDirectory, RegistryError,
};
pub use transaction::{SigningPayload, Transaction, TransactionFilter, TransactionKind};
