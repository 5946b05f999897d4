//! Blocks, block templates and the genesis sentinel.
//!
//! A block only comes into existence sealed: [`BlockTemplate`] carries the
//! immutable fields and [`BlockTemplate::seal`] fixes the nonce and digest in
//! one step. Deserialization assigns fields directly and does not re-check
//! the seal; callers validate loaded chains explicitly.

use crate::canonical::to_canonical_bytes;
use crate::hash::{hash, Hash};
use crate::transaction::Transaction;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Payload of the genesis block.
pub const GENESIS_DATA: &str = "Genesis Block";

/// Sentinel stored as the genesis block's parent.
const GENESIS_PARENT: &str = "0";

/// Get the current local time as an ISO-8601 string with microseconds.
pub fn current_timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Block payload: a transaction batch, or a sentinel string (genesis).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockData {
    Transactions(Vec<Transaction>),
    Sentinel(String),
}

impl BlockData {
    /// The genesis sentinel.
    pub fn genesis() -> Self {
        BlockData::Sentinel(GENESIS_DATA.to_string())
    }

    /// Transactions carried by this payload (empty for a sentinel).
    pub fn transactions(&self) -> &[Transaction] {
        match self {
            BlockData::Transactions(txs) => txs,
            BlockData::Sentinel(_) => &[],
        }
    }
}

/// Link to the parent block: the `"0"` sentinel for genesis, a digest otherwise.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviousHash {
    Genesis,
    Block(Hash),
}

impl PreviousHash {
    /// Check whether this link points at the given block digest.
    pub fn points_to(&self, hash: &Hash) -> bool {
        matches!(self, PreviousHash::Block(h) if h == hash)
    }
}

impl fmt::Debug for PreviousHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviousHash::Genesis => f.write_str("PreviousHash(0)"),
            PreviousHash::Block(h) => write!(f, "PreviousHash({:?})", h),
        }
    }
}

impl fmt::Display for PreviousHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreviousHash::Genesis => f.write_str(GENESIS_PARENT),
            PreviousHash::Block(h) => write!(f, "{}", h),
        }
    }
}

impl From<Hash> for PreviousHash {
    fn from(hash: Hash) -> Self {
        PreviousHash::Block(hash)
    }
}

impl Serialize for PreviousHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PreviousHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == GENESIS_PARENT {
            return Ok(PreviousHash::Genesis);
        }
        Hash::from_hex(&s)
            .map(PreviousHash::Block)
            .map_err(serde::de::Error::custom)
    }
}

/// Fields covered by the block digest.
#[derive(Serialize)]
struct SealedFields<'a> {
    index: u64,
    timestamp: &'a str,
    data: &'a BlockData,
    previous_hash: &'a PreviousHash,
    nonce: u64,
}

fn digest(
    index: u64,
    timestamp: &str,
    data: &BlockData,
    previous_hash: &PreviousHash,
    nonce: u64,
) -> Hash {
    let fields = SealedFields {
        index,
        timestamp,
        data,
        previous_hash,
        nonce,
    };
    let encoded = to_canonical_bytes(&fields).expect("serialization should not fail");
    hash(&encoded)
}

/// An unsealed block: everything except the nonce and digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTemplate {
    index: u64,
    timestamp: String,
    data: BlockData,
    previous_hash: PreviousHash,
}

impl BlockTemplate {
    /// Create a template stamped with the current time.
    pub fn new(index: u64, data: BlockData, previous_hash: PreviousHash) -> Self {
        Self {
            index,
            timestamp: current_timestamp(),
            data,
            previous_hash,
        }
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn previous_hash(&self) -> &PreviousHash {
        &self.previous_hash
    }

    /// Digest the block would have with the given nonce.
    pub fn hash_with_nonce(&self, nonce: u64) -> Hash {
        digest(
            self.index,
            &self.timestamp,
            &self.data,
            &self.previous_hash,
            nonce,
        )
    }

    /// Fix the nonce and produce the sealed block.
    pub fn seal(self, nonce: u64) -> Block {
        let hash = self.hash_with_nonce(nonce);
        self.seal_with_hash(nonce, hash)
    }

    /// Produce the sealed block from a nonce whose digest is already known.
    ///
    /// `hash` must be `self.hash_with_nonce(nonce)`; miners use this to avoid
    /// hashing the winning nonce twice.
    pub fn seal_with_hash(self, nonce: u64, hash: Hash) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            data: self.data,
            previous_hash: self.previous_hash,
            nonce,
            hash,
        }
    }
}

/// A sealed ledger block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: String,
    data: BlockData,
    previous_hash: PreviousHash,
    nonce: u64,
    hash: Hash,
}

impl Block {
    /// Create the genesis block (nonce 0, no proof-of-work).
    pub fn genesis() -> Self {
        BlockTemplate::new(0, BlockData::genesis(), PreviousHash::Genesis).seal(0)
    }

    /// Block index (0 for genesis).
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn data(&self) -> &BlockData {
        &self.data
    }

    pub fn previous_hash(&self) -> &PreviousHash {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// The stored block digest.
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// Recompute the digest from the block's fields.
    pub fn compute_hash(&self) -> Hash {
        digest(
            self.index,
            &self.timestamp,
            &self.data,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// Check that the stored digest matches the block's fields.
    pub fn is_sealed(&self) -> bool {
        self.compute_hash() == self.hash
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.previous_hash == PreviousHash::Genesis
    }

    /// Transactions in this block (empty for genesis).
    pub fn transactions(&self) -> &[Transaction] {
        self.data.transactions()
    }

    /// Get the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::transaction::SigningPayload;

    fn sample_tx() -> Transaction {
        let kp = Keypair::generate();
        let sig = SigningPayload::new("P1", "D1", "abc", "xyz")
            .sign(kp.private_key())
            .unwrap();
        Transaction::emr_creation("P1", "D1", "abc", "xyz", sig)
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();

        assert!(genesis.is_genesis());
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.nonce(), 0);
        assert_eq!(genesis.previous_hash(), &PreviousHash::Genesis);
        assert_eq!(genesis.data(), &BlockData::genesis());
        assert!(genesis.transactions().is_empty());
        assert!(genesis.is_sealed());
    }

    #[test]
    fn test_block_hash_deterministic() {
        let template = BlockTemplate::new(1, BlockData::Transactions(vec![]), Hash::ZERO.into())
            .with_timestamp("2024-01-01T00:00:00.000000");
        assert_eq!(template.hash_with_nonce(7), template.hash_with_nonce(7));
        assert_ne!(template.hash_with_nonce(7), template.hash_with_nonce(8));
    }

    #[test]
    fn test_seal_matches_recompute() {
        let block = BlockTemplate::new(1, BlockData::Transactions(vec![sample_tx()]), Hash::ZERO.into())
            .seal(42);
        assert_eq!(block.nonce(), 42);
        assert_eq!(block.compute_hash(), block.hash());
        assert!(block.is_sealed());
        assert_eq!(block.tx_count(), 1);
    }

    #[test]
    fn test_any_field_change_breaks_seal() {
        let block = BlockTemplate::new(1, BlockData::Transactions(vec![sample_tx()]), Hash::ZERO.into())
            .seal(3);

        let mut tampered = block.clone();
        tampered.nonce += 1;
        assert!(!tampered.is_sealed());

        let mut tampered = block.clone();
        tampered.timestamp.push('0');
        assert!(!tampered.is_sealed());

        let mut tampered = block.clone();
        if let BlockData::Transactions(txs) = &mut tampered.data {
            txs[0].patient_id = "P2".into();
        }
        assert!(!tampered.is_sealed());

        let mut tampered = block;
        tampered.previous_hash = PreviousHash::Genesis;
        assert!(!tampered.is_sealed());
    }

    #[test]
    fn test_digest_covers_canonical_json() {
        let template = BlockTemplate::new(0, BlockData::genesis(), PreviousHash::Genesis)
            .with_timestamp("2024-01-01T00:00:00.000000");
        let expected = hash(
            br#"{"data": "Genesis Block", "index": 0, "nonce": 0, "previous_hash": "0", "timestamp": "2024-01-01T00:00:00.000000"}"#,
        );
        assert_eq!(template.hash_with_nonce(0), expected);
    }

    #[test]
    fn test_block_json_shape() {
        let block = BlockTemplate::new(1, BlockData::Transactions(vec![sample_tx()]), Hash::ZERO.into())
            .seal(9);
        let value = serde_json::to_value(&block).unwrap();

        assert_eq!(value["index"], 1);
        assert_eq!(value["nonce"], 9);
        assert_eq!(value["previous_hash"], Hash::ZERO.to_hex());
        assert_eq!(value["hash"], block.hash().to_hex());
        assert!(value["data"].is_array());

        let back: Block = serde_json::from_value(value).unwrap();
        assert_eq!(back, block);
    }

    #[test]
    fn test_genesis_json_uses_sentinels() {
        let value = serde_json::to_value(Block::genesis()).unwrap();
        assert_eq!(value["previous_hash"], "0");
        assert_eq!(value["data"], GENESIS_DATA);

        let back: Block = serde_json::from_value(value).unwrap();
        assert!(back.is_genesis());
    }

    #[test]
    fn test_previous_hash_rejects_garbage() {
        let result: Result<PreviousHash, _> = serde_json::from_str("\"not-a-hash\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_does_not_reseal() {
        let block = BlockTemplate::new(1, BlockData::Transactions(vec![]), Hash::ZERO.into()).seal(1);
        let mut value = serde_json::to_value(&block).unwrap();
        value["nonce"] = 2.into();

        let loaded: Block = serde_json::from_value(value).unwrap();
        assert_eq!(loaded.hash(), block.hash());
        assert!(!loaded.is_sealed());
    }
}
