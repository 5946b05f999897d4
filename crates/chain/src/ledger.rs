//! The append-only medical record ledger.
//!
//! Appends are serialized behind a single lock around "read tip, mine,
//! push". Readers take the chain's read lock and never observe a block
//! half-appended.

use medichain_consensus::{CancelToken, ChainValidator, Miner, PowConfig, PowError, ValidationError};
use medichain_core::{Block, BlockData, BlockTemplate, Hash, Transaction, TransactionFilter};
use medichain_storage::{LedgerFile, LedgerSnapshot, StorageError};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError, RwLock};
use thiserror::Error;
use tracing::{info, warn};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("mining error: {0}")]
    Pow(#[from] PowError),

    #[error("chain corrupt: {0}")]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Leading zero hex digits required of every mined block.
    pub difficulty: u32,
    /// Upper bound on nonces tried per block.
    #[serde(default)]
    pub max_attempts: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: 4,
            max_attempts: None,
        }
    }
}

impl LedgerConfig {
    pub fn new(difficulty: u32) -> Self {
        Self {
            difficulty,
            max_attempts: None,
        }
    }

    fn pow(&self) -> PowConfig {
        PowConfig {
            difficulty: self.difficulty,
            max_attempts: self.max_attempts,
        }
    }
}

/// Ledger statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStats {
    /// Number of blocks, genesis included.
    pub length: usize,
    /// Hash of the latest block.
    pub tip_hash: Hash,
    pub difficulty: u32,
    /// Transactions across all blocks.
    pub transaction_count: usize,
}

/// Hash-linked chain of proof-of-work blocks.
#[derive(Debug)]
pub struct Ledger {
    chain: RwLock<Vec<Block>>,
    append_lock: Mutex<()>,
    miner: Miner,
    config: LedgerConfig,
}

impl Ledger {
    /// Create a ledger holding only a fresh genesis block.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        Self::from_blocks(vec![Block::genesis()], config)
    }

    fn from_blocks(blocks: Vec<Block>, config: LedgerConfig) -> Result<Self> {
        if blocks.is_empty() {
            return Err(ValidationError::EmptyChain.into());
        }
        Ok(Self {
            chain: RwLock::new(blocks),
            append_lock: Mutex::new(()),
            miner: Miner::new(config.pow())?,
            config,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Always `false`: a ledger holds at least its genesis block.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The latest block.
    pub fn tip(&self) -> Block {
        let chain = self.read();
        chain[chain.len() - 1].clone()
    }

    pub fn get_block(&self, index: u64) -> Option<Block> {
        let index = usize::try_from(index).ok()?;
        self.read().get(index).cloned()
    }

    /// Copy of every block in index order.
    pub fn blocks(&self) -> Vec<Block> {
        self.read().clone()
    }

    /// Mine a block holding `tx` on top of the tip and append it.
    pub fn append_transaction(&self, tx: Transaction) -> Result<Block> {
        self.append_transaction_with(tx, &CancelToken::new())
    }

    /// Like [`Ledger::append_transaction`], abandoning the search when
    /// `cancel` fires. A cancelled append leaves the chain untouched.
    pub fn append_transaction_with(&self, tx: Transaction, cancel: &CancelToken) -> Result<Block> {
        let _guard = self.append_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let parent = self.tip();
        let template = BlockTemplate::new(
            parent.index() + 1,
            BlockData::Transactions(vec![tx]),
            parent.hash().into(),
        );
        let block = self.miner.mine_with(template, cancel)?;

        self.write().push(block.clone());
        info!(
            index = block.index(),
            hash = %block.hash(),
            nonce = block.nonce(),
            "block appended"
        );
        Ok(block)
    }

    /// Check the genesis seal and every later block's seal and link,
    /// naming the first failure.
    pub fn verify(&self) -> std::result::Result<(), ValidationError> {
        ChainValidator::verify(&self.read())
    }

    /// Whether the whole chain is intact.
    pub fn validate(&self) -> bool {
        self.verify().is_ok()
    }

    /// Transactions matching `filter`, in block order then payload order.
    pub fn query_transactions(&self, filter: &TransactionFilter) -> Vec<Transaction> {
        self.read()
            .iter()
            .skip(1)
            .flat_map(|block| block.transactions())
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> LedgerStats {
        let chain = self.read();
        LedgerStats {
            length: chain.len(),
            tip_hash: chain[chain.len() - 1].hash(),
            difficulty: self.config.difficulty,
            transaction_count: chain.iter().map(Block::tx_count).sum(),
        }
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Serializable copy of the ledger.
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            chain: self.blocks(),
            difficulty: self.config.difficulty,
            pending_transactions: Vec::new(),
        }
    }

    /// Rebuild a ledger from a snapshot without re-mining or validating.
    ///
    /// Queued transactions in the snapshot are dropped.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self> {
        let config = LedgerConfig::new(snapshot.difficulty);
        Self::from_snapshot_with(snapshot, config)
    }

    /// Like [`Ledger::from_snapshot`], mining future blocks with `config`
    /// instead of the stored difficulty.
    pub fn from_snapshot_with(snapshot: LedgerSnapshot, config: LedgerConfig) -> Result<Self> {
        let LedgerSnapshot {
            chain,
            pending_transactions,
            ..
        } = snapshot;
        if !pending_transactions.is_empty() {
            warn!(
                count = pending_transactions.len(),
                "discarding pending transactions from snapshot"
            );
        }
        Self::from_blocks(chain, config)
    }

    /// Write the ledger to `file`.
    pub fn save(&self, file: &LedgerFile) -> Result<()> {
        file.save(&self.snapshot())?;
        Ok(())
    }

    /// Load a ledger from `file`. A chain that fails validation is still
    /// returned; callers decide what to do with it.
    pub fn load(file: &LedgerFile) -> Result<Self> {
        let ledger = Self::from_snapshot(file.load()?)?;
        if let Err(err) = ledger.verify() {
            warn!(path = %file.path().display(), error = %err, "loaded ledger failed validation");
        }
        Ok(ledger)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Block>> {
        self.chain.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Block>> {
        self.chain.write().unwrap_or_else(PoisonError::into_inner)
    }
}
