//! JSON ledger file.
//!
//! ```text
//! {"chain": [{index, timestamp, data, previous_hash, nonce, hash}, ...],
//!  "difficulty": 4,
//!  "pending_transactions": []}
//! ```
//!
//! Loading assigns fields as stored. Nothing is re-mined or re-validated.

use crate::db::{Result, StorageError};
use medichain_core::{Block, Transaction};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Serialized form of a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub chain: Vec<Block>,
    pub difficulty: u32,
    #[serde(default)]
    pub pending_transactions: Vec<Transaction>,
}

impl LedgerSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Ledger snapshot persisted at a fixed path.
#[derive(Debug, Clone)]
pub struct LedgerFile {
    path: PathBuf,
}

impl LedgerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the snapshot. A temporary sibling file is renamed over the
    /// target so readers never see a partial ledger.
    pub fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, snapshot.to_json()?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn load(&self) -> Result<LedgerSnapshot> {
        if !self.exists() {
            return Err(StorageError::NotFound(self.path.display().to_string()));
        }
        LedgerSnapshot::from_json(&fs::read_to_string(&self.path)?)
    }
}
