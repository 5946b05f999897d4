//! CLI commands module.

use anyhow::{Context, Result};
use clap::Subcommand;
use medichain_chain::{Ledger, LedgerConfig};
use medichain_storage::{KeyStore, LedgerFile, Storage};
use std::fs;
use std::path::{Path, PathBuf};

mod access;
mod chain;
mod doctor;
mod init;
mod patient;
mod record;

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ledger
    Init(init::InitArgs),
    /// Patient registration and lookup
    Patient(patient::PatientArgs),
    /// Doctor registration and lookup
    Doctor(doctor::DoctorArgs),
    /// Grant or revoke a doctor's access to a patient's records
    Access(access::AccessArgs),
    /// Create and list medical records
    Record(record::RecordArgs),
    /// Inspect and validate the chain
    Chain(chain::ChainArgs),
}

pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init(args) => init::run(args),
        Commands::Patient(args) => patient::run(args),
        Commands::Doctor(args) => doctor::run(args),
        Commands::Access(args) => access::run(args),
        Commands::Record(args) => record::run(args),
        Commands::Chain(args) => chain::run(args),
    }
}

/// Layout of a medichain data directory.
pub(crate) struct DataDir {
    root: PathBuf,
}

impl DataDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    pub fn ledger_file(&self) -> LedgerFile {
        LedgerFile::new(self.root.join("ledger.json"))
    }

    pub fn keys(&self) -> KeyStore {
        KeyStore::new(self.root.join("keys"))
    }

    pub fn open_storage(&self) -> Result<Storage> {
        Storage::open(self.root.join("db")).with_context(|| {
            format!(
                "Failed to open storage in {}. Did you run 'medichain init'?",
                self.root.display()
            )
        })
    }

    pub fn save_config(&self, config: &LedgerConfig) -> Result<PathBuf> {
        let path = self.config_path();
        fs::write(&path, serde_json::to_string_pretty(config)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn load_config(&self) -> Result<LedgerConfig> {
        let contents = fs::read_to_string(self.config_path())
            .context("Failed to read config.json. Did you run 'medichain init'?")?;
        serde_json::from_str(&contents).context("Invalid config.json")
    }

    /// Open storage, then load the ledger while holding it.
    ///
    /// sled keeps an exclusive lock on `db/` until the returned `Storage` is
    /// dropped, so a second process cannot read the tip until this one has
    /// saved its append.
    pub fn open_for_update(&self) -> Result<(Storage, Ledger)> {
        let storage = self.open_storage()?;
        let ledger = self.load_ledger()?;
        Ok((storage, ledger))
    }

    /// Load the ledger with the mining settings from `config.json`.
    pub fn load_ledger(&self) -> Result<Ledger> {
        let config = self.load_config()?;
        let snapshot = self
            .ledger_file()
            .load()
            .context("Failed to read ledger.json. Did you run 'medichain init'?")?;
        Ok(Ledger::from_snapshot_with(snapshot, config)?)
    }

    pub fn save_ledger(&self, ledger: &Ledger) -> Result<()> {
        ledger
            .save(&self.ledger_file())
            .context("Failed to write ledger.json")
    }
}
