//! Persistent storage layer for medichain.
//!
//! This crate provides everything the ledger keeps on disk:
//! - Patient and doctor directories (sled)
//! - Content-addressed record blobs (sled)
//! - The JSON ledger file
//! - Per-principal private key files
//!
//! # Architecture
//!
//! ```text
//! data_dir/
//! ├── config.json
//! ├── ledger.json          LedgerFile
//! ├── keys/<id>.json       KeyStore
//! └── db/                  Storage (sled)
//!     ├── patient:<id>     RegistryStore
//!     ├── doctor:<id>      RegistryStore
//!     └── content:<ptr>    SledContentStore
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use medichain_core::{Keypair, Patient, PatientDirectory};
//! use medichain_storage::{RegistryStore, Storage};
//!
//! let storage = Storage::open("./data/db").unwrap();
//! let registry = RegistryStore::new(&storage);
//!
//! let patient = Patient::new("PAT001", "John Doe", 35, "Male", "john@example.com",
//!     Keypair::generate().public_key);
//! registry.register_patient(&patient).unwrap();
//! registry.grant_access("PAT001", "DOC001").unwrap();
//! ```

pub mod content;
pub mod db;
pub mod keys;
pub mod ledger_file;
pub mod registry;

pub use content::{ContentStore, SledContentStore};
pub use db::{Result, Storage, StorageError};
pub use keys::KeyStore;
pub use ledger_file::{LedgerFile, LedgerSnapshot};
pub use registry::RegistryStore;
