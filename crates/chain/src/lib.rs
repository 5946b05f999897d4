//! Ledger orchestration for medichain.
//!
//! This crate ties the pieces together:
//! - **Ledger**: hash-linked proof-of-work chain of record transactions
//! - **AuthorizationGate**: access, identity and signature checks in front of
//!   every append
//!
//! # Example
//!
//! ```rust,no_run
//! use medichain_chain::{AuthorizationGate, Ledger, LedgerConfig, RecordRequest};
//! use medichain_core::{Doctor, Keypair, MemoryDirectory, Patient, TransactionFilter};
//!
//! let directory = MemoryDirectory::new();
//! let doctor_key = Keypair::generate();
//! directory.register_patient(Patient::new("P1", "John Doe", 35, "Male", "john@example.com",
//!     Keypair::generate().public_key));
//! directory.register_doctor(Doctor::new("D1", "Alice Brown", "Cardiology", "LIC001",
//!     "City General", doctor_key.public_key.clone()));
//!
//! let ledger = Ledger::new(LedgerConfig::new(2)).unwrap();
//! let gate = AuthorizationGate::new(&ledger, &directory, &directory);
//! gate.grant_access("P1", "D1").unwrap();
//!
//! let request = RecordRequest::signed("P1", "D1", "abc", "xyz", doctor_key.private_key()).unwrap();
//! gate.process(request).unwrap();
//!
//! assert!(ledger.validate());
//! assert_eq!(ledger.query_transactions(&TransactionFilter::all().patient("P1")).len(), 1);
//! ```

pub mod contract;
pub mod ledger;

pub use contract::{AuthorizationGate, GateError, RecordRequest};
pub use ledger::{Ledger, LedgerConfig, LedgerError, LedgerStats};
