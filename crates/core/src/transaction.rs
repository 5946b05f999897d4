//! EMR-creation transactions and signing payloads.

use crate::block::current_timestamp;
use crate::canonical::{to_canonical_bytes, CanonicalError};
use crate::crypto::{sign_canonical, verify_canonical, PrivateKey, PublicKey, Signature};
use serde::{Deserialize, Serialize};

/// Transaction kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// A new medical record was stored and its pointer committed.
    #[serde(rename = "EMR_CREATION")]
    EmrCreation,
}

/// The fields a doctor signs when creating a record.
///
/// Signature and timestamp are not covered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningPayload<'a> {
    pub patient_id: &'a str,
    pub doctor_id: &'a str,
    #[serde(rename = "ipfs_hash")]
    pub content_pointer: &'a str,
    #[serde(rename = "encrypted_session_key")]
    pub encrypted_key_material: &'a str,
}

impl<'a> SigningPayload<'a> {
    pub fn new(
        patient_id: &'a str,
        doctor_id: &'a str,
        content_pointer: &'a str,
        encrypted_key_material: &'a str,
    ) -> Self {
        Self {
            patient_id,
            doctor_id,
            content_pointer,
            encrypted_key_material,
        }
    }

    /// Canonical bytes that are signed and verified.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CanonicalError> {
        to_canonical_bytes(self)
    }

    /// Sign with the doctor's private key.
    pub fn sign(&self, key: &PrivateKey) -> Result<Signature, CanonicalError> {
        sign_canonical(self, key)
    }

    /// Verify against the doctor's public key.
    pub fn verify(&self, signature: &Signature, key: &PublicKey) -> bool {
        verify_canonical(self, signature, key)
    }
}

/// An EMR-creation record committed to the ledger.
///
/// Field names on the wire follow the persisted ledger format
/// (`type`, `ipfs_hash`, `encrypted_session_key`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub patient_id: String,
    pub doctor_id: String,
    /// Opaque reference into the content store.
    #[serde(rename = "ipfs_hash")]
    pub content_pointer: String,
    /// Opaque key material for the stored ciphertext.
    #[serde(rename = "encrypted_session_key")]
    pub encrypted_key_material: String,
    pub signature: Signature,
    pub timestamp: String,
}

impl Transaction {
    /// Create an EMR-creation transaction stamped with the current time.
    pub fn emr_creation(
        patient_id: impl Into<String>,
        doctor_id: impl Into<String>,
        content_pointer: impl Into<String>,
        encrypted_key_material: impl Into<String>,
        signature: Signature,
    ) -> Self {
        Self {
            kind: TransactionKind::EmrCreation,
            patient_id: patient_id.into(),
            doctor_id: doctor_id.into(),
            content_pointer: content_pointer.into(),
            encrypted_key_material: encrypted_key_material.into(),
            signature,
            timestamp: current_timestamp(),
        }
    }

    /// The payload covered by `signature`.
    pub fn signing_payload(&self) -> SigningPayload<'_> {
        SigningPayload::new(
            &self.patient_id,
            &self.doctor_id,
            &self.content_pointer,
            &self.encrypted_key_material,
        )
    }

    /// Verify the embedded signature.
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        self.signing_payload().verify(&self.signature, public_key)
    }

    /// Check if this is an EMR-creation record.
    pub fn is_emr_creation(&self) -> bool {
        self.kind == TransactionKind::EmrCreation
    }
}

/// Conjunctive filter over transactions; absent fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub patient_id: Option<String>,
    pub doctor_id: Option<String>,
}

impl TransactionFilter {
    /// A filter that matches every transaction.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one patient.
    pub fn patient(mut self, patient_id: impl Into<String>) -> Self {
        self.patient_id = Some(patient_id.into());
        self
    }

    /// Restrict to one doctor.
    pub fn doctor(mut self, doctor_id: impl Into<String>) -> Self {
        self.doctor_id = Some(doctor_id.into());
        self
    }

    /// Check whether a transaction satisfies every provided field.
    pub fn matches(&self, tx: &Transaction) -> bool {
        if !tx.is_emr_creation() {
            return false;
        }
        if let Some(patient_id) = &self.patient_id {
            if &tx.patient_id != patient_id {
                return false;
            }
        }
        if let Some(doctor_id) = &self.doctor_id {
            if &tx.doctor_id != doctor_id {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn signed_tx(kp: &Keypair, patient: &str, doctor: &str) -> Transaction {
        let sig = SigningPayload::new(patient, doctor, "abc", "xyz")
            .sign(kp.private_key())
            .unwrap();
        Transaction::emr_creation(patient, doctor, "abc", "xyz", sig)
    }

    #[test]
    fn test_signing_payload_canonical_form() {
        let payload = SigningPayload::new("P1", "D1", "abc", "xyz");
        let bytes = payload.canonical_bytes().unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"doctor_id": "D1", "encrypted_session_key": "xyz", "ipfs_hash": "abc", "patient_id": "P1"}"#
        );
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = Keypair::generate();
        let tx = signed_tx(&kp, "P1", "D1");
        assert!(tx.verify(&kp.public_key));
    }

    #[test]
    fn test_tampered_field_fails_verification() {
        let kp = Keypair::generate();
        let mut tx = signed_tx(&kp, "P1", "D1");
        tx.content_pointer = "abd".into();
        assert!(!tx.verify(&kp.public_key));
    }

    #[test]
    fn test_timestamp_not_covered_by_signature() {
        let kp = Keypair::generate();
        let mut tx = signed_tx(&kp, "P1", "D1");
        tx.timestamp = "2000-01-01T00:00:00.000000".into();
        assert!(tx.verify(&kp.public_key));
    }

    #[test]
    fn test_wire_field_names() {
        let kp = Keypair::generate();
        let tx = signed_tx(&kp, "P1", "D1");
        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["type"], "EMR_CREATION");
        assert_eq!(value["ipfs_hash"], "abc");
        assert_eq!(value["encrypted_session_key"], "xyz");
        assert_eq!(value["signature"], tx.signature.to_hex());

        let back: Transaction = serde_json::from_value(value).unwrap();
        assert_eq!(back, tx);
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let kp = Keypair::generate();
        let tx = signed_tx(&kp, "P1", "D1");

        assert!(TransactionFilter::all().matches(&tx));
        assert!(TransactionFilter::all().patient("P1").matches(&tx));
        assert!(TransactionFilter::all().doctor("D1").matches(&tx));
        assert!(TransactionFilter::all().patient("P1").doctor("D1").matches(&tx));
        assert!(!TransactionFilter::all().patient("P1").doctor("D2").matches(&tx));
        assert!(!TransactionFilter::all().patient("P2").matches(&tx));
    }
}
