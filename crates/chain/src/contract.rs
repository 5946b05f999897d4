//! Authorization gate for record creation.
//!
//! Each request walks four steps and stops at the first failure:
//!
//! 1. the patient must have granted the doctor access
//! 2. the doctor must be registered with a public key
//! 3. the doctor's signature must cover the request
//! 4. the transaction is mined onto the ledger
//!
//! A rejected request never reaches the ledger.

use crate::ledger::{Ledger, LedgerError};
use medichain_consensus::CancelToken;
use medichain_core::{
    Block, CanonicalError, DoctorDirectory, PatientDirectory, PrivateKey, PublicKey,
    RegistryError, Signature, SigningPayload, Transaction,
};
use thiserror::Error;
use tracing::{info, warn};

/// Reasons a gate operation is refused or fails.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("doctor {doctor_id} is not authorized for patient {patient_id}")]
    AccessDenied {
        patient_id: String,
        doctor_id: String,
    },

    #[error("unknown doctor: {doctor_id}")]
    UnknownPrincipal { doctor_id: String },

    #[error("signature from doctor {doctor_id} does not verify")]
    InvalidSignature { doctor_id: String },

    #[error("patient not found: {patient_id}")]
    PatientNotFound { patient_id: String },

    #[error("directory error: {0}")]
    Registry(#[from] RegistryError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl GateError {
    /// Whether the request itself was refused, as opposed to a backend failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            GateError::AccessDenied { .. }
                | GateError::UnknownPrincipal { .. }
                | GateError::InvalidSignature { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GateError>;

/// A doctor's signed request to commit a record pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRequest {
    pub patient_id: String,
    pub doctor_id: String,
    pub content_pointer: String,
    pub encrypted_key_material: String,
    pub signature: Signature,
}

impl RecordRequest {
    pub fn new(
        patient_id: impl Into<String>,
        doctor_id: impl Into<String>,
        content_pointer: impl Into<String>,
        encrypted_key_material: impl Into<String>,
        signature: Signature,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            doctor_id: doctor_id.into(),
            content_pointer: content_pointer.into(),
            encrypted_key_material: encrypted_key_material.into(),
            signature,
        }
    }

    /// Build a request and sign it with the doctor's key.
    pub fn signed(
        patient_id: impl Into<String>,
        doctor_id: impl Into<String>,
        content_pointer: impl Into<String>,
        encrypted_key_material: impl Into<String>,
        key: &PrivateKey,
    ) -> std::result::Result<Self, CanonicalError> {
        let mut request = Self::new(
            patient_id,
            doctor_id,
            content_pointer,
            encrypted_key_material,
            Signature::default(),
        );
        request.signature = request.signing_payload().sign(key)?;
        Ok(request)
    }

    pub fn signing_payload(&self) -> SigningPayload<'_> {
        SigningPayload::new(
            &self.patient_id,
            &self.doctor_id,
            &self.content_pointer,
            &self.encrypted_key_material,
        )
    }

    fn into_transaction(self) -> Transaction {
        Transaction::emr_creation(
            self.patient_id,
            self.doctor_id,
            self.content_pointer,
            self.encrypted_key_material,
            self.signature,
        )
    }
}

/// Gate in front of a [`Ledger`], with the directories it consults passed in.
pub struct AuthorizationGate<'a, P: ?Sized, D: ?Sized> {
    ledger: &'a Ledger,
    patients: &'a P,
    doctors: &'a D,
}

impl<'a, P, D> AuthorizationGate<'a, P, D>
where
    P: PatientDirectory + ?Sized,
    D: DoctorDirectory + ?Sized,
{
    pub fn new(ledger: &'a Ledger, patients: &'a P, doctors: &'a D) -> Self {
        Self {
            ledger,
            patients,
            doctors,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        self.ledger
    }

    /// Run the access, identity and signature checks without committing.
    ///
    /// Returns the doctor's public key on success.
    pub fn authorize(&self, request: &RecordRequest) -> Result<PublicKey> {
        let granted = self
            .patients
            .lookup_access_grants(&request.patient_id)?
            .is_some_and(|grants| grants.contains(&request.doctor_id));
        if !granted {
            return Err(GateError::AccessDenied {
                patient_id: request.patient_id.clone(),
                doctor_id: request.doctor_id.clone(),
            });
        }

        let public_key = self
            .doctors
            .lookup_public_key(&request.doctor_id)?
            .ok_or_else(|| GateError::UnknownPrincipal {
                doctor_id: request.doctor_id.clone(),
            })?;

        if !request.signing_payload().verify(&request.signature, &public_key) {
            return Err(GateError::InvalidSignature {
                doctor_id: request.doctor_id.clone(),
            });
        }

        Ok(public_key)
    }

    /// Authorize `request` and append it to the ledger.
    pub fn process(&self, request: RecordRequest) -> Result<Block> {
        self.process_with(request, &CancelToken::new())
    }

    /// Like [`AuthorizationGate::process`] with a cancellable mining step.
    pub fn process_with(&self, request: RecordRequest, cancel: &CancelToken) -> Result<Block> {
        if let Err(err) = self.authorize(&request) {
            warn!(
                patient_id = %request.patient_id,
                doctor_id = %request.doctor_id,
                error = %err,
                "record request rejected"
            );
            return Err(err);
        }

        let block = self
            .ledger
            .append_transaction_with(request.into_transaction(), cancel)?;
        Ok(block)
    }

    /// Authorize `doctor_id` for the patient's records. Idempotent.
    pub fn grant_access(&self, patient_id: &str, doctor_id: &str) -> Result<()> {
        if !self.patients.grant_access(patient_id, doctor_id)? {
            return Err(GateError::PatientNotFound {
                patient_id: patient_id.to_string(),
            });
        }
        info!(patient_id, doctor_id, "access granted");
        Ok(())
    }

    /// Withdraw `doctor_id`'s authorization. Idempotent.
    pub fn revoke_access(&self, patient_id: &str, doctor_id: &str) -> Result<()> {
        if !self.patients.revoke_access(patient_id, doctor_id)? {
            return Err(GateError::PatientNotFound {
                patient_id: patient_id.to_string(),
            });
        }
        info!(patient_id, doctor_id, "access revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerConfig;
    use medichain_core::{Doctor, Keypair, MemoryDirectory, Patient};

    struct Fixture {
        ledger: Ledger,
        directory: MemoryDirectory,
        doctor_key: Keypair,
    }

    fn fixture() -> Fixture {
        let directory = MemoryDirectory::new();
        let doctor_key = Keypair::generate();
        directory.register_patient(Patient::new(
            "P1",
            "John Doe",
            35,
            "Male",
            "john@example.com",
            Keypair::generate().public_key,
        ));
        directory.register_doctor(Doctor::new(
            "D1",
            "Alice Brown",
            "Cardiology",
            "LIC001",
            "City General",
            doctor_key.public_key.clone(),
        ));
        Fixture {
            ledger: Ledger::new(LedgerConfig::new(1)).unwrap(),
            directory,
            doctor_key,
        }
    }

    fn request(f: &Fixture) -> RecordRequest {
        RecordRequest::signed("P1", "D1", "abc", "xyz", f.doctor_key.private_key()).unwrap()
    }

    #[test]
    fn test_ungranted_doctor_denied() {
        let f = fixture();
        let gate = AuthorizationGate::new(&f.ledger, &f.directory, &f.directory);

        let err = gate.process(request(&f)).unwrap_err();
        assert!(matches!(err, GateError::AccessDenied { .. }));
        assert!(err.is_rejection());
        assert_eq!(f.ledger.len(), 1);
    }

    #[test]
    fn test_granted_request_commits() {
        let f = fixture();
        let gate = AuthorizationGate::new(&f.ledger, &f.directory, &f.directory);
        gate.grant_access("P1", "D1").unwrap();

        let block = gate.process(request(&f)).unwrap();
        assert_eq!(block.index(), 1);
        let tx = &block.transactions()[0];
        assert_eq!(tx.patient_id, "P1");
        assert_eq!(tx.content_pointer, "abc");
        assert!(tx.verify(&f.doctor_key.public_key));
        assert_eq!(f.ledger.len(), 2);
    }

    #[test]
    fn test_revoked_doctor_denied_again() {
        let f = fixture();
        let gate = AuthorizationGate::new(&f.ledger, &f.directory, &f.directory);
        gate.grant_access("P1", "D1").unwrap();
        gate.process(request(&f)).unwrap();
        gate.revoke_access("P1", "D1").unwrap();

        assert!(matches!(
            gate.process(request(&f)),
            Err(GateError::AccessDenied { .. })
        ));
        assert_eq!(f.ledger.len(), 2);
    }

    #[test]
    fn test_unknown_doctor() {
        let f = fixture();
        let gate = AuthorizationGate::new(&f.ledger, &f.directory, &f.directory);
        gate.grant_access("P1", "D9").unwrap();

        let stranger = Keypair::generate();
        let req = RecordRequest::signed("P1", "D9", "abc", "xyz", stranger.private_key()).unwrap();
        assert!(matches!(
            gate.process(req),
            Err(GateError::UnknownPrincipal { doctor_id }) if doctor_id == "D9"
        ));
    }

    #[test]
    fn test_wrong_key_signature_rejected() {
        let f = fixture();
        let gate = AuthorizationGate::new(&f.ledger, &f.directory, &f.directory);
        gate.grant_access("P1", "D1").unwrap();

        let impostor = Keypair::generate();
        let req = RecordRequest::signed("P1", "D1", "abc", "xyz", impostor.private_key()).unwrap();
        assert!(matches!(
            gate.process(req),
            Err(GateError::InvalidSignature { .. })
        ));
        assert_eq!(f.ledger.len(), 1);
    }

    #[test]
    fn test_tampered_request_rejected() {
        let f = fixture();
        let gate = AuthorizationGate::new(&f.ledger, &f.directory, &f.directory);
        gate.grant_access("P1", "D1").unwrap();

        let mut req = request(&f);
        req.content_pointer = "abd".into();
        assert!(matches!(
            gate.process(req),
            Err(GateError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_malformed_signature_rejected() {
        let f = fixture();
        let gate = AuthorizationGate::new(&f.ledger, &f.directory, &f.directory);
        gate.grant_access("P1", "D1").unwrap();

        let mut req = request(&f);
        req.signature = Signature::from_bytes(vec![1, 2, 3]);
        assert!(matches!(
            gate.process(req),
            Err(GateError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn test_access_checked_before_identity() {
        let f = fixture();
        let gate = AuthorizationGate::new(&f.ledger, &f.directory, &f.directory);
        let req = RecordRequest::signed("P1", "D9", "abc", "xyz", f.doctor_key.private_key()).unwrap();
        assert!(matches!(gate.process(req), Err(GateError::AccessDenied { .. })));
    }

    #[test]
    fn test_unknown_patient() {
        let f = fixture();
        let gate = AuthorizationGate::new(&f.ledger, &f.directory, &f.directory);

        assert!(matches!(
            gate.grant_access("P9", "D1"),
            Err(GateError::PatientNotFound { .. })
        ));
        assert!(matches!(
            gate.revoke_access("P9", "D1"),
            Err(GateError::PatientNotFound { .. })
        ));

        let req = RecordRequest::signed("P9", "D1", "abc", "xyz", f.doctor_key.private_key()).unwrap();
        assert!(matches!(gate.process(req), Err(GateError::AccessDenied { .. })));
    }

    #[test]
    fn test_grant_and_revoke_idempotent() {
        let f = fixture();
        let gate = AuthorizationGate::new(&f.ledger, &f.directory, &f.directory);
        gate.grant_access("P1", "D1").unwrap();
        gate.grant_access("P1", "D1").unwrap();
        gate.revoke_access("P1", "D1").unwrap();
        gate.revoke_access("P1", "D1").unwrap();
        let grants = f.directory.lookup_access_grants("P1").unwrap().unwrap();
        assert!(grants.is_empty());
    }

    #[test]
    fn test_dyn_directories() {
        let f = fixture();
        let patients: &dyn PatientDirectory = &f.directory;
        let doctors: &dyn DoctorDirectory = &f.directory;
        let gate = AuthorizationGate::new(&f.ledger, patients, doctors);
        gate.grant_access("P1", "D1").unwrap();
        assert!(gate.authorize(&request(&f)).is_ok());
    }
}
