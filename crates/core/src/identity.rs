//! Patient and doctor identities, and the directories that hold them.
//!
//! The ledger only ever reads a doctor's public key and a patient's access
//! grants; grants are mutated solely through
//! [`PatientDirectory::grant_access`] and [`PatientDirectory::revoke_access`].

use crate::crypto::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Errors raised by a directory backend.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("directory backend failure: {0}")]
    Backend(String),
}

/// A registered patient and the doctors they have authorized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub contact_info: String,
    pub authorized_doctors: BTreeSet<String>,
    pub public_key: PublicKey,
}

impl Patient {
    /// Create a patient with no access grants.
    pub fn new(
        patient_id: impl Into<String>,
        name: impl Into<String>,
        age: u32,
        gender: impl Into<String>,
        contact_info: impl Into<String>,
        public_key: PublicKey,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            name: name.into(),
            age,
            gender: gender.into(),
            contact_info: contact_info.into(),
            authorized_doctors: BTreeSet::new(),
            public_key,
        }
    }

    /// Authorize a doctor. Returns `false` if already authorized.
    pub fn grant(&mut self, doctor_id: &str) -> bool {
        self.authorized_doctors.insert(doctor_id.to_string())
    }

    /// Remove a doctor's authorization. Returns `false` if not authorized.
    pub fn revoke(&mut self, doctor_id: &str) -> bool {
        self.authorized_doctors.remove(doctor_id)
    }

    /// Check if a doctor is authorized.
    pub fn has_access(&self, doctor_id: &str) -> bool {
        self.authorized_doctors.contains(doctor_id)
    }
}

/// A registered doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub doctor_id: String,
    pub name: String,
    pub specialization: String,
    pub license_number: String,
    pub hospital: String,
    pub public_key: PublicKey,
}

impl Doctor {
    pub fn new(
        doctor_id: impl Into<String>,
        name: impl Into<String>,
        specialization: impl Into<String>,
        license_number: impl Into<String>,
        hospital: impl Into<String>,
        public_key: PublicKey,
    ) -> Self {
        Self {
            doctor_id: doctor_id.into(),
            name: name.into(),
            specialization: specialization.into(),
            license_number: license_number.into(),
            hospital: hospital.into(),
            public_key,
        }
    }
}

/// Patient lookups and grant mutation.
pub trait PatientDirectory {
    /// Look up a patient by id.
    fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>, RegistryError>;

    /// Add `doctor_id` to the patient's grants. Returns `false` if the patient
    /// does not exist. Idempotent.
    fn grant_access(&self, patient_id: &str, doctor_id: &str) -> Result<bool, RegistryError>;

    /// Remove `doctor_id` from the patient's grants. Returns `false` if the
    /// patient does not exist. Idempotent.
    fn revoke_access(&self, patient_id: &str, doctor_id: &str) -> Result<bool, RegistryError>;

    /// The set of doctors the patient has authorized, or `None` for an
    /// unknown patient.
    fn lookup_access_grants(
        &self,
        patient_id: &str,
    ) -> Result<Option<BTreeSet<String>>, RegistryError> {
        Ok(self.get_patient(patient_id)?.map(|p| p.authorized_doctors))
    }
}

/// Doctor lookups.
pub trait DoctorDirectory {
    /// Look up a doctor by id.
    fn get_doctor(&self, doctor_id: &str) -> Result<Option<Doctor>, RegistryError>;

    /// The doctor's public key, or `None` for an unknown doctor.
    fn lookup_public_key(&self, doctor_id: &str) -> Result<Option<PublicKey>, RegistryError> {
        Ok(self.get_doctor(doctor_id)?.map(|d| d.public_key))
    }
}

/// In-memory patient and doctor directory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    patients: RwLock<HashMap<String, Patient>>,
    doctors: RwLock<HashMap<String, Doctor>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a patient. An existing id keeps its stored record.
    pub fn register_patient(&self, patient: Patient) -> Patient {
        let mut patients = self.patients.write().unwrap_or_else(PoisonError::into_inner);
        patients
            .entry(patient.patient_id.clone())
            .or_insert(patient)
            .clone()
    }

    /// Register a doctor. An existing id keeps its stored record.
    pub fn register_doctor(&self, doctor: Doctor) -> Doctor {
        let mut doctors = self.doctors.write().unwrap_or_else(PoisonError::into_inner);
        doctors
            .entry(doctor.doctor_id.clone())
            .or_insert(doctor)
            .clone()
    }

    fn update_patient<F>(&self, patient_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Patient),
    {
        let mut patients = self.patients.write().unwrap_or_else(PoisonError::into_inner);
        match patients.get_mut(patient_id) {
            Some(patient) => {
                f(patient);
                true
            }
            None => false,
        }
    }
}

impl PatientDirectory for MemoryDirectory {
    fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>, RegistryError> {
        let patients = self.patients.read().unwrap_or_else(PoisonError::into_inner);
        Ok(patients.get(patient_id).cloned())
    }

    fn grant_access(&self, patient_id: &str, doctor_id: &str) -> Result<bool, RegistryError> {
        Ok(self.update_patient(patient_id, |p| {
            p.grant(doctor_id);
        }))
    }

    fn revoke_access(&self, patient_id: &str, doctor_id: &str) -> Result<bool, RegistryError> {
        Ok(self.update_patient(patient_id, |p| {
            p.revoke(doctor_id);
        }))
    }
}

impl DoctorDirectory for MemoryDirectory {
    fn get_doctor(&self, doctor_id: &str) -> Result<Option<Doctor>, RegistryError> {
        let doctors = self.doctors.read().unwrap_or_else(PoisonError::into_inner);
        Ok(doctors.get(doctor_id).cloned())
    }
}
