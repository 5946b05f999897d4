//! sled-backed patient and doctor directories.

use crate::db::{Result, Storage, StorageError};
use medichain_core::{Doctor, DoctorDirectory, Patient, PatientDirectory, RegistryError};
use tracing::info;

impl From<StorageError> for RegistryError {
    fn from(err: StorageError) -> Self {
        RegistryError::Backend(err.to_string())
    }
}

/// Patient and doctor records persisted in sled.
pub struct RegistryStore<'a> {
    storage: &'a Storage,
}

impl<'a> RegistryStore<'a> {
    /// Create a new RegistryStore wrapping the given storage.
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Register a patient. An existing id keeps its stored record.
    pub fn register_patient(&self, patient: &Patient) -> Result<Patient> {
        let key = Storage::patient_key(&patient.patient_id);
        let stored = self.storage.insert_if_absent(key, patient)?;
        if &stored == patient {
            info!(patient_id = %patient.patient_id, "patient registered");
        }
        Ok(stored)
    }

    /// Register a doctor. An existing id keeps its stored record.
    pub fn register_doctor(&self, doctor: &Doctor) -> Result<Doctor> {
        let key = Storage::doctor_key(&doctor.doctor_id);
        let stored = self.storage.insert_if_absent(key, doctor)?;
        if &stored == doctor {
            info!(doctor_id = %doctor.doctor_id, "doctor registered");
        }
        Ok(stored)
    }

    /// All patients, ordered by id.
    pub fn list_patients(&self) -> Result<Vec<Patient>> {
        self.storage.scan(Storage::PATIENT_PREFIX)
    }

    /// All doctors, ordered by id.
    pub fn list_doctors(&self) -> Result<Vec<Doctor>> {
        self.storage.scan(Storage::DOCTOR_PREFIX)
    }

    fn update_patient<F>(&self, patient_id: &str, f: F) -> Result<bool>
    where
        F: FnMut(&mut Patient),
    {
        let updated = self.storage.update(Storage::patient_key(patient_id), f)?;
        Ok(updated.is_some())
    }
}

impl PatientDirectory for RegistryStore<'_> {
    fn get_patient(&self, patient_id: &str) -> std::result::Result<Option<Patient>, RegistryError> {
        Ok(self.storage.get(Storage::patient_key(patient_id))?)
    }

    fn grant_access(&self, patient_id: &str, doctor_id: &str) -> std::result::Result<bool, RegistryError> {
        Ok(self.update_patient(patient_id, |p| {
            p.grant(doctor_id);
        })?)
    }

    fn revoke_access(&self, patient_id: &str, doctor_id: &str) -> std::result::Result<bool, RegistryError> {
        Ok(self.update_patient(patient_id, |p| {
            p.revoke(doctor_id);
        })?)
    }
}

impl DoctorDirectory for RegistryStore<'_> {
    fn get_doctor(&self, doctor_id: &str) -> std::result::Result<Option<Doctor>, RegistryError> {
        Ok(self.storage.get(Storage::doctor_key(doctor_id))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medichain_core::Keypair;

    fn patient(id: &str) -> Patient {
        Patient::new(id, "Jane Smith", 28, "Female", "jane@example.com", Keypair::generate().public_key)
    }

    fn doctor(id: &str) -> Doctor {
        Doctor::new(id, "Bob Wilson", "Neurology", "LIC002", "Metro Medical", Keypair::generate().public_key)
    }

    #[test]
    fn test_register_and_get() {
        let storage = Storage::open_temporary().unwrap();
        let registry = RegistryStore::new(&storage);

        let p = patient("PAT001");
        registry.register_patient(&p).unwrap();
        assert_eq!(registry.get_patient("PAT001").unwrap(), Some(p));
        assert_eq!(registry.get_patient("PAT999").unwrap(), None);

        let d = doctor("DOC001");
        registry.register_doctor(&d).unwrap();
        assert_eq!(registry.lookup_public_key("DOC001").unwrap(), Some(d.public_key));
    }

    #[test]
    fn test_register_is_idempotent() {
        let storage = Storage::open_temporary().unwrap();
        let registry = RegistryStore::new(&storage);

        let first = registry.register_patient(&patient("PAT001")).unwrap();
        let second = registry.register_patient(&patient("PAT001")).unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.list_patients().unwrap().len(), 1);
    }

    #[test]
    fn test_grant_and_revoke_persist() {
        let storage = Storage::open_temporary().unwrap();
        let registry = RegistryStore::new(&storage);
        registry.register_patient(&patient("PAT001")).unwrap();

        assert!(registry.grant_access("PAT001", "DOC001").unwrap());
        assert!(registry.grant_access("PAT001", "DOC001").unwrap());
        assert!(registry.grant_access("PAT001", "DOC002").unwrap());
        let grants = registry.lookup_access_grants("PAT001").unwrap().unwrap();
        assert_eq!(grants.len(), 2);

        assert!(registry.revoke_access("PAT001", "DOC001").unwrap());
        let grants = registry.lookup_access_grants("PAT001").unwrap().unwrap();
        assert!(!grants.contains("DOC001"));
        assert!(grants.contains("DOC002"));
    }

    #[test]
    fn test_grant_unknown_patient() {
        let storage = Storage::open_temporary().unwrap();
        let registry = RegistryStore::new(&storage);
        assert!(!registry.grant_access("nobody", "DOC001").unwrap());
        assert!(!registry.revoke_access("nobody", "DOC001").unwrap());
        assert!(!storage.contains(Storage::patient_key("nobody")).unwrap());
    }

    #[test]
    fn test_list_ordering() {
        let storage = Storage::open_temporary().unwrap();
        let registry = RegistryStore::new(&storage);
        for id in ["DOC003", "DOC001", "DOC002"] {
            registry.register_doctor(&doctor(id)).unwrap();
        }
        let ids: Vec<_> = registry
            .list_doctors()
            .unwrap()
            .into_iter()
            .map(|d| d.doctor_id)
            .collect();
        assert_eq!(ids, vec!["DOC001", "DOC002", "DOC003"]);
    }
}
