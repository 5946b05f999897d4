//! sled database wrapper with serialization helpers.

use medichain_core::CryptoError;
use sled::Db;
use std::path::Path;
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Key material error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Invalid key id: {0:?}")]
    InvalidKeyId(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Wrapper around sled database with serialization helpers.
pub struct Storage {
    db: Db,
}

impl Storage {
    /// Open a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open an in-memory database (for testing).
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Store a serializable value.
    pub fn put<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: serde::Serialize,
    {
        let encoded = bincode::serialize(value)?;
        self.db.insert(key, encoded)?;
        Ok(())
    }

    /// Retrieve and deserialize a value.
    pub fn get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: serde::de::DeserializeOwned,
    {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store raw bytes only if the key is vacant. Returns `true` if this
    /// call wrote them.
    pub fn put_raw_if_absent<K: AsRef<[u8]>>(&self, key: K, bytes: &[u8]) -> Result<bool> {
        let swapped = self
            .db
            .compare_and_swap(key, None as Option<&[u8]>, Some(bytes))?;
        Ok(swapped.is_ok())
    }

    /// Retrieve raw bytes.
    pub fn get_raw<K: AsRef<[u8]>>(&self, key: K) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|ivec| ivec.to_vec()))
    }

    /// Delete a key. Returns `true` if it existed.
    pub fn delete<K: AsRef<[u8]>>(&self, key: K) -> Result<bool> {
        Ok(self.db.remove(key)?.is_some())
    }

    /// Check if a key exists.
    pub fn contains<K: AsRef<[u8]>>(&self, key: K) -> Result<bool> {
        Ok(self.db.contains_key(key)?)
    }

    /// Decode every value stored under `prefix`, in key order.
    pub fn scan<V>(&self, prefix: &[u8]) -> Result<Vec<V>>
    where
        V: serde::de::DeserializeOwned,
    {
        self.db
            .scan_prefix(prefix)
            .map(|entry| {
                let (_, bytes) = entry?;
                Ok(bincode::deserialize(&bytes)?)
            })
            .collect()
    }

    /// Read-modify-write a stored value.
    ///
    /// Returns `Ok(None)` without writing if the key is absent. Runs as a
    /// sled compare-and-swap loop, so concurrent updates are not lost.
    pub fn update<K, V, F>(&self, key: K, mut f: F) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: serde::Serialize + serde::de::DeserializeOwned,
        F: FnMut(&mut V),
    {
        let key = key.as_ref();
        loop {
            let Some(current) = self.db.get(key)? else {
                return Ok(None);
            };
            let mut value: V = bincode::deserialize(&current)?;
            f(&mut value);
            let encoded = bincode::serialize(&value)?;
            match self.db.compare_and_swap(key, Some(current), Some(encoded))? {
                Ok(()) => return Ok(Some(value)),
                Err(_) => continue,
            }
        }
    }

    /// Insert a value only if the key is vacant.
    ///
    /// Returns the stored value: the new one, or the one already present.
    pub fn insert_if_absent<K, V>(&self, key: K, value: &V) -> Result<V>
    where
        K: AsRef<[u8]>,
        V: serde::Serialize + serde::de::DeserializeOwned + Clone,
    {
        let key = key.as_ref();
        let encoded = bincode::serialize(value)?;
        match self.db.compare_and_swap(key, None as Option<&[u8]>, Some(encoded))? {
            Ok(()) => Ok(value.clone()),
            Err(existing) => match existing.current {
                Some(bytes) => Ok(bincode::deserialize(&bytes)?),
                None => Err(StorageError::NotFound(String::from_utf8_lossy(key).into_owned())),
            },
        }
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // =========================================================================
    // Key Construction Helpers
    // =========================================================================

    /// Prefix shared by all patient records.
    pub const PATIENT_PREFIX: &'static [u8] = b"patient:";

    /// Prefix shared by all doctor records.
    pub const DOCTOR_PREFIX: &'static [u8] = b"doctor:";

    /// Create a prefixed key for a patient.
    /// Format: "patient:{patient_id}"
    pub fn patient_key(patient_id: &str) -> Vec<u8> {
        format!("patient:{}", patient_id).into_bytes()
    }

    /// Create a prefixed key for a doctor.
    /// Format: "doctor:{doctor_id}"
    pub fn doctor_key(doctor_id: &str) -> Vec<u8> {
        format!("doctor:{}", doctor_id).into_bytes()
    }

    /// Create a prefixed key for a content blob.
    /// Format: "content:{pointer}"
    pub fn content_key(pointer: &str) -> Vec<u8> {
        format!("content:{}", pointer).into_bytes()
    }
}
