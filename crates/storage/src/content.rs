//! Content-addressed blob storage for record ciphertexts.

use crate::db::{Result, Storage};
use medichain_core::hash;
use tracing::debug;

/// A store that hands back an opaque pointer for every blob it keeps.
pub trait ContentStore {
    /// Store `bytes` and return the pointer to retrieve them with.
    fn store(&self, bytes: &[u8]) -> Result<String>;

    /// Like [`ContentStore::store`], also reporting whether this call created
    /// the entry (`false` if the same content was already stored).
    fn insert(&self, bytes: &[u8]) -> Result<(String, bool)>;

    /// Fetch the blob behind `pointer`.
    fn retrieve(&self, pointer: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the blob. Returns `false` if nothing was stored under `pointer`.
    fn delete(&self, pointer: &str) -> Result<bool>;
}

/// [`ContentStore`] over sled. Pointers are the hex SHA-256 of the content,
/// so storing the same bytes twice yields the same pointer.
pub struct SledContentStore<'a> {
    storage: &'a Storage,
}

impl<'a> SledContentStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }
}

impl ContentStore for SledContentStore<'_> {
    fn store(&self, bytes: &[u8]) -> Result<String> {
        self.insert(bytes).map(|(pointer, _)| pointer)
    }

    fn insert(&self, bytes: &[u8]) -> Result<(String, bool)> {
        let pointer = hash(bytes).to_hex();
        let created = self
            .storage
            .put_raw_if_absent(Storage::content_key(&pointer), bytes)?;
        debug!(pointer = %pointer, len = bytes.len(), created, "content stored");
        Ok((pointer, created))
    }

    fn retrieve(&self, pointer: &str) -> Result<Option<Vec<u8>>> {
        self.storage.get_raw(Storage::content_key(pointer))
    }

    fn delete(&self, pointer: &str) -> Result<bool> {
        self.storage.delete(Storage::content_key(pointer))
    }
}
