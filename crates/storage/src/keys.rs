//! Private key files, one JSON document per principal under `keys/`.
//!
//! Directory records only ever hold public keys; the signing half lives here.

use crate::db::{Result, StorageError};
use medichain_core::Keypair;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// On-disk shape of a key file.
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    id: String,
    public_key: String,
    private_key: String,
}

/// Directory of `<id>.json` key files.
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reject ids that would resolve outside the key directory.
    pub fn check_id(id: &str) -> Result<()> {
        let mut components = Path::new(id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !id.contains(['/', '\\']) => Ok(()),
            _ => Err(StorageError::InvalidKeyId(id.to_string())),
        }
    }

    /// Path of the key file for `id`.
    pub fn path_for(&self, id: &str) -> Result<PathBuf> {
        Self::check_id(id)?;
        Ok(self.dir.join(format!("{}.json", id)))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.path_for(id).is_ok_and(|path| path.exists())
    }

    /// Write `keypair` as `<id>.json`, replacing any previous file.
    pub fn save(&self, id: &str, keypair: &Keypair) -> Result<PathBuf> {
        let path = self.path_for(id)?;
        fs::create_dir_all(&self.dir)?;
        let file = KeyFile {
            id: id.to_string(),
            public_key: keypair.public_key.to_hex(),
            private_key: keypair.private_key().to_hex(),
        };
        fs::write(&path, serde_json::to_string_pretty(&file)?)?;
        Ok(path)
    }

    /// Load the key pair for `id`.
    pub fn load(&self, id: &str) -> Result<Keypair> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(StorageError::NotFound(path.display().to_string()));
        }
        let file: KeyFile = serde_json::from_str(&fs::read_to_string(&path)?)?;
        Ok(Keypair::from_private_hex(&file.private_key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let keys = KeyStore::new(dir.path().join("keys"));
        let kp = Keypair::generate();

        let path = keys.save("DOC001", &kp).unwrap();
        assert!(path.ends_with("DOC001.json"));
        assert!(keys.contains("DOC001"));

        let loaded = keys.load("DOC001").unwrap();
        assert_eq!(loaded.public_key, kp.public_key);
    }

    #[test]
    fn test_missing_key_file() {
        let dir = TempDir::new().unwrap();
        let keys = KeyStore::new(dir.path());
        assert!(matches!(keys.load("nobody"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_corrupt_private_key_rejected() {
        let dir = TempDir::new().unwrap();
        let keys = KeyStore::new(dir.path());
        fs::write(
            keys.path_for("bad").unwrap(),
            r#"{"id": "bad", "public_key": "", "private_key": "zz"}"#,
        )
        .unwrap();
        assert!(matches!(keys.load("bad"), Err(StorageError::Crypto(_))));
    }

    #[test]
    fn test_ids_cannot_escape_key_dir() {
        let dir = TempDir::new().unwrap();
        let keys = KeyStore::new(dir.path().join("keys"));
        let kp = Keypair::generate();

        for id in ["../x", "..", ".", "", "a/b", "/etc/passwd", "a\\b"] {
            assert!(
                matches!(keys.save(id, &kp), Err(StorageError::InvalidKeyId(_))),
                "accepted {id:?}"
            );
            assert!(matches!(keys.load(id), Err(StorageError::InvalidKeyId(_))));
            assert!(!keys.contains(id));
        }
        assert!(!dir.path().join("x.json").exists());
        assert!(KeyStore::check_id("PAT001").is_ok());
        assert!(KeyStore::check_id("EMR.v2").is_ok());
    }
}
