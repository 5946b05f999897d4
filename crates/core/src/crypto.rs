//! P-256 (secp256r1) ECDSA primitives for signing and verification.
//!
//! Keys and signatures round-trip through fixed-width hex:
//! - private key: 32-byte scalar (64 hex chars)
//! - public key: 64-byte `X || Y` affine coordinates (128 hex chars)
//! - signature: 64-byte `r || s` (128 hex chars)

use crate::canonical::{to_canonical_bytes, CanonicalError};
use p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature as EcdsaSignature, SigningKey, VerifyingKey,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const PRIVATE_KEY_LENGTH: usize = 32;
const PUBLIC_KEY_LENGTH: usize = 64;
const SIGNATURE_LENGTH: usize = 64;

/// Errors that can occur while decoding persisted key or signature material.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid private key")]
    InvalidPrivateKey,
}

fn decode_fixed(s: &str, expected: usize) -> Result<Vec<u8>, CryptoError> {
    let bytes = hex::decode(s)?;
    if bytes.len() != expected {
        return Err(CryptoError::InvalidLength {
            expected,
            got: bytes.len(),
        });
    }
    Ok(bytes)
}

/// A signature over a byte payload.
///
/// The bytes are kept as received so that a malformed signature can still be
/// carried through a request and rejected by verification rather than by
/// parsing.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Create a signature from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from a hex string. Length is not checked here.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        Ok(Self(hex::decode(s)?))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Signature({}...)", &hex[..hex.len().min(16)])
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A public key for signature verification, also used as an identity handle.
#[derive(Clone)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Get the raw `X || Y` bytes of the public key.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let point = self.0.to_encoded_point(false);
        let mut out = [0u8; PUBLIC_KEY_LENGTH];
        // Skip the SEC1 uncompressed tag (0x04).
        out.copy_from_slice(&point.as_bytes()[1..]);
        out
    }

    /// Parse from raw `X || Y` bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PUBLIC_KEY_LENGTH {
            return Err(CryptoError::InvalidLength {
                expected: PUBLIC_KEY_LENGTH,
                got: bytes.len(),
            });
        }
        let mut sec1 = [0u8; PUBLIC_KEY_LENGTH + 1];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(bytes);
        let key = VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(key))
    }

    /// Convert to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(&decode_fixed(s, PUBLIC_KEY_LENGTH)?)
    }

    /// Verify a signature against this public key.
    ///
    /// Malformed signature bytes are a verification failure, not an error.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        if signature.as_bytes().len() != SIGNATURE_LENGTH {
            return false;
        }
        let sig = match EcdsaSignature::from_slice(signature.as_bytes()) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        self.0.verify(message, &sig).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A private signing key. Never serialized implicitly; use [`PrivateKey::to_hex`].
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Get the raw scalar bytes.
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_LENGTH] {
        let mut out = [0u8; PRIVATE_KEY_LENGTH];
        out.copy_from_slice(self.0.to_bytes().as_slice());
        out
    }

    /// Parse from raw scalar bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PRIVATE_KEY_LENGTH {
            return Err(CryptoError::InvalidLength {
                expected: PRIVATE_KEY_LENGTH,
                got: bytes.len(),
            });
        }
        let key = SigningKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self(key))
    }

    /// Convert to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        Self::from_bytes(&decode_fixed(s, PRIVATE_KEY_LENGTH)?)
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().to_owned())
    }

    /// Sign a message (ECDSA over SHA-256, RFC 6979 nonces).
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig: EcdsaSignature = self.0.sign(message);
        Signature(sig.to_bytes().to_vec())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// A keypair for signing and verification.
pub struct Keypair {
    private_key: PrivateKey,
    pub public_key: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self::from_private(PrivateKey(signing_key))
    }

    /// Create a keypair from an existing private key.
    pub fn from_private(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        Self {
            private_key,
            public_key,
        }
    }

    /// Create a keypair from a hex-encoded private key.
    pub fn from_private_hex(s: &str) -> Result<Self, CryptoError> {
        Ok(Self::from_private(PrivateKey::from_hex(s)?))
    }

    /// Get the private key.
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Split into `(private, public)`.
    pub fn into_parts(self) -> (PrivateKey, PublicKey) {
        (self.private_key, self.public_key)
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.private_key.sign(message)
    }

    /// Verify a signature against our public key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.public_key.verify(message, signature)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Sign the canonical encoding of a structured payload.
pub fn sign_canonical<T>(payload: &T, key: &PrivateKey) -> Result<Signature, CanonicalError>
where
    T: Serialize + ?Sized,
{
    let bytes = to_canonical_bytes(payload)?;
    Ok(key.sign(&bytes))
}

/// Verify a signature over the canonical encoding of a structured payload.
///
/// A payload that cannot be canonicalized verifies as `false`.
pub fn verify_canonical<T>(payload: &T, signature: &Signature, key: &PublicKey) -> bool
where
    T: Serialize + ?Sized,
{
    match to_canonical_bytes(payload) {
        Ok(bytes) => key.verify(&bytes, signature),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sign_and_verify() {
        let kp = Keypair::generate();
        let message = b"hello world";
        let sig = kp.sign(message);
        assert_eq!(sig.as_bytes().len(), SIGNATURE_LENGTH);
        assert!(kp.verify(message, &sig));
    }

    #[test]
    fn test_wrong_message_fails() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"hello");
        assert!(!kp.verify(b"world", &sig));
    }

    #[test]
    fn test_wrong_key_fails() {
        let kp1 = Keypair::generate();
        let kp2 = Keypair::generate();
        let sig = kp1.sign(b"hello");
        assert!(!kp2.verify(b"hello", &sig));
    }

    #[test]
    fn test_bit_flipped_signature_fails() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"payload");
        for byte in [0usize, 31, 32, 63] {
            let mut bytes = sig.as_bytes().to_vec();
            bytes[byte] ^= 0x01;
            assert!(!kp.verify(b"payload", &Signature::from_bytes(bytes)));
        }
    }

    #[test]
    fn test_malformed_signature_is_false_not_error() {
        let kp = Keypair::generate();
        assert!(!kp.verify(b"payload", &Signature::default()));
        assert!(!kp.verify(b"payload", &Signature::from_bytes(vec![0u8; 64])));
        assert!(!kp.verify(b"payload", &Signature::from_bytes(vec![1u8; 10])));
    }

    #[test]
    fn test_key_hex_roundtrip() {
        let kp = Keypair::generate();
        let private_hex = kp.private_key().to_hex();
        let public_hex = kp.public_key.to_hex();
        assert_eq!(private_hex.len(), 64);
        assert_eq!(public_hex.len(), 128);

        let restored = Keypair::from_private_hex(&private_hex).unwrap();
        assert_eq!(restored.public_key, kp.public_key);
        assert_eq!(PublicKey::from_hex(&public_hex).unwrap(), kp.public_key);
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(PublicKey::from_hex("xyz"), Err(CryptoError::Hex(_))));
        assert!(matches!(
            PublicKey::from_hex("abcd"),
            Err(CryptoError::InvalidLength { expected: 64, got: 2 })
        ));
        // Right length, not a point on the curve.
        assert!(matches!(
            PublicKey::from_hex(&"00".repeat(64)),
            Err(CryptoError::InvalidPublicKey)
        ));
        assert!(matches!(
            PrivateKey::from_hex(&"00".repeat(32)),
            Err(CryptoError::InvalidPrivateKey)
        ));
        assert!(Signature::from_hex("not hex").is_err());
    }

    #[test]
    fn test_canonical_sign_ignores_key_order() {
        let kp = Keypair::generate();
        let sig = sign_canonical(&json!({"a": 1, "b": "two"}), kp.private_key()).unwrap();
        assert!(verify_canonical(&json!({"b": "two", "a": 1}), &sig, &kp.public_key));
        assert!(!verify_canonical(&json!({"b": "three", "a": 1}), &sig, &kp.public_key));
    }

    #[test]
    fn test_public_key_serde_as_hex() {
        let kp = Keypair::generate();
        let json = serde_json::to_string(&kp.public_key).unwrap();
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kp.public_key);
    }
}
