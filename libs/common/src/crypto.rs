//! Crypto primitives for data at rest and credential hashing
//!
//! Email addresses are sealed with ChaCha20-Poly1305 before they reach the
//! database. The nonce is derived from an HMAC of the plaintext, so sealing the
//! same address twice yields the same ciphertext and the `users.email` column
//! can be searched by exact match. This gives up semantic security: equal
//! plaintexts are visible as equal ciphertexts. Only use [`Cipher`] for unique,
//! exact-match lookup columns.

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::{env, fmt};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const SECRET_SIZE: usize = 32;
const NONCE_DOMAIN: &[u8] = b"email_nonce";

/// Errors raised by the crypto primitives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The encryption key is not configured
    #[error("DATA_ENCRYPTION_KEY environment variable not set")]
    MissingKey,

    /// The encryption key is not 32 bytes of base64
    #[error("Encryption key must be {KEY_SIZE} bytes encoded as base64")]
    InvalidKey,

    /// Input is not valid base64
    #[error("Ciphertext is not valid base64")]
    Encoding,

    /// Input is shorter than a nonce
    #[error("ciphertext too short")]
    CiphertextTooShort,

    #[error("Encryption failed")]
    Encryption,

    /// Authentication tag mismatch or wrong key
    #[error("Decryption failed")]
    Decryption,

    #[error("Decrypted data is not valid UTF-8")]
    Utf8,
}

/// Type alias for Result with CryptoError
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Crypto configuration
#[derive(Clone)]
pub struct CryptoConfig {
    /// Base64-encoded 32 byte key
    pub key: String,
}

impl CryptoConfig {
    /// Load the key from `DATA_ENCRYPTION_KEY`. There is no default.
    pub fn from_env() -> CryptoResult<Self> {
        let key = env::var("DATA_ENCRYPTION_KEY").map_err(|_| CryptoError::MissingKey)?;
        if key.trim().is_empty() {
            return Err(CryptoError::MissingKey);
        }

        Ok(Self { key })
    }
}

impl fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Deterministic authenticated cipher for exact-match columns
#[derive(Clone)]
pub struct Cipher {
    aead: ChaCha20Poly1305,
    nonce_key: [u8; 32],
}

impl Cipher {
    /// Build a cipher from configuration
    pub fn new(config: &CryptoConfig) -> CryptoResult<Self> {
        let key = STANDARD
            .decode(config.key.trim())
            .map_err(|_| CryptoError::InvalidKey)?;

        Self::from_key_bytes(&key)
    }

    /// Build a cipher from raw key bytes
    pub fn from_key_bytes(key: &[u8]) -> CryptoResult<Self> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey);
        }

        let aead =
            <ChaCha20Poly1305 as KeyInit>::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)?;

        let mut hasher = Sha256::new();
        Digest::update(&mut hasher, NONCE_DOMAIN);
        Digest::update(&mut hasher, key);
        let nonce_key: [u8; 32] = hasher.finalize().into();

        Ok(Self { aead, nonce_key })
    }

    /// Seal `plaintext`, returning base64(nonce || ciphertext)
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let nonce_bytes = self.derive_nonce(plaintext.as_bytes())?;
        let ciphertext = self
            .aead
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CryptoError::Encryption)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(sealed))
    }

    /// Open a value produced by [`Cipher::encrypt`]
    pub fn decrypt(&self, encoded: &str) -> CryptoResult<String> {
        let sealed = STANDARD.decode(encoded).map_err(|_| CryptoError::Encoding)?;
        if sealed.len() < NONCE_SIZE {
            return Err(CryptoError::CiphertextTooShort);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .aead
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
    }

    fn derive_nonce(&self, data: &[u8]) -> CryptoResult<[u8; NONCE_SIZE]> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.nonce_key)
            .map_err(|_| CryptoError::InvalidKey)?;
        mac.update(data);
        let tag = mac.finalize().into_bytes();

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&tag[..NONCE_SIZE]);
        Ok(nonce)
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}

/// Unsalted SHA-256 digest, hex encoded.
///
/// Used for values that are looked up by their digest: API-key secrets and
/// session tokens. Both are high-entropy random strings.
pub fn hash(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Generate a fresh base64 encryption key suitable for `DATA_ENCRYPTION_KEY`
pub fn generate_key() -> String {
    STANDARD.encode(random_bytes::<KEY_SIZE>())
}

/// Generate a URL-safe random secret (32 bytes, unpadded base64url, 43 chars)
pub fn generate_secret() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes::<SECRET_SIZE>())
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn cipher() -> Cipher {
        Cipher::from_key_bytes(&[7u8; KEY_SIZE]).unwrap()
    }

    #[test]
    fn decrypt_reverses_encrypt() {
        let cipher = cipher();
        for plaintext in ["a@b.com", "x", "ünïcødé@example.org", "with spaces and\nnewlines"] {
            let sealed = cipher.encrypt(plaintext).unwrap();
            assert_ne!(sealed, plaintext);
            assert_eq!(cipher.decrypt(&sealed).unwrap(), plaintext);
        }
    }

    #[test]
    fn encryption_is_deterministic_per_plaintext() {
        let cipher = cipher();
        assert_eq!(
            cipher.encrypt("a@b.com").unwrap(),
            cipher.encrypt("a@b.com").unwrap()
        );
        assert_ne!(
            cipher.encrypt("a@b.com").unwrap(),
            cipher.encrypt("b@b.com").unwrap()
        );
    }

    #[test]
    fn different_keys_do_not_open_each_other() {
        let sealed = cipher().encrypt("a@b.com").unwrap();
        let other = Cipher::from_key_bytes(&[9u8; KEY_SIZE]).unwrap();
        assert_eq!(other.decrypt(&sealed), Err(CryptoError::Decryption));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let cipher = cipher();
        let mut sealed = STANDARD.decode(cipher.encrypt("a@b.com").unwrap()).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert_eq!(
            cipher.decrypt(&STANDARD.encode(sealed)),
            Err(CryptoError::Decryption)
        );
    }

    #[test]
    fn short_or_malformed_input_is_rejected() {
        let cipher = cipher();
        assert_eq!(
            cipher.decrypt(&STANDARD.encode([0u8; 4])),
            Err(CryptoError::CiphertextTooShort)
        );
        assert_eq!(cipher.decrypt("not base64!"), Err(CryptoError::Encoding));
    }

    #[test]
    fn key_must_be_32_bytes() {
        assert_eq!(
            Cipher::from_key_bytes(&[1u8; 16]).unwrap_err(),
            CryptoError::InvalidKey
        );
        let config = CryptoConfig {
            key: STANDARD.encode([1u8; 31]),
        };
        assert_eq!(Cipher::new(&config).unwrap_err(), CryptoError::InvalidKey);
    }

    #[test]
    fn hash_is_hex_sha256() {
        assert_eq!(
            hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hash("sk_live_abc"), hash("sk_live_abc"));
    }

    #[test]
    fn secrets_are_url_safe_and_fixed_length() {
        let first = generate_secret();
        let second = generate_secret();
        assert_eq!(first.len(), 43);
        assert_ne!(first, second);
        assert!(
            first
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn generated_key_builds_a_cipher() {
        let config = CryptoConfig { key: generate_key() };
        assert!(Cipher::new(&config).is_ok());
    }

    #[test]
    #[serial]
    fn config_requires_key() {
        unsafe {
            env::remove_var("DATA_ENCRYPTION_KEY");
        }
        assert_eq!(CryptoConfig::from_env().unwrap_err(), CryptoError::MissingKey);

        unsafe {
            env::set_var("DATA_ENCRYPTION_KEY", generate_key());
        }
        let config = CryptoConfig::from_env().unwrap();
        assert!(Cipher::new(&config).is_ok());
        assert!(!format!("{:?}", config).contains(&config.key));

        unsafe {
            env::remove_var("DATA_ENCRYPTION_KEY");
        }
    }
}
