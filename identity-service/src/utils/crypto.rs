//! Keyed hashing and field encryption helpers.

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::models::EncryptedPhone;

type HmacSha256 = Hmac<Sha256>;

pub const PHONE_CIPHER_NAME: &str = "aes-256-gcm";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("cipher failure: {0}")]
    Cipher(String),
    #[error("malformed ciphertext: {0}")]
    Malformed(String),
}

/// Deterministic keyed hash (HMAC-SHA256) for lower-sensitivity secrets such
/// as two-factor and recovery codes. Deterministic so a stored digest can be
/// matched without keeping the secret itself.
#[derive(Clone)]
pub struct KeyedHasher {
    mac: HmacSha256,
}

impl KeyedHasher {
    pub fn new(secret: &str) -> Result<Self, CryptoError> {
        let mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { mac })
    }

    pub fn digest(&self, input: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(input.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time comparison of `input` against a stored digest.
    pub fn matches(&self, input: &str, digest_hex: &str) -> bool {
        let expected = self.digest(input);
        if expected.len() != digest_hex.len() {
            return false;
        }
        expected.as_bytes().ct_eq(digest_hex.as_bytes()).into()
    }
}

/// AES-256-GCM encryption for stored phone numbers, fresh nonce per call.
#[derive(Clone)]
pub struct PhoneCipher {
    cipher: Aes256Gcm,
}

impl PhoneCipher {
    /// Key is 32 bytes, hex-encoded in configuration.
    pub fn from_hex(key_hex: &str) -> Result<Self, CryptoError> {
        let key = hex::decode(key_hex).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, number: &str) -> Result<EncryptedPhone, CryptoError> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, number.as_bytes())
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;

        Ok(EncryptedPhone {
            cipher: PHONE_CIPHER_NAME.to_string(),
            nonce: BASE64.encode(nonce_bytes),
            number: BASE64.encode(ciphertext),
        })
    }

    pub fn decrypt(&self, phone: &EncryptedPhone) -> Result<String, CryptoError> {
        if phone.cipher != PHONE_CIPHER_NAME {
            return Err(CryptoError::Malformed(format!(
                "unknown cipher: {}",
                phone.cipher
            )));
        }

        let nonce_bytes = BASE64
            .decode(&phone.nonce)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        if nonce_bytes.len() != 12 {
            return Err(CryptoError::Malformed("bad nonce length".to_string()));
        }

        let ciphertext = BASE64
            .decode(&phone.number)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|e| CryptoError::Cipher(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn test_keyed_hash_is_deterministic() {
        let hasher = KeyedHasher::new("test-secret").unwrap();
        assert_eq!(hasher.digest("483920"), hasher.digest("483920"));
        assert_ne!(hasher.digest("483920"), hasher.digest("483921"));
    }

    #[test]
    fn test_keyed_hash_matches() {
        let hasher = KeyedHasher::new("test-secret").unwrap();
        let digest = hasher.digest("483920");
        assert!(hasher.matches("483920", &digest));
        assert!(!hasher.matches("111111", &digest));
        assert!(!hasher.matches("483920", "short"));
    }

    #[test]
    fn test_keyed_hash_depends_on_key() {
        let a = KeyedHasher::new("secret-a").unwrap();
        let b = KeyedHasher::new("secret-b").unwrap();
        assert_ne!(a.digest("483920"), b.digest("483920"));
    }

    #[test]
    fn test_phone_round_trip() {
        let cipher = PhoneCipher::from_hex(TEST_KEY_HEX).unwrap();
        let encrypted = cipher.encrypt("+15551234567").unwrap();
        assert_eq!(encrypted.cipher, PHONE_CIPHER_NAME);
        assert_ne!(encrypted.number, "+15551234567");
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), "+15551234567");
    }

    #[test]
    fn test_fresh_nonce_per_encryption() {
        let cipher = PhoneCipher::from_hex(TEST_KEY_HEX).unwrap();
        let one = cipher.encrypt("+15551234567").unwrap();
        let two = cipher.encrypt("+15551234567").unwrap();
        assert_ne!(one.nonce, two.nonce);
        assert_ne!(one.number, two.number);
    }

    #[test]
    fn test_bad_key_rejected() {
        assert!(PhoneCipher::from_hex("deadbeef").is_err());
        assert!(PhoneCipher::from_hex("not hex at all").is_err());
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let cipher = PhoneCipher::from_hex(TEST_KEY_HEX).unwrap();
        let mut encrypted = cipher.encrypt("+15551234567").unwrap();
        encrypted.number = BASE64.encode(b"tampered");
        assert!(cipher.decrypt(&encrypted).is_err());
    }
}
