//! Secret Vault: symmetric authenticated encryption for connector
//! credentials at rest.
//!
//! Grounded in the original `EncryptionService` (Fernet + PBKDF2 over
//! `SECRET_KEY`), reimplemented with this crate's own crypto stack
//! (AES-256-GCM + HKDF) rather than translating the Python AEAD scheme
//! one-to-one. A value without the `v1:` scheme prefix is assumed to be
//! legacy plaintext and is returned as-is; the caller is expected to
//! re-encrypt it on the next write (see [`Vault::is_encrypted`]).

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use crate::error::VaultError;

const SCHEME_PREFIX: &str = "v1:";
const HKDF_INFO: &[u8] = b"surfsense-vault-v1";
const HKDF_SALT: &[u8] = b"surfsense-encryption-salt";
const NONCE_LEN: usize = 12;

/// Process-wide symmetric vault. Constructed once from `SECRET_KEY`
/// (falling back to `ENCRYPTION_KEY` if set) and held behind an `Arc` in
/// [`crate::context::AppContext`]; never reconstructed per request.
pub struct Vault {
    cipher: Aes256Gcm,
}

impl Vault {
    /// Derive the vault key from the configured secret via HKDF-SHA256,
    /// mirroring the original's PBKDF2-over-SECRET_KEY derivation but
    /// using this crate's HKDF dependency.
    pub fn new(secret_key: &str, encryption_key: Option<&str>) -> Result<Self, VaultError> {
        let ikm = encryption_key.unwrap_or(secret_key);
        if ikm.is_empty() {
            return Err(VaultError::MissingKey);
        }

        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), ikm.as_bytes());
        let mut key_bytes = [0u8; 32];
        hk.expand(HKDF_INFO, &mut key_bytes)
            .map_err(|_| VaultError::MissingKey)?;

        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypt `plaintext`, returning a scheme-prefixed, URL-safe base64
    /// string: `v1:<nonce><ciphertext>`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::DecryptionFailed)?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        Ok(format!("{SCHEME_PREFIX}{}", URL_SAFE_NO_PAD.encode(payload)))
    }

    /// Decrypt a value previously returned by [`Self::encrypt`]. If the
    /// value does not carry the `v1:` scheme prefix it is treated as
    /// legacy plaintext and returned unchanged — callers that persist
    /// the result back should re-encrypt it.
    pub fn decrypt(&self, value: &str) -> Result<String, VaultError> {
        let Some(encoded) = value.strip_prefix(SCHEME_PREFIX) else {
            return Ok(value.to_string());
        };

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| VaultError::Malformed)?;

        if payload.len() < NONCE_LEN {
            return Err(VaultError::Malformed);
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| VaultError::Malformed)
    }

    /// True if `value` carries this vault's scheme prefix.
    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(SCHEME_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let vault = Vault::new("test-secret-key", None).unwrap();
        let ciphertext = vault.encrypt("oauth-refresh-token").unwrap();
        assert!(Vault::is_encrypted(&ciphertext));
        assert_eq!(vault.decrypt(&ciphertext).unwrap(), "oauth-refresh-token");
    }

    #[test]
    fn legacy_plaintext_passes_through() {
        let vault = Vault::new("test-secret-key", None).unwrap();
        let legacy = "plain-api-key-from-before-migration";
        assert!(!Vault::is_encrypted(legacy));
        assert_eq!(vault.decrypt(legacy).unwrap(), legacy);
    }

    #[test]
    fn different_keys_do_not_cross_decrypt() {
        let a = Vault::new("key-a", None).unwrap();
        let b = Vault::new("key-b", None).unwrap();
        let ciphertext = a.encrypt("secret").unwrap();
        assert!(b.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn empty_key_rejected() {
        assert!(Vault::new("", None).is_err());
    }
}
