//! Credential vault: AES-256-GCM sealing of credential records at rest.
//!
//! Blobs are `base64(nonce ‖ tag ‖ ciphertext)` with a fresh 12-byte nonce per
//! encryption. The key is the SHA-256 digest of the application secret.

use std::fmt;

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::account::CredentialRecord;
use crate::{Error, Result};

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

/// Seals and opens credential blobs.
#[derive(Clone)]
pub struct Vault {
    cipher: Aes256Gcm,
}

impl Vault {
    /// Derives the vault key from the application secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Encrypts `plaintext` into a base64 blob.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the cipher rejects the input,
    /// which only happens for inputs beyond the GCM length limit.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let mut ciphertext = plaintext.to_vec();
        let tag = self
            .cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut ciphertext)
            .map_err(|_| Error::OperationFailed("credential encryption failed".to_string()))?;

        let mut blob = Vec::with_capacity(NONCE_SIZE + TAG_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&tag);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    /// Decrypts a blob produced by [`Vault::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecryptionFailed`] for bad base64, truncated blobs,
    /// tampered data or a different key.
    pub fn decrypt(&self, blob: &str) -> Result<Vec<u8>> {
        let raw = BASE64.decode(blob.trim()).map_err(|_| Error::DecryptionFailed)?;
        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::DecryptionFailed);
        }

        let (nonce, rest) = raw.split_at(NONCE_SIZE);
        let (tag, ciphertext) = rest.split_at(TAG_SIZE);
        let mut plaintext = ciphertext.to_vec();
        self.cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(nonce),
                b"",
                &mut plaintext,
                Tag::from_slice(tag),
            )
            .map_err(|_| Error::DecryptionFailed)?;
        Ok(plaintext)
    }

    /// Serializes and encrypts a credential record.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or encryption fails.
    pub fn seal(&self, record: &CredentialRecord) -> Result<String> {
        let json = serde_json::to_vec(record)?;
        let blob = self.encrypt(&json)?;
        debug!(blob_len = blob.len(), "Sealed credential record");
        Ok(blob)
    }

    /// Decrypts and deserializes a credential record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecryptionFailed`] if the blob does not open and
    /// [`Error::Serde`] if it opens to something that is not a record.
    pub fn open(&self, blob: &str) -> Result<CredentialRecord> {
        let json = self.decrypt(blob)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::account::{Endpoint, Identities, Identity, Security};
    use proptest::prelude::*;

    fn record() -> CredentialRecord {
        CredentialRecord {
            imap: Endpoint::new("imap.example.com", 993, Security::Tls),
            smtp: Endpoint::new("smtp.example.com", 465, Security::Tls),
            identities: Identities::Single {
                identity: Identity::new("primary", "ana@example.com", "pässwörd"),
            },
        }
    }

    #[test]
    fn blob_layout() {
        let vault = Vault::new("dev-app-enc-key");
        let blob = vault.encrypt(b"hello").unwrap();
        let raw = BASE64.decode(&blob).unwrap();
        assert_eq!(raw.len(), NONCE_SIZE + TAG_SIZE + 5);
        assert_eq!(vault.decrypt(&blob).unwrap(), b"hello");
    }

    #[test]
    fn nonces_are_fresh() {
        let vault = Vault::new("k");
        assert_ne!(vault.encrypt(b"same").unwrap(), vault.encrypt(b"same").unwrap());
    }

    #[test]
    fn seal_and_open_record() {
        let vault = Vault::new("k");
        let blob = vault.seal(&record()).unwrap();
        assert!(!blob.contains("pässwörd"));
        assert_eq!(vault.open(&blob).unwrap(), record());
    }

    #[test]
    fn wrong_key_fails_closed() {
        let blob = Vault::new("one").encrypt(b"secret").unwrap();
        assert!(matches!(
            Vault::new("two").decrypt(&blob),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn malformed_blobs_fail_closed() {
        let vault = Vault::new("k");
        assert!(matches!(vault.decrypt("not base64!"), Err(Error::DecryptionFailed)));
        let short = BASE64.encode([0u8; 27]);
        assert!(matches!(vault.decrypt(&short), Err(Error::DecryptionFailed)));
        let zeros = BASE64.encode([0u8; 40]);
        assert!(matches!(vault.decrypt(&zeros), Err(Error::DecryptionFailed)));
    }

    proptest! {
        #[test]
        fn encrypt_then_decrypt(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let vault = Vault::new("prop-key");
            let blob = vault.encrypt(&data).unwrap();
            prop_assert_eq!(vault.decrypt(&blob).unwrap(), data);
        }

        #[test]
        fn any_bit_flip_is_rejected(
            data in proptest::collection::vec(any::<u8>(), 1..128),
            index in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let vault = Vault::new("prop-key");
            let mut raw = BASE64.decode(vault.encrypt(&data).unwrap()).unwrap();
            let i = index.index(raw.len());
            raw[i] ^= 1 << bit;
            let tampered = BASE64.encode(&raw);
            prop_assert!(matches!(vault.decrypt(&tampered), Err(Error::DecryptionFailed)));
        }
    }
}
