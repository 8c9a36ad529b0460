//! Password-based encryption of private keys at rest.
//!
//! A sealing key is derived from the password with Argon2id and a random
//! salt, then the PEM is encrypted with XChaCha20-Poly1305. The alias and the
//! kind of password are bound in as associated data, so a sealed key cannot
//! be moved to another alias or opened as the other kind.

use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::XChaCha20Poly1305;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::KeyStoreError;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;

/// Which password a private key is sealed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SealedBy {
    /// The entry's own password
    Entry,
    /// The key store password, applied when writing the file
    KeyStore,
}

impl SealedBy {
    fn tag(self) -> &'static str {
        match self {
            SealedBy::Entry => "entry",
            SealedBy::KeyStore => "key-store",
        }
    }
}

/// An encrypted private key PEM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    pub sealed_by: SealedBy,
    salt: String,
    nonce: String,
    ciphertext: String,
}

impl SealedKey {
    /// Encrypt `private_key_pem` for `alias` under `password`
    pub fn seal(
        private_key_pem: &str,
        password: &str,
        alias: &str,
        sealed_by: SealedBy,
    ) -> Result<Self, KeyStoreError> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let mut key = derive_key(password, &salt)?;
        let cipher = XChaCha20Poly1305::new(&key.into());
        key.zeroize();

        let aad = associated_data(alias, sealed_by);
        let ciphertext = cipher
            .encrypt(
                &nonce.into(),
                Payload {
                    msg: private_key_pem.as_bytes(),
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|e| KeyStoreError::Encryption(format!("sealing failed: {}", e)))?;

        Ok(Self {
            sealed_by,
            salt: hex::encode(salt),
            nonce: hex::encode(nonce),
            ciphertext: hex::encode(ciphertext),
        })
    }

    /// Decrypt the PEM; a wrong password fails with `WrongPassword`
    pub fn open(&self, password: &str, alias: &str) -> Result<String, KeyStoreError> {
        let salt = decode_field(&self.salt, "salt")?;
        let nonce: [u8; NONCE_LEN] = decode_field(&self.nonce, "nonce")?
            .try_into()
            .map_err(|_| KeyStoreError::Encryption("malformed sealed key nonce".to_string()))?;
        let ciphertext = decode_field(&self.ciphertext, "ciphertext")?;

        let mut key = derive_key(password, &salt)?;
        let cipher = XChaCha20Poly1305::new(&key.into());
        key.zeroize();

        let aad = associated_data(alias, self.sealed_by);
        let plaintext = cipher
            .decrypt(
                &nonce.into(),
                Payload {
                    msg: ciphertext.as_ref(),
                    aad: aad.as_bytes(),
                },
            )
            .map_err(|_| KeyStoreError::WrongPassword {
                alias: alias.to_string(),
            })?;

        String::from_utf8(plaintext)
            .map_err(|_| KeyStoreError::Encryption("sealed key is not UTF-8 PEM".to_string()))
    }
}

fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; 32], KeyStoreError> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| KeyStoreError::Encryption(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

fn associated_data(alias: &str, sealed_by: SealedBy) -> String {
    format!("keyward:{}:{}", sealed_by.tag(), alias)
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>, KeyStoreError> {
    hex::decode(value).map_err(|_| KeyStoreError::Encryption(format!("malformed sealed key {}", field)))
}
