//! Key store entries and alias descriptions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::sealed::{SealedBy, SealedKey};
use crate::error::KeyStoreError;

/// Kind of material held under an alias
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    PrivateKey,
    TrustedCertificate,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::PrivateKey => write!(f, "PrivateKeyEntry"),
            EntryType::TrustedCertificate => write!(f, "TrustedCertificateEntry"),
        }
    }
}

/// A private key with its certificate chain, leaf first.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub private_key_pem: String,
    pub certificate_chain: Vec<String>,
}

impl KeyMaterial {
    pub fn new(private_key_pem: String, certificate_chain: Vec<String>) -> Self {
        Self {
            private_key_pem,
            certificate_chain,
        }
    }

    /// Generate a fresh key pair with a self-signed certificate for `common_name`
    pub fn generate(common_name: &str) -> Result<Self, KeyStoreError> {
        let key_pair = rcgen::KeyPair::generate()
            .map_err(|e| KeyStoreError::KeyGeneration(e.to_string()))?;

        let mut params = rcgen::CertificateParams::new(Vec::<String>::new())
            .map_err(|e| KeyStoreError::KeyGeneration(e.to_string()))?;
        let mut distinguished_name = rcgen::DistinguishedName::new();
        distinguished_name.push(rcgen::DnType::CommonName, common_name);
        params.distinguished_name = distinguished_name;

        let certificate = params
            .self_signed(&key_pair)
            .map_err(|e| KeyStoreError::KeyGeneration(e.to_string()))?;

        Ok(Self::new(key_pair.serialize_pem(), vec![certificate.pem()]))
    }

    /// SHA-256 fingerprint of the leaf certificate, if any
    pub fn fingerprint(&self) -> Option<String> {
        self.certificate_chain
            .first()
            .and_then(|pem| certificate_fingerprint(pem).ok())
    }
}

// Private keys never reach logs
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("private_key_pem", &"****")
            .field("certificate_chain", &self.certificate_chain.len())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// A single entry of a key store.
///
/// A private key is held either as plain PEM or sealed under the entry
/// password, never both.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStoreEntry {
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_pem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sealed_private_key: Option<SealedKey>,
    #[serde(default)]
    pub certificate_chain: Vec<String>,
    pub created: DateTime<Utc>,
}

impl KeyStoreEntry {
    /// A private key entry, sealed under `password` when one is given
    pub fn private_key(
        alias: &str,
        material: KeyMaterial,
        password: Option<&str>,
    ) -> Result<Self, KeyStoreError> {
        let (private_key_pem, sealed_private_key) = match password {
            Some(password) => (
                None,
                Some(SealedKey::seal(
                    &material.private_key_pem,
                    password,
                    alias,
                    SealedBy::Entry,
                )?),
            ),
            None => (Some(material.private_key_pem), None),
        };

        Ok(Self {
            alias: alias.to_string(),
            private_key_pem,
            sealed_private_key,
            certificate_chain: material.certificate_chain,
            created: Utc::now(),
        })
    }

    pub fn trusted_certificate(alias: &str, certificate_pem: String) -> Self {
        Self {
            alias: alias.to_string(),
            private_key_pem: None,
            sealed_private_key: None,
            certificate_chain: vec![certificate_pem],
            created: Utc::now(),
        }
    }

    pub fn entry_type(&self) -> EntryType {
        if self.private_key_pem.is_some() || self.sealed_private_key.is_some() {
            EntryType::PrivateKey
        } else {
            EntryType::TrustedCertificate
        }
    }

    /// Whether the private key is sealed under an entry password
    pub fn is_password_protected(&self) -> bool {
        self.sealed_private_key
            .as_ref()
            .is_some_and(|sealed| sealed.sealed_by == SealedBy::Entry)
    }

    /// Key material of a private key entry.
    ///
    /// An entry without a password opens with any `password`.
    pub fn key_material(&self, password: Option<&str>) -> Result<KeyMaterial, KeyStoreError> {
        let private_key_pem = match (&self.private_key_pem, &self.sealed_private_key) {
            (Some(pem), _) => pem.clone(),
            (None, Some(sealed)) => {
                let password = password.ok_or_else(|| KeyStoreError::WrongPassword {
                    alias: self.alias.clone(),
                })?;
                sealed.open(password, &self.alias)?
            }
            (None, None) => {
                return Err(KeyStoreError::NotAPrivateKeyEntry {
                    alias: self.alias.clone(),
                })
            }
        };

        Ok(KeyMaterial::new(private_key_pem, self.certificate_chain.clone()))
    }

    /// The entry as written to a file protected by the key store password.
    ///
    /// A plain private key is sealed; everything else is unchanged.
    pub(crate) fn sealed_at_rest(&self, password: &str) -> Result<Self, KeyStoreError> {
        let mut entry = self.clone();
        if let Some(pem) = entry.private_key_pem.take() {
            entry.sealed_private_key =
                Some(SealedKey::seal(&pem, password, &self.alias, SealedBy::KeyStore)?);
        }
        Ok(entry)
    }

    /// Undo [`sealed_at_rest`](Self::sealed_at_rest) after reading a file
    pub(crate) fn opened_at_rest(mut self, password: Option<&str>) -> Result<Self, KeyStoreError> {
        let Some(sealed) = self
            .sealed_private_key
            .take_if(|sealed| sealed.sealed_by == SealedBy::KeyStore)
        else {
            return Ok(self);
        };

        let password = password.ok_or_else(|| KeyStoreError::KeyStorePasswordRequired {
            alias: self.alias.clone(),
        })?;
        self.private_key_pem = Some(sealed.open(password, &self.alias)?);
        Ok(self)
    }

    /// Describe the entry; `verbose` adds parsed certificate details
    pub fn describe(&self, verbose: bool) -> Result<AliasInfo, KeyStoreError> {
        let certificate_chain = self
            .certificate_chain
            .iter()
            .map(|pem| CertificateInfo::from_pem(pem, verbose))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AliasInfo {
            alias: self.alias.clone(),
            entry_type: self.entry_type(),
            creation_date: self.created,
            certificate_chain,
        })
    }
}

impl fmt::Debug for KeyStoreEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStoreEntry")
            .field("alias", &self.alias)
            .field("entry_type", &self.entry_type())
            .field("certificate_chain", &self.certificate_chain.len())
            .field("created", &self.created)
            .field("password_protected", &self.is_password_protected())
            .finish()
    }
}

// ============================================================================
// Alias descriptions
// ============================================================================

/// Description of one alias, as returned by alias reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasInfo {
    pub alias: String,
    pub entry_type: EntryType,
    pub creation_date: DateTime<Utc>,
    pub certificate_chain: Vec<CertificateInfo>,
}

/// One certificate of an alias' chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateInfo {
    pub sha256_fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<CertificateDetails>,
}

/// Parsed X.509 fields, present for verbose reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateDetails {
    pub subject: String,
    pub issuer: String,
    pub serial_number: String,
    pub not_before: String,
    pub not_after: String,
}

impl CertificateInfo {
    fn from_pem(certificate_pem: &str, verbose: bool) -> Result<Self, KeyStoreError> {
        let der = certificate_der(certificate_pem)?;
        let sha256_fingerprint = hex::encode(Sha256::digest(&der));

        let details = if verbose {
            let (_, certificate) = x509_parser::parse_x509_certificate(&der)
                .map_err(|e| KeyStoreError::Certificate(e.to_string()))?;
            let validity = certificate.validity();
            Some(CertificateDetails {
                subject: certificate.subject().to_string(),
                issuer: certificate.issuer().to_string(),
                serial_number: certificate.raw_serial_as_string(),
                not_before: validity.not_before.to_string(),
                not_after: validity.not_after.to_string(),
            })
        } else {
            None
        };

        Ok(Self {
            sha256_fingerprint,
            details,
        })
    }
}

fn certificate_der(certificate_pem: &str) -> Result<Vec<u8>, KeyStoreError> {
    let block = pem::parse(certificate_pem).map_err(|e| KeyStoreError::Certificate(e.to_string()))?;
    if block.tag() != "CERTIFICATE" {
        return Err(KeyStoreError::Certificate(format!(
            "expected a CERTIFICATE block, found {}",
            block.tag()
        )));
    }
    Ok(block.contents().to_vec())
}

/// SHA-256 fingerprint of a PEM certificate
pub fn certificate_fingerprint(certificate_pem: &str) -> Result<String, KeyStoreError> {
    Ok(hex::encode(Sha256::digest(certificate_der(certificate_pem)?)))
}
