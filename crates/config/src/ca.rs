//! Certificate authority registry
//!
//! Maps a logical certificate authority name to its ACME endpoints. One
//! entry, [`DEFAULT_CERTIFICATE_AUTHORITY`], is built in and always
//! available; it can neither be redefined nor shadowed by configuration.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::{debug, info, trace};
use url::Url;

use keyward_common::Address;

use crate::error::ConfigError;
use crate::resources::CertificateAuthorityConfig;
use crate::Config;

/// Name of the built-in certificate authority
pub const DEFAULT_CERTIFICATE_AUTHORITY: &str = "LetsEncrypt";

const LETS_ENCRYPT_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
const LETS_ENCRYPT_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Whether `name` is the reserved built-in name (case-insensitive)
pub fn is_default_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(DEFAULT_CERTIFICATE_AUTHORITY)
}

/// Parse an ACME endpoint URL, accepting only http and https
pub fn parse_endpoint(url: &str) -> Result<Url, ConfigError> {
    let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

// ============================================================================
// Certificate Authority
// ============================================================================

/// A certificate authority with parsed endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateAuthority {
    name: String,
    url: Url,
    staging_url: Option<Url>,
}

impl CertificateAuthority {
    pub fn new(name: &str, url: &str, staging_url: Option<&str>) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.to_string(),
            url: parse_endpoint(url)?,
            staging_url: staging_url.map(parse_endpoint).transpose()?,
        })
    }

    /// The built-in default certificate authority
    pub fn lets_encrypt() -> Self {
        Self {
            name: DEFAULT_CERTIFICATE_AUTHORITY.to_string(),
            url: Url::parse(LETS_ENCRYPT_URL).expect("built-in URL is valid"),
            staging_url: Some(
                Url::parse(LETS_ENCRYPT_STAGING_URL).expect("built-in URL is valid"),
            ),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn staging_url(&self) -> Option<&Url> {
        self.staging_url.as_ref()
    }

    /// Directory URL to use for a call, production or staging
    pub fn endpoint(&self, staging: bool) -> Result<&Url, ConfigError> {
        if !staging {
            return Ok(&self.url);
        }
        self.staging_url
            .as_ref()
            .ok_or_else(|| ConfigError::NoStagingUrl {
                certificate_authority: self.name.clone(),
            })
    }
}

impl TryFrom<&CertificateAuthorityConfig> for CertificateAuthority {
    type Error = ConfigError;

    fn try_from(config: &CertificateAuthorityConfig) -> Result<Self, Self::Error> {
        Self::new(&config.name, &config.url, config.staging_url.as_deref())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Registry of certificate authorities known to the subsystem.
#[derive(Debug)]
pub struct CertificateAuthorityRegistry {
    default: CertificateAuthority,
    entries: RwLock<BTreeMap<String, CertificateAuthority>>,
}

impl CertificateAuthorityRegistry {
    /// Create a registry holding only the built-in default
    pub fn new() -> Self {
        Self {
            default: CertificateAuthority::lets_encrypt(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a registry with every certificate authority in `config`
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let registry = Self::new();
        for ca in config.certificate_authorities.values() {
            registry.register(CertificateAuthority::try_from(ca)?)?;
        }
        Ok(registry)
    }

    /// Add a user-defined certificate authority.
    ///
    /// Fails if the name is the reserved default name or already taken.
    pub fn register(&self, ca: CertificateAuthority) -> Result<(), ConfigError> {
        if is_default_name(ca.name()) {
            return Err(ConfigError::ReservedCertificateAuthorityName {
                name: ca.name().to_string(),
            });
        }

        let mut entries = self.entries.write();
        if entries.contains_key(ca.name()) {
            return Err(ConfigError::DuplicateCertificateAuthority {
                name: ca.name().to_string(),
            });
        }

        info!(
            address = %Address::certificate_authority(ca.name()),
            url = %ca.url(),
            has_staging = ca.staging_url().is_some(),
            "Registered certificate authority"
        );
        entries.insert(ca.name().to_string(), ca);
        Ok(())
    }

    /// Remove a user-defined certificate authority
    pub fn remove(&self, name: &str) -> Option<CertificateAuthority> {
        let removed = self.entries.write().remove(name);
        if removed.is_some() {
            debug!(name = %name, "Removed certificate authority");
        }
        removed
    }

    /// Look up a certificate authority by name.
    ///
    /// The reserved default matches case-insensitively; user-defined names
    /// match exactly.
    pub fn resolve(&self, name: &str) -> Result<CertificateAuthority, ConfigError> {
        if is_default_name(name) {
            trace!(name = %name, "Resolved built-in certificate authority");
            return Ok(self.default.clone());
        }

        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownCertificateAuthority {
                name: name.to_string(),
            })
    }

    /// Names of all certificate authorities, the built-in default first
    pub fn names(&self) -> Vec<String> {
        std::iter::once(self.default.name().to_string())
            .chain(self.entries.read().keys().cloned())
            .collect()
    }
}

impl Default for CertificateAuthorityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn internal_ca() -> CertificateAuthority {
        CertificateAuthority::new(
            "internal",
            "https://acme.internal.example/directory",
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_default_always_available() {
        let registry = CertificateAuthorityRegistry::new();
        let ca = registry.resolve("LetsEncrypt").unwrap();
        assert_eq!(ca.url().as_str(), LETS_ENCRYPT_URL);
        assert_eq!(ca.endpoint(true).unwrap().as_str(), LETS_ENCRYPT_STAGING_URL);
    }

    #[test]
    fn test_reserved_name_rejected() {
        let registry = CertificateAuthorityRegistry::new();
        let ca = CertificateAuthority::new("letsencrypt", "https://evil.example/dir", None).unwrap();

        assert_eq!(
            registry.register(ca),
            Err(ConfigError::ReservedCertificateAuthorityName {
                name: "letsencrypt".to_string()
            })
        );
        // The built-in entry is unchanged
        assert_eq!(
            registry.resolve("LetsEncrypt").unwrap().url().as_str(),
            LETS_ENCRYPT_URL
        );
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = CertificateAuthorityRegistry::new();
        registry.register(internal_ca()).unwrap();

        assert_eq!(registry.resolve("internal").unwrap(), internal_ca());
        assert_eq!(registry.names(), vec!["LetsEncrypt", "internal"]);
        assert!(matches!(
            registry.register(internal_ca()),
            Err(ConfigError::DuplicateCertificateAuthority { .. })
        ));
    }

    #[test]
    fn test_unknown_and_removed() {
        let registry = CertificateAuthorityRegistry::new();
        registry.register(internal_ca()).unwrap();
        assert!(registry.remove("internal").is_some());
        assert!(registry.remove("internal").is_none());
        assert!(matches!(
            registry.resolve("internal"),
            Err(ConfigError::UnknownCertificateAuthority { .. })
        ));
    }

    #[test]
    fn test_staging_endpoint_required() {
        let ca = internal_ca();
        assert!(ca.endpoint(false).is_ok());
        assert_eq!(
            ca.endpoint(true),
            Err(ConfigError::NoStagingUrl {
                certificate_authority: "internal".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(matches!(
            CertificateAuthority::new("bad", "not a url", None),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            CertificateAuthority::new("ftp", "ftp://acme.example/dir", None),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            CertificateAuthority::new("bad-staging", "https://ok.example", Some("::")),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_default_name_case_insensitive(mask in proptest::collection::vec(any::<bool>(), 11)) {
            let name: String = DEFAULT_CERTIFICATE_AUTHORITY
                .chars()
                .zip(mask)
                .map(|(c, upper)| if upper { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
                .collect();
            let registry = CertificateAuthorityRegistry::new();
            let resolved = registry.resolve(&name).unwrap();
            prop_assert_eq!(resolved.name(), DEFAULT_CERTIFICATE_AUTHORITY);
            let ca = CertificateAuthority::new(&name, "https://x.example/dir", None).unwrap();
            let is_reserved = matches!(
                registry.register(ca),
                Err(ConfigError::ReservedCertificateAuthorityName { .. })
            );
            prop_assert!(is_reserved);
        }
    }
}
