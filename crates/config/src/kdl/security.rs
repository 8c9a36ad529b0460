//! Security resource KDL parsing.

use anyhow::Result;
use std::path::PathBuf;
use tracing::trace;

use crate::resources::*;

use super::helpers::{
    get_child, get_first_arg_string, get_property_string, get_string_entry, get_string_list,
};

fn resource_name(node: &::kdl::KdlNode, kind: &str) -> Result<String> {
    get_first_arg_string(node).ok_or_else(|| {
        anyhow::anyhow!(
            "{} requires a name argument, e.g., {} \"name\" {{ ... }}",
            kind,
            kind
        )
    })
}

/// Parse a `certificate-authority "name" { ... }` block
pub fn parse_certificate_authority(node: &::kdl::KdlNode) -> Result<CertificateAuthorityConfig> {
    let name = resource_name(node, "certificate-authority")?;
    trace!(name = %name, "Parsing certificate authority");

    let url = get_string_entry(node, "url").ok_or_else(|| {
        anyhow::anyhow!(
            "Certificate authority '{}' requires a 'url' field, e.g., url \"https://acme.example/directory\"",
            name
        )
    })?;

    Ok(CertificateAuthorityConfig {
        name,
        url,
        staging_url: get_string_entry(node, "staging-url"),
    })
}

/// Parse a `credential-reference clear-text="..."` style node
pub fn parse_credential_reference(node: &::kdl::KdlNode) -> Result<CredentialReference> {
    if let Some(secret) = get_property_string(node, "clear-text") {
        return Ok(CredentialReference::ClearText(secret));
    }
    if let Some(var) = get_property_string(node, "env") {
        return Ok(CredentialReference::Env(var));
    }
    if let Some(store) = get_property_string(node, "store") {
        let alias = get_property_string(node, "alias").ok_or_else(|| {
            anyhow::anyhow!("credential-reference with store=\"{}\" requires an alias", store)
        })?;
        return Ok(CredentialReference::Store { store, alias });
    }

    Err(anyhow::anyhow!(
        "credential-reference requires one of clear-text=, env= or store= and alias="
    ))
}

fn optional_credential_reference(node: &::kdl::KdlNode) -> Result<Option<CredentialReference>> {
    get_child(node, "credential-reference")
        .map(parse_credential_reference)
        .transpose()
}

/// Parse a `key-store "name" { ... }` block
pub fn parse_key_store(node: &::kdl::KdlNode) -> Result<KeyStoreConfig> {
    let name = resource_name(node, "key-store")?;
    trace!(name = %name, "Parsing key store");

    let config = KeyStoreConfig {
        path: get_string_entry(node, "path").map(PathBuf::from),
        store_type: get_string_entry(node, "type"),
        credential_reference: optional_credential_reference(node)?,
        name,
    };

    trace!(
        name = %config.name,
        fileless = config.is_fileless(),
        store_type = ?config.store_type,
        "Parsed key store"
    );
    Ok(config)
}

/// Parse a `certificate-authority-account "name" { ... }` block
pub fn parse_account(node: &::kdl::KdlNode) -> Result<AccountConfig> {
    let name = resource_name(node, "certificate-authority-account")?;
    trace!(name = %name, "Parsing certificate authority account");

    let key_store = get_string_entry(node, "key-store").ok_or_else(|| {
        anyhow::anyhow!(
            "Account '{}' requires a 'key-store' field, e.g., key-store \"accounts\"",
            name
        )
    })?;
    let alias = get_string_entry(node, "alias").ok_or_else(|| {
        anyhow::anyhow!(
            "Account '{}' requires an 'alias' field, e.g., alias \"{}\"",
            name,
            name
        )
    })?;

    Ok(AccountConfig {
        certificate_authority: get_string_entry(node, "certificate-authority")
            .unwrap_or_else(default_certificate_authority),
        contact_urls: get_string_list(node, "contact-urls"),
        credential_reference: optional_credential_reference(node)?,
        key_store,
        alias,
        name,
    })
}
