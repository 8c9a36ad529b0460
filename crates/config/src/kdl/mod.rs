//! KDL configuration parsing.

mod helpers;
mod security;

use anyhow::Result;
use std::collections::BTreeMap;
use tracing::debug;

use crate::Config;

pub use security::{
    parse_account, parse_certificate_authority, parse_credential_reference, parse_key_store,
};

fn insert_unique<T>(
    map: &mut BTreeMap<String, T>,
    kind: &str,
    name: String,
    value: T,
) -> Result<()> {
    if map.contains_key(&name) {
        return Err(anyhow::anyhow!("Duplicate {} '{}'", kind, name));
    }
    map.insert(name, value);
    Ok(())
}

/// Parse a complete configuration document
pub fn parse_config(content: &str) -> Result<Config> {
    let doc: ::kdl::KdlDocument = content.parse().map_err(|e: ::kdl::KdlError| {
        anyhow::anyhow!("{:?}", miette::Report::new(e))
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "certificate-authority" => {
                let ca = parse_certificate_authority(node)?;
                insert_unique(
                    &mut config.certificate_authorities,
                    "certificate-authority",
                    ca.name.clone(),
                    ca,
                )?;
            }
            "key-store" => {
                let key_store = parse_key_store(node)?;
                insert_unique(
                    &mut config.key_stores,
                    "key-store",
                    key_store.name.clone(),
                    key_store,
                )?;
            }
            "certificate-authority-account" => {
                let account = parse_account(node)?;
                insert_unique(
                    &mut config.accounts,
                    "certificate-authority-account",
                    account.name.clone(),
                    account,
                )?;
            }
            other => {
                return Err(anyhow::anyhow!(
                    "Unknown configuration block '{}'. Valid blocks: certificate-authority, key-store, certificate-authority-account",
                    other
                ));
            }
        }
    }

    debug!(
        certificate_authorities = config.certificate_authorities.len(),
        key_stores = config.key_stores.len(),
        accounts = config.accounts.len(),
        "Parsed configuration"
    );
    Ok(config)
}
