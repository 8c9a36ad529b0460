//! Type-safe resource addresses.
//!
//! An [`Address`] names a configured resource by its location in the
//! management tree, e.g. `/subsystem=elytron/key-store=accounts`. Addresses
//! are the keys used by the resolver for memoization and cycle detection,
//! so they are cheap to clone, totally ordered and hashable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subsystem segment shared by every security resource.
pub const SUBSYSTEM: &str = "elytron";

/// A single `type=name` step of an [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AddressElement {
    kind: String,
    name: String,
}

impl AddressElement {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Location of a configured resource in the management tree.
///
/// The empty address is the root. Ordering is lexicographic over the
/// elements, which keeps parents before their children.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(Vec<AddressElement>);

impl Address {
    /// The root address
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Address of the security subsystem itself
    pub fn subsystem() -> Self {
        Self::root().append("subsystem", SUBSYSTEM)
    }

    /// Address of a key store resource
    pub fn key_store(name: &str) -> Self {
        Self::subsystem().append("key-store", name)
    }

    /// Address of a certificate authority resource
    pub fn certificate_authority(name: &str) -> Self {
        Self::subsystem().append("certificate-authority", name)
    }

    /// Address of a certificate authority account resource
    pub fn account(name: &str) -> Self {
        Self::subsystem().append("certificate-authority-account", name)
    }

    /// Return a child address one level below this one
    pub fn append(mut self, kind: impl Into<String>, name: impl Into<String>) -> Self {
        self.0.push(AddressElement::new(kind, name));
        self
    }

    /// The last element, if any
    pub fn last(&self) -> Option<&AddressElement> {
        self.0.last()
    }

    /// Name of the last element, or an empty string for the root
    pub fn name(&self) -> &str {
        self.0.last().map(AddressElement::name).unwrap_or("")
    }

    pub fn elements(&self) -> &[AddressElement] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for element in &self.0 {
            write!(f, "/{}={}", element.kind, element.name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display() {
        assert_eq!(Address::root().to_string(), "/");
        assert_eq!(
            Address::key_store("accounts").to_string(),
            "/subsystem=elytron/key-store=accounts"
        );
        assert_eq!(
            Address::account("ops").to_string(),
            "/subsystem=elytron/certificate-authority-account=ops"
        );
    }

    #[test]
    fn test_name_and_last() {
        let address = Address::key_store("ks");
        assert_eq!(address.name(), "ks");
        assert_eq!(address.last().map(|e| e.kind()), Some("key-store"));
        assert_eq!(address.elements().len(), 2);
        assert_eq!(Address::root().name(), "");
        assert!(Address::root().is_root());
    }

    #[test]
    fn test_parent_orders_before_child() {
        let parent = Address::subsystem();
        let child = Address::key_store("a");
        assert!(parent < child);
    }

    proptest! {
        #[test]
        fn prop_equal_names_give_equal_addresses(name in "[a-z][a-z0-9-]{0,12}") {
            prop_assert_eq!(Address::key_store(&name), Address::key_store(&name));
            prop_assert_ne!(Address::key_store(&name), Address::account(&name));
        }

        #[test]
        fn prop_ordering_follows_names(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            prop_assert_eq!(
                Address::key_store(&a).cmp(&Address::key_store(&b)),
                a.cmp(&b)
            );
        }
    }
}
