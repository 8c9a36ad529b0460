//! ACME certificate authority accounts
//!
//! Manages the lifecycle of an account registered with an ACME certificate
//! authority: registration, contact and terms-of-service updates, account
//! key rotation, deactivation and directory metadata.
//!
//! # Architecture
//!
//! - [`AcmeClient`] - Protocol seam; performs the remote ACME requests
//! - [`AccountResource`] - Resolvable `certificate-authority-account` resource
//! - [`AccountBinding`] - Live account: endpoints, contacts and key location
//! - [`AccountManager`] - Management operations on one account
//!
//! # Example
//!
//! ```kdl
//! key-store "accounts" {
//!     path "/var/lib/keyward/accounts.json"
//!     credential-reference clear-text="changeit"
//! }
//!
//! certificate-authority-account "ops" {
//!     contact-urls "mailto:ops@example.com"
//!     key-store "accounts"
//!     alias "ops"
//! }
//! ```
//!
//! # Key handling
//!
//! The account key is never cached by an operation. Every operation reads
//! the current key from the key store, so a rotated key is picked up by the
//! next operation. A rotated key is written back to the key store only after
//! the certificate authority has accepted it.

mod account;
mod client;
mod error;
mod manager;
mod metadata;

pub use account::{AccountBinding, AccountDefinition, AccountResource, AccountStatus};
pub use client::{AcmeAccount, AcmeClient, OfflineClient};
pub use error::AcmeError;
pub use manager::AccountManager;
pub use metadata::AcmeMetadata;
