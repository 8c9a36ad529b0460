//! Keyward Security
//!
//! Key stores and ACME certificate authority accounts, resolved lazily
//! through [`keyward_common::ResolutionCell`]s.
//!
//! - **Key stores**: file-backed or fileless alias-keyed key material with
//!   revertible loads
//! - **Accounts**: registration, updates, key rotation, deactivation and
//!   directory metadata against an injected [`AcmeClient`]
//! - **Subsystem**: declares every configured resource and drives it through
//!   the management or the service-start path
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use keyward_config::Config;
//! use keyward_security::{OfflineClient, SecuritySubsystem};
//!
//! let config = Config::from_file("keyward.kdl")?;
//! let subsystem = SecuritySubsystem::new(config, Arc::new(OfflineClient))?;
//! let ctx = subsystem.operation_context();
//! let accounts = subsystem.key_store(&ctx, "accounts")?;
//! println!("{:?}", accounts.aliases());
//! ```

pub mod acme;
pub mod capabilities;
pub mod context;
pub mod error;
pub mod keystore;
pub mod subsystem;

pub use acme::{
    AccountBinding, AccountManager, AccountStatus, AcmeAccount, AcmeClient, AcmeError,
    AcmeMetadata, OfflineClient,
};
pub use capabilities::CapabilityRegistry;
pub use context::OperationContext;
pub use error::{KeyStoreError, OperationError};
pub use keystore::{
    AliasInfo, AliasListing, KeyMaterial, KeyStoreBacking, KeyStoreEntry, KeyStoreService,
    RevertToken,
};
pub use subsystem::SecuritySubsystem;
