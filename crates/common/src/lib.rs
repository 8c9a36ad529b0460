//! Keyward Common
//!
//! Shared building blocks for the Keyward security subsystem:
//!
//! - [`Address`]: location of a configured resource in the management tree
//! - [`ResolutionCell`]: lazy, memoizing, cycle-detecting resolution of a
//!   configured resource through either a direct-access or a service-start path

pub mod ids;
pub mod resolver;

pub use ids::{Address, AddressElement};
pub use resolver::{
    resolution_chain, Producer, Resolvable, ResolutionCell, ResolutionError, ResolutionStatus,
    ServiceBuilder,
};
