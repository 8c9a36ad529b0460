//! Lazy, memoizing resolution of configured resources.
//!
//! A configured resource can be obtained through two paths:
//!
//! - **Direct access** ([`ResolutionCell::direct_access`]): a management
//!   operation needs the live value right now and supplies its operation
//!   context, from which the configuration is read and the value is created
//!   immediately.
//! - **Service start** ([`ResolutionCell::deferred_get`]): the value is
//!   produced by a closure prepared earlier through
//!   [`ResolutionCell::prepare_dependent_service`], which captured handles to
//!   everything it depends on at preparation time.
//!
//! Whichever path runs first produces the value; the other path observes the
//! cached result. A value is never produced twice.
//!
//! # Locking and cycle detection
//!
//! Every first resolution, for every address, runs under one process-wide
//! reentrant lock. Each thread also keeps the chain of addresses it is
//! currently resolving. Re-entering an address already on the chain fails
//! with [`ResolutionError::CycleDetected`] instead of recursing forever.
//!
//! The per-thread chain is only sufficient because the lock is global: two
//! threads can never be mid-resolution at the same time, so a cross-thread
//! wait cycle cannot form. Making the lock finer grained requires replacing
//! the chain with a shared wait-for graph.
//!
//! Once a value is resolved, reads are lock-free.

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::ReentrantMutex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::ids::Address;

// State constants for AtomicU8
const STATUS_UNRESOLVED: u8 = 0;
const STATUS_RESOLVING: u8 = 1;
const STATUS_RESOLVED: u8 = 2;

/// Serializes every first resolution in the process.
static RESOLUTION_LOCK: Lazy<ReentrantMutex<()>> = Lazy::new(|| ReentrantMutex::new(()));

thread_local! {
    static RESOLUTION_CHAIN: RefCell<Vec<Address>> = const { RefCell::new(Vec::new()) };
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by the resolver itself.
///
/// Both variants are programming or configuration errors: they are detected
/// synchronously and retrying the same call will fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// A resource transitively depends on itself
    #[error("cycle detected while resolving resources: {}", DisplayChain(.chain))]
    CycleDetected { chain: Vec<Address> },

    /// The resource was accessed without a context before any management
    /// operation initialized it
    #[error("resource {address} accessed before it was initialized by a management operation")]
    IllegalInitialization { address: Address },
}

struct DisplayChain<'a>(&'a [Address]);

impl fmt::Display for DisplayChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, address) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", address)?;
        }
        Ok(())
    }
}

// ============================================================================
// Resolution chain
// ============================================================================

/// Addresses currently being resolved on the calling thread, outermost first.
pub fn resolution_chain() -> Vec<Address> {
    RESOLUTION_CHAIN.with(|chain| chain.borrow().clone())
}

/// Guard for one address on the current thread's resolution chain.
///
/// Popped on drop, so the chain unwinds on failure as well as success.
struct ResolutionFrame;

impl ResolutionFrame {
    fn enter(address: &Address) -> Result<Self, ResolutionError> {
        RESOLUTION_CHAIN.with(|chain| {
            let mut chain = chain.borrow_mut();
            if chain.contains(address) {
                let mut cycle = chain.clone();
                cycle.push(address.clone());
                return Err(ResolutionError::CycleDetected { chain: cycle });
            }
            chain.push(address.clone());
            trace!(address = %address, depth = chain.len(), "Entered resolution frame");
            Ok(ResolutionFrame)
        })
    }
}

impl Drop for ResolutionFrame {
    fn drop(&mut self) {
        RESOLUTION_CHAIN.with(|chain| {
            if let Some(address) = chain.borrow_mut().pop() {
                trace!(address = %address, "Left resolution frame");
            }
        });
    }
}

/// Marks a cell as resolving until [`resolved`](Self::resolved) is called.
///
/// Dropping the guard any other way, including while unwinding from a
/// panicking producer, puts the cell back to unresolved.
struct ResolvingStatus<'a> {
    status: &'a AtomicU8,
}

impl<'a> ResolvingStatus<'a> {
    fn enter(status: &'a AtomicU8) -> Self {
        status.store(STATUS_RESOLVING, Ordering::Release);
        Self { status }
    }

    fn resolved(self) {
        self.status.store(STATUS_RESOLVED, Ordering::Release);
    }
}

impl Drop for ResolvingStatus<'_> {
    fn drop(&mut self) {
        let _ = self.status.compare_exchange(
            STATUS_RESOLVING,
            STATUS_UNRESOLVED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

// ============================================================================
// Service builder
// ============================================================================

/// Collects the dependencies a deferred producer will need.
///
/// Handles to dependencies are captured by the producer when it is prepared;
/// the builder records their addresses so the service container can start
/// them first.
#[derive(Debug, Clone)]
pub struct ServiceBuilder {
    service: Address,
    requirements: Vec<Address>,
}

impl ServiceBuilder {
    pub fn new(service: Address) -> Self {
        Self {
            service,
            requirements: Vec::new(),
        }
    }

    /// Declare that the service requires `dependency` to be started first
    pub fn requires(&mut self, dependency: &Address) -> &mut Self {
        if !self.requirements.contains(dependency) {
            self.requirements.push(dependency.clone());
        }
        self
    }

    pub fn service(&self) -> &Address {
        &self.service
    }

    pub fn requirements(&self) -> &[Address] {
        &self.requirements
    }
}

// ============================================================================
// Resolvable resources
// ============================================================================

/// Deferred producer used by the service-start path.
pub type Producer<T, E> = Box<dyn Fn() -> Result<T, E> + Send + Sync>;

/// A configured resource whose value is produced lazily.
pub trait Resolvable: Send + Sync + 'static {
    /// Management context supplied by the direct-access path
    type Context: ?Sized;
    /// Persisted configuration, read once
    type Configuration: Send + Sync + 'static;
    /// The live value handed to consumers
    type Value: Clone + Send + Sync + 'static;
    /// Error type of the resource's own failures
    type Error: From<ResolutionError> + Send + 'static;

    /// Read the persisted configuration of the resource.
    fn read_configuration(&self, context: &Self::Context)
        -> Result<Self::Configuration, Self::Error>;

    /// Produce the value immediately, on behalf of a management operation.
    fn create_immediately(
        &self,
        context: &Self::Context,
        configuration: &Self::Configuration,
    ) -> Result<Self::Value, Self::Error>;

    /// Build the producer used when the resource is started as a service.
    ///
    /// Dependencies must be looked up here and captured by the returned
    /// closure, not looked up when it runs.
    fn prepare_service(
        &self,
        context: &Self::Context,
        configuration: &Self::Configuration,
        builder: &mut ServiceBuilder,
    ) -> Result<Producer<Self::Value, Self::Error>, Self::Error>;
}

/// Observable resolution state of a [`ResolutionCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    Unresolved,
    Resolving,
    Resolved,
}

// ============================================================================
// Resolution cell
// ============================================================================

/// Memo cell for one configured resource.
///
/// Exactly one cell exists per [`Address`]. It is owned by whatever declared
/// the resource and shared (usually behind an `Arc`) with every consumer.
pub struct ResolutionCell<R: Resolvable> {
    address: Address,
    resource: R,
    status: AtomicU8,
    configuration: OnceCell<R::Configuration>,
    producer: OnceCell<Producer<R::Value, R::Error>>,
    requirements: OnceCell<Vec<Address>>,
    value: OnceCell<R::Value>,
}

impl<R: Resolvable> ResolutionCell<R> {
    pub fn new(address: Address, resource: R) -> Self {
        trace!(address = %address, "Declaring resolution cell");
        Self {
            address,
            resource,
            status: AtomicU8::new(STATUS_UNRESOLVED),
            configuration: OnceCell::new(),
            producer: OnceCell::new(),
            requirements: OnceCell::new(),
            value: OnceCell::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn status(&self) -> ResolutionStatus {
        match self.status.load(Ordering::Acquire) {
            STATUS_RESOLVING => ResolutionStatus::Resolving,
            STATUS_RESOLVED => ResolutionStatus::Resolved,
            _ => ResolutionStatus::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.value.get().is_some()
    }

    /// Addresses declared through the service builder, empty until prepared
    pub fn requirements(&self) -> &[Address] {
        self.requirements.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// The configuration read so far, if any
    pub fn configuration(&self) -> Option<&R::Configuration> {
        self.configuration.get()
    }

    /// Read the persisted configuration, at most once.
    ///
    /// Without a context this only succeeds once the configuration has
    /// already been read through a management operation.
    pub fn resolve_configuration(&self, context: Option<&R::Context>) -> Result<(), R::Error> {
        if self.configuration.get().is_some() {
            return Ok(());
        }
        let _guard = RESOLUTION_LOCK.lock();
        self.configuration_locked(context).map(|_| ())
    }

    /// Prepare the deferred producer used by [`deferred_get`](Self::deferred_get).
    ///
    /// Reads the configuration first. Preparing an already prepared cell is a
    /// no-op.
    pub fn prepare_dependent_service(
        &self,
        context: &R::Context,
        builder: &mut ServiceBuilder,
    ) -> Result<(), R::Error> {
        let _guard = RESOLUTION_LOCK.lock();
        let configuration = self.configuration_locked(Some(context))?;

        if self.producer.get().is_some() {
            trace!(address = %self.address, "Service producer already prepared");
            return Ok(());
        }

        let producer = self.resource.prepare_service(context, configuration, builder)?;
        let _ = self.producer.set(producer);
        let _ = self.requirements.set(builder.requirements().to_vec());

        debug!(
            address = %self.address,
            requirements = builder.requirements().len(),
            "Prepared service producer"
        );
        Ok(())
    }

    /// Runtime access on behalf of a management operation.
    ///
    /// Returns the cached value if one exists, otherwise reads the
    /// configuration from `context` and creates the value immediately.
    pub fn direct_access(&self, context: Option<&R::Context>) -> Result<R::Value, R::Error> {
        if let Some(value) = self.value.get() {
            trace!(address = %self.address, "Resolved value cache hit");
            return Ok(value.clone());
        }

        let Some(context) = context else {
            return Err(ResolutionError::IllegalInitialization {
                address: self.address.clone(),
            }
            .into());
        };

        self.resolve(|| {
            let configuration = self.configuration_locked(Some(context))?;
            self.resource.create_immediately(context, configuration)
        })
    }

    /// Service-start access, through the prepared producer.
    pub fn deferred_get(&self) -> Result<R::Value, R::Error> {
        if let Some(value) = self.value.get() {
            trace!(address = %self.address, "Resolved value cache hit");
            return Ok(value.clone());
        }

        self.resolve(|| {
            let producer =
                self.producer
                    .get()
                    .ok_or_else(|| ResolutionError::IllegalInitialization {
                        address: self.address.clone(),
                    })?;
            producer()
        })
    }

    /// Must be called with `RESOLUTION_LOCK` held.
    fn configuration_locked(
        &self,
        context: Option<&R::Context>,
    ) -> Result<&R::Configuration, R::Error> {
        if let Some(configuration) = self.configuration.get() {
            return Ok(configuration);
        }

        let Some(context) = context else {
            return Err(ResolutionError::IllegalInitialization {
                address: self.address.clone(),
            }
            .into());
        };

        let configuration = self.resource.read_configuration(context)?;
        debug!(address = %self.address, "Read resource configuration");
        Ok(self.configuration.get_or_init(|| configuration))
    }

    fn resolve<F>(&self, produce: F) -> Result<R::Value, R::Error>
    where
        F: FnOnce() -> Result<R::Value, R::Error>,
    {
        let _frame = ResolutionFrame::enter(&self.address)?;
        let _guard = RESOLUTION_LOCK.lock();

        // Another thread may have finished while we waited for the lock
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }

        let resolving = ResolvingStatus::enter(&self.status);
        debug!(address = %self.address, "Resolving resource");

        let value = produce()?;
        let value = self.value.get_or_init(|| value).clone();
        resolving.resolved();
        debug!(address = %self.address, "Resource resolved");
        Ok(value)
    }
}

impl<R: Resolvable> fmt::Debug for ResolutionCell<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionCell")
            .field("address", &self.address)
            .field("status", &self.status())
            .field("prepared", &self.producer.get().is_some())
            .finish()
    }
}
