//! In-memory document stores, one per aggregate.
//!
//! Each store is an `Arc<RwLock<BTreeMap>>` handle: cloning shares the
//! underlying documents. Mutation happens through a single atomic
//! read-modify-write primitive per store — the closure runs on a draft copy
//! under the write lock and is committed only when it returns `Ok`, so a
//! rejected domain operation leaves the document untouched. Concurrent
//! writers to the same aggregate serialize on the lock; different aggregates
//! never contend with each other.
//!
//! There are deliberately no cross-store transactions: every derived side
//! effect in the engine is idempotent (deterministic identifiers), which is
//! what makes single-document atomicity sufficient.

pub mod devices;
pub mod events;
pub mod orders;
pub mod patients;
pub mod vitals;

pub use devices::{DeviceStore, DuplicateSerial};
pub use events::EventLog;
pub use orders::OrderStore;
pub use patients::PatientStore;
pub use vitals::VitalStore;

/// Failure of an atomic read-modify-write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateError<E> {
    NotFound,
    /// The domain closure rejected the mutation; nothing was committed.
    Domain(E),
}

impl<E: std::fmt::Display> std::fmt::Display for UpdateError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "document not found"),
            Self::Domain(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::fmt::Display + std::fmt::Debug> std::error::Error for UpdateError<E> {}

/// Bundle of every store handle, constructed once at process start and
/// dependency-injected into each component.
#[derive(Clone, Default)]
pub struct Stores {
    pub patients: PatientStore,
    pub devices: DeviceStore,
    pub orders: OrderStore,
    pub vitals: VitalStore,
    pub events: EventLog,
}

impl Stores {
    pub fn new() -> Self {
        Self::default()
    }
}
