//! Lifecycle state machines for orders and devices.
//!
//! # Design
//!
//! Every status change goes through an explicit transition function that
//! enforces two invariants:
//!
//! 1. **Legal transitions only.** Illegal moves return an error and leave the
//!    entity untouched — never silently clamped.
//! 2. **Idempotent re-delivery.** Vendor webhooks may be retried; re-applying
//!    the status an entity is already in is a no-op that still appends an
//!    audit history entry.
//!
//! Offline-ness is deliberately NOT a persisted transition: it is derived at
//! read time from elapsed time since the last reading (see [`connectivity`]),
//! so it self-corrects the instant a new reading arrives.

pub mod connectivity;
pub mod device;
pub mod order;

pub use connectivity::{offline_report, OfflineDevice, Severity, DEFAULT_OFFLINE_THRESHOLD_DAYS};
pub use device::{
    assign, attach_vendor_registration, mark_lost, mark_returned, reading_received,
    DeviceLifecycleError,
};
pub use order::{apply_order_transition, Applied, InvalidTransition, TrackingUpdate};
