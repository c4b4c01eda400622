//! Ingest policy knobs.
//!
//! Two behaviors observed in production are kept configurable rather than
//! hard-coded: how a duplicate measurement delivery is handled, and whether a
//! fulfillment status that maps but cannot be applied is absorbed as a
//! warning or surfaced as an error (which lets the vendor retry).

/// Handling of a measurement whose (device, timestamp) pair was already
/// stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateMeasurements {
    /// Store the duplicate row (append-only time series; a stray duplicate
    /// is low-risk).
    #[default]
    Accept,
    /// Skip the store and complete the event as a warning.
    Flag,
}

/// Handling of a fulfillment status that is recognized but not reachable
/// from the order's current state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusRetreat {
    /// Absorb: log a warning and return success so the vendor stops
    /// retrying a webhook that can never apply.
    #[default]
    Warn,
    /// Surface an error; the vendor's retry schedule applies.
    Error,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestPolicy {
    pub duplicate_measurements: DuplicateMeasurements,
    pub status_retreat: StatusRetreat,
}

impl IngestPolicy {
    /// Load overrides from `RPM_INGEST_DUPLICATES` (`accept`|`flag`) and
    /// `RPM_INGEST_STATUS_RETREAT` (`warn`|`error`). Unset or unrecognized
    /// values keep the defaults.
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Ok(v) = std::env::var("RPM_INGEST_DUPLICATES") {
            if v.eq_ignore_ascii_case("flag") {
                policy.duplicate_measurements = DuplicateMeasurements::Flag;
            }
        }
        if let Ok(v) = std::env::var("RPM_INGEST_STATUS_RETREAT") {
            if v.eq_ignore_ascii_case("error") {
                policy.status_retreat = StatusRetreat::Error;
            }
        }
        policy
    }
}
