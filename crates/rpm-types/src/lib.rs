//! Shared document types for the remote-patient-monitoring engine.
//!
//! Every aggregate (patient, device, order, vital, webhook event) lives in its
//! own independent store; the types here are plain serde documents with no
//! store coupling. Status-history entries are append-only audit trails owned
//! by the entity document itself.

pub mod catalog;
pub mod device;
pub mod order;
pub mod patient;
pub mod payload;
pub mod vital;
pub mod webhook;

pub use catalog::{catalog_entry, CatalogEntry, DEVICE_CATALOG};
pub use device::{Device, DeviceStatus, DeviceType};
pub use order::{LineItem, Order, OrderStatus};
pub use patient::{Address, Patient};
pub use payload::{
    FulfillmentPayload, MeasurementPayload, PayloadError, Reading, ReadingMetadata,
    RegistrationPayload,
};
pub use vital::{Vital, VitalSource};
pub use webhook::{WebhookEvent, WebhookEventType, WebhookStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in an entity's append-only status history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry<S> {
    pub status: S,
    pub changed_at: DateTime<Utc>,
    pub note: String,
}

impl<S> StatusEntry<S> {
    pub fn new(status: S, changed_at: DateTime<Utc>, note: impl Into<String>) -> Self {
        Self {
            status,
            changed_at,
            note: note.into(),
        }
    }
}
