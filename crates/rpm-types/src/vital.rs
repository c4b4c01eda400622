//! Vital document: one time-series reading ingested from a device (or
//! synthesized in sandbox mode). Immutable once created; subject to a
//! retention sweep in the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payload::{Reading, ReadingMetadata};
use crate::DeviceType;

/// Where a reading came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VitalSource {
    /// Delivered by the vendor's measurement webhook.
    DeviceWebhook,
    Manual,
    Sandbox,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vital {
    pub id: Uuid,
    pub patient_id: Option<Uuid>,
    /// Null when the reading arrived before the device was registered here.
    pub device_id: Option<Uuid>,
    pub device_type: DeviceType,
    /// Measurement time. Unique per device within the retention window;
    /// colliding timestamps are disambiguated by the store, never overwritten.
    pub timestamp: DateTime<Utc>,
    pub reading: Reading,
    pub metadata: ReadingMetadata,
    pub source: VitalSource,
    pub created_at: DateTime<Utc>,
}

impl Vital {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        patient_id: Option<Uuid>,
        device_id: Option<Uuid>,
        device_type: DeviceType,
        timestamp: DateTime<Utc>,
        reading: Reading,
        metadata: ReadingMetadata,
        source: VitalSource,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            device_id,
            device_type,
            timestamp,
            reading,
            metadata,
            source,
            created_at: now,
        }
    }
}
