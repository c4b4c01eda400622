//! Device document: monitoring hardware tracked through its lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::StatusEntry;

/// The six device classes the vendor ships.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    BloodPressure,
    WeightScale,
    BloodGlucose,
    PulseOximeter,
    Thermometer,
    PeakFlow,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BloodPressure => "blood_pressure",
            Self::WeightScale => "weight_scale",
            Self::BloodGlucose => "blood_glucose",
            Self::PulseOximeter => "pulse_oximeter",
            Self::Thermometer => "thermometer",
            Self::PeakFlow => "peak_flow",
        }
    }

    /// Short code used in deterministically derived serial numbers.
    pub fn short_code(&self) -> &'static str {
        match self {
            Self::BloodPressure => "BP",
            Self::WeightScale => "WS",
            Self::BloodGlucose => "BG",
            Self::PulseOximeter => "PO",
            Self::Thermometer => "TH",
            Self::PeakFlow => "PF",
        }
    }

    pub fn all() -> &'static [DeviceType] {
        &[
            Self::BloodPressure,
            Self::WeightScale,
            Self::BloodGlucose,
            Self::PulseOximeter,
            Self::Thermometer,
            Self::PeakFlow,
        ]
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All valid device lifecycle states.
///
/// `Offline` exists for display purposes only: offline-ness is derived at
/// read time from elapsed time since the last reading and is never persisted
/// by the state machine (see `rpm_lifecycle::connectivity`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Inventory,
    Assigned,
    Active,
    Offline,
    /// Device returned by the patient. **Terminal.**
    Returned,
    /// Device reported lost. **Terminal.**
    Lost,
}

impl DeviceStatus {
    /// Returns `true` if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Returned | Self::Lost)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inventory => "inventory",
            Self::Assigned => "assigned",
            Self::Active => "active",
            Self::Offline => "offline",
            Self::Returned => "returned",
            Self::Lost => "lost",
        }
    }
}

/// A tracked piece of monitoring hardware.
///
/// Invariants enforced by the lifecycle state machine:
/// - at most one current patient reference;
/// - `Active`/`Assigned` implies a patient reference, `Inventory`/`Returned`/
///   `Lost` implies none;
/// - `vendor_device_id` is attached once the vendor registers the device.
///
/// Devices are never hard-deleted; lifecycle end is modelled by the terminal
/// statuses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Device {
    pub id: Uuid,
    /// Vendor-independent unique serial number.
    pub serial_number: String,
    /// Identifier assigned by the vendor at registration time.
    pub vendor_device_id: Option<String>,
    pub device_type: DeviceType,
    pub status: DeviceStatus,
    pub patient_id: Option<Uuid>,
    /// The order this device shipped under, if any.
    pub order_id: Option<Uuid>,
    pub last_reading_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub status_history: Vec<StatusEntry<DeviceStatus>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Create a device in `Inventory` with its creation history entry.
    pub fn new(serial_number: impl Into<String>, device_type: DeviceType, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            serial_number: serial_number.into(),
            vendor_device_id: None,
            device_type,
            status: DeviceStatus::Inventory,
            patient_id: None,
            order_id: None,
            last_reading_at: None,
            assigned_at: None,
            status_history: vec![StatusEntry::new(DeviceStatus::Inventory, now, "Device created")],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_history(&mut self, status: DeviceStatus, now: DateTime<Utc>, note: impl Into<String>) {
        self.status_history.push(StatusEntry::new(status, now, note));
    }
}
