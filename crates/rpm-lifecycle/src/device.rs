//! Device status state machine.
//!
//! ```text
//!   inventory -> assigned -> active
//!       |            |         |
//!       +------------+---------+--> returned | lost   (terminal)
//! ```
//!
//! `assigned -> active` happens only on receipt of a reading. Reassignment of
//! a device that already holds a patient reference is refused with
//! [`DeviceLifecycleError::AlreadyAssigned`]; an explicit return is required
//! first.

use chrono::{DateTime, Utc};
use rpm_types::{Device, DeviceStatus};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceLifecycleError {
    /// The device already holds a patient reference.
    AlreadyAssigned { patient_id: Uuid },
    /// The device is in a terminal state (`returned` or `lost`).
    DeviceTerminal { status: DeviceStatus },
}

impl std::fmt::Display for DeviceLifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyAssigned { patient_id } => {
                write!(f, "device is already assigned to patient {patient_id}")
            }
            Self::DeviceTerminal { status } => {
                write!(f, "device is in terminal state {}", status.as_str())
            }
        }
    }
}

impl std::error::Error for DeviceLifecycleError {}

fn ensure_live(device: &Device) -> Result<(), DeviceLifecycleError> {
    if device.status.is_terminal() {
        return Err(DeviceLifecycleError::DeviceTerminal {
            status: device.status,
        });
    }
    Ok(())
}

/// Assign a device to a patient.
///
/// # Errors
/// - [`DeviceLifecycleError::AlreadyAssigned`] if a patient reference is
///   already present (even for the same patient — reassignment requires an
///   explicit return first).
/// - [`DeviceLifecycleError::DeviceTerminal`] for returned/lost devices.
pub fn assign(
    device: &mut Device,
    patient_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), DeviceLifecycleError> {
    ensure_live(device)?;
    if let Some(existing) = device.patient_id {
        return Err(DeviceLifecycleError::AlreadyAssigned {
            patient_id: existing,
        });
    }

    device.patient_id = Some(patient_id);
    device.status = DeviceStatus::Assigned;
    device.assigned_at = Some(now);
    device.push_history(
        DeviceStatus::Assigned,
        now,
        format!("Assigned to patient {patient_id}"),
    );
    device.updated_at = now;
    Ok(())
}

/// Process a device return: clear the patient reference and move to the
/// terminal `returned` state.
pub fn mark_returned(
    device: &mut Device,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), DeviceLifecycleError> {
    ensure_live(device)?;
    device.patient_id = None;
    device.status = DeviceStatus::Returned;
    device.push_history(
        DeviceStatus::Returned,
        now,
        note.unwrap_or("Device returned"),
    );
    device.updated_at = now;
    Ok(())
}

/// Mark a device lost: clear the patient reference and move to the terminal
/// `lost` state.
pub fn mark_lost(
    device: &mut Device,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), DeviceLifecycleError> {
    ensure_live(device)?;
    device.patient_id = None;
    device.status = DeviceStatus::Lost;
    device.push_history(DeviceStatus::Lost, now, note.unwrap_or("Device lost"));
    device.updated_at = now;
    Ok(())
}

/// Advance a device on receipt of a reading.
///
/// Promotes `assigned -> active`; in every live state the freshness signal
/// `last_reading_at` moves to the later of its current value and
/// `reading_at`, so out-of-order delivery never regresses it.
///
/// # Errors
/// [`DeviceLifecycleError::DeviceTerminal`] for returned/lost devices.
pub fn reading_received(
    device: &mut Device,
    reading_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), DeviceLifecycleError> {
    ensure_live(device)?;

    if device.status == DeviceStatus::Assigned {
        device.status = DeviceStatus::Active;
        device.push_history(DeviceStatus::Active, now, "First reading received");
    }

    device.last_reading_at = Some(match device.last_reading_at {
        Some(existing) => existing.max(reading_at),
        None => reading_at,
    });
    device.updated_at = now;
    Ok(())
}

/// Attach the vendor device identifier delivered by a registration webhook
/// and activate the device.
///
/// Re-delivery is idempotent: when already active with the same identifier,
/// only an audit history entry is appended.
pub fn attach_vendor_registration(
    device: &mut Device,
    vendor_device_id: &str,
    now: DateTime<Utc>,
) -> Result<(), DeviceLifecycleError> {
    ensure_live(device)?;

    if device.status == DeviceStatus::Active && device.vendor_device_id.as_deref() == Some(vendor_device_id)
    {
        device.push_history(
            DeviceStatus::Active,
            now,
            "Registration re-delivered; no change",
        );
        device.updated_at = now;
        return Ok(());
    }

    device.vendor_device_id = Some(vendor_device_id.to_string());
    device.status = DeviceStatus::Active;
    device.push_history(
        DeviceStatus::Active,
        now,
        format!("Registered with vendor as {vendor_device_id}"),
    );
    device.updated_at = now;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpm_types::DeviceType;

    fn inventory_device() -> Device {
        Device::new("BP-001-A1B2", DeviceType::BloodPressure, Utc::now())
    }

    #[test]
    fn assign_sets_patient_and_history() {
        let mut d = inventory_device();
        let patient = Uuid::new_v4();
        assign(&mut d, patient, Utc::now()).unwrap();
        assert_eq!(d.status, DeviceStatus::Assigned);
        assert_eq!(d.patient_id, Some(patient));
        assert!(d.assigned_at.is_some());
        assert_eq!(d.status_history.len(), 2);
    }

    #[test]
    fn reassign_without_return_is_refused() {
        let mut d = inventory_device();
        let first = Uuid::new_v4();
        assign(&mut d, first, Utc::now()).unwrap();

        let err = assign(&mut d, Uuid::new_v4(), Utc::now()).unwrap_err();
        assert_eq!(err, DeviceLifecycleError::AlreadyAssigned { patient_id: first });
        assert_eq!(d.patient_id, Some(first), "holder unchanged after refusal");
    }

    #[test]
    fn return_then_reassign_succeeds() {
        let mut d = inventory_device();
        assign(&mut d, Uuid::new_v4(), Utc::now()).unwrap();
        mark_returned(&mut d, Some("patient discharged"), Utc::now()).unwrap();
        assert_eq!(d.status, DeviceStatus::Returned);
        assert!(d.patient_id.is_none());

        // Terminal: even a fresh assignment is rejected now.
        let err = assign(&mut d, Uuid::new_v4(), Utc::now()).unwrap_err();
        assert!(matches!(err, DeviceLifecycleError::DeviceTerminal { .. }));
    }

    #[test]
    fn first_reading_promotes_assigned_to_active() {
        let mut d = inventory_device();
        assign(&mut d, Uuid::new_v4(), Utc::now()).unwrap();
        let t = Utc::now();
        reading_received(&mut d, t, Utc::now()).unwrap();
        assert_eq!(d.status, DeviceStatus::Active);
        assert_eq!(d.last_reading_at, Some(t));
    }

    #[test]
    fn out_of_order_readings_do_not_regress_freshness() {
        let mut d = inventory_device();
        assign(&mut d, Uuid::new_v4(), Utc::now()).unwrap();

        let t2: DateTime<Utc> = "2026-01-02T00:00:00Z".parse().unwrap();
        let t1: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        reading_received(&mut d, t2, Utc::now()).unwrap();
        reading_received(&mut d, t1, Utc::now()).unwrap();
        assert_eq!(d.last_reading_at, Some(t2), "T1 < T2 must not regress");
    }

    #[test]
    fn reading_on_terminal_device_is_rejected() {
        let mut d = inventory_device();
        mark_lost(&mut d, None, Utc::now()).unwrap();
        let err = reading_received(&mut d, Utc::now(), Utc::now()).unwrap_err();
        assert!(matches!(err, DeviceLifecycleError::DeviceTerminal { .. }));
        assert!(d.last_reading_at.is_none());
    }

    #[test]
    fn registration_redelivery_is_noop_with_audit() {
        let mut d = inventory_device();
        attach_vendor_registration(&mut d, "HWI-ABC", Utc::now()).unwrap();
        assert_eq!(d.status, DeviceStatus::Active);
        let before = d.status_history.len();

        attach_vendor_registration(&mut d, "HWI-ABC", Utc::now()).unwrap();
        assert_eq!(d.vendor_device_id.as_deref(), Some("HWI-ABC"));
        assert_eq!(d.status_history.len(), before + 1);
    }
}
