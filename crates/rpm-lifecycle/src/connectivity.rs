//! Read-time connectivity derivation.
//!
//! "Offline" is never persisted: it is computed from elapsed time since the
//! last reading whenever the report is requested. This avoids a background
//! timer entirely and self-corrects the instant a new reading arrives.

use chrono::{DateTime, Utc};
use rpm_types::{Device, DeviceStatus};

/// Devices silent for at least this many days appear in the offline report.
pub const DEFAULT_OFFLINE_THRESHOLD_DAYS: i64 = 3;

/// Alert severity derived from days without a reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    fn from_days(days: i64) -> Self {
        if days >= 7 {
            Self::Critical
        } else if days >= 3 {
            Self::Warning
        } else {
            Self::Info
        }
    }
}

/// One row of the offline report.
#[derive(Clone, Debug, serde::Serialize)]
pub struct OfflineDevice {
    pub device: Device,
    pub days_offline: i64,
    pub severity: Severity,
}

/// Compute the offline report for a set of devices.
///
/// Only `active`/`assigned` devices holding a patient reference are eligible.
/// A device that has never reported is measured from its assignment (falling
/// back to creation) time. Results are sorted most-silent first.
pub fn offline_report(devices: &[Device], now: DateTime<Utc>) -> Vec<OfflineDevice> {
    let mut report: Vec<OfflineDevice> = devices
        .iter()
        .filter(|d| {
            matches!(d.status, DeviceStatus::Active | DeviceStatus::Assigned)
                && d.patient_id.is_some()
        })
        .filter_map(|d| {
            let reference = d
                .last_reading_at
                .or(d.assigned_at)
                .unwrap_or(d.created_at);
            let days_offline = (now - reference).num_days();
            // Recently-heard devices are not offline at all.
            if d.last_reading_at.is_some() && days_offline < DEFAULT_OFFLINE_THRESHOLD_DAYS {
                return None;
            }
            Some(OfflineDevice {
                device: d.clone(),
                days_offline: days_offline.max(0),
                severity: Severity::from_days(days_offline),
            })
        })
        .collect();

    report.sort_by(|a, b| b.days_offline.cmp(&a.days_offline));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rpm_types::DeviceType;
    use uuid::Uuid;

    fn device_with_reading(days_ago: i64, now: DateTime<Utc>) -> Device {
        let mut d = Device::new(format!("SN-{days_ago}"), DeviceType::WeightScale, now);
        crate::device::assign(&mut d, Uuid::new_v4(), now - Duration::days(30)).unwrap();
        crate::device::reading_received(&mut d, now - Duration::days(days_ago), now).unwrap();
        d
    }

    #[test]
    fn severity_bands() {
        assert_eq!(Severity::from_days(0), Severity::Info);
        assert_eq!(Severity::from_days(3), Severity::Warning);
        assert_eq!(Severity::from_days(6), Severity::Warning);
        assert_eq!(Severity::from_days(7), Severity::Critical);
    }

    #[test]
    fn report_sorted_most_silent_first_and_skips_fresh() {
        let now = Utc::now();
        let devices = vec![
            device_with_reading(4, now),
            device_with_reading(10, now),
            device_with_reading(1, now), // fresh, excluded
        ];
        let report = offline_report(&devices, now);
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].days_offline, 10);
        assert_eq!(report[0].severity, Severity::Critical);
        assert_eq!(report[1].days_offline, 4);
        assert_eq!(report[1].severity, Severity::Warning);
    }

    #[test]
    fn never_read_device_measured_from_assignment() {
        let now = Utc::now();
        let mut d = Device::new("SN-NEW", DeviceType::BloodGlucose, now - Duration::days(60));
        crate::device::assign(&mut d, Uuid::new_v4(), now - Duration::days(2)).unwrap();

        let report = offline_report(&[d], now);
        // Included even below the threshold because it has never reported.
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].days_offline, 2);
        assert_eq!(report[0].severity, Severity::Info);
    }

    #[test]
    fn unassigned_and_terminal_devices_excluded() {
        let now = Utc::now();
        let inventory = Device::new("SN-INV", DeviceType::Thermometer, now - Duration::days(30));

        let mut lost = device_with_reading(20, now);
        crate::device::mark_lost(&mut lost, None, now).unwrap();

        assert!(offline_report(&[inventory, lost], now).is_empty());
    }
}
