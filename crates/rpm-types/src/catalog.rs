//! Static catalog of the vendor's device hardware.

use crate::DeviceType;

/// One orderable device model.
#[derive(Clone, Copy, Debug, serde::Serialize)]
pub struct CatalogEntry {
    pub device_type: DeviceType,
    pub name: &'static str,
    pub model: &'static str,
    /// Field names present in this device's reading payload.
    pub reading_fields: &'static [&'static str],
}

pub const DEVICE_CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        device_type: DeviceType::BloodPressure,
        name: "Blood Pressure Monitor",
        model: "BP-100",
        reading_fields: &["systolic", "diastolic", "pulse", "irregular"],
    },
    CatalogEntry {
        device_type: DeviceType::WeightScale,
        name: "Digital Weight Scale",
        model: "WS-200",
        reading_fields: &["weight_lbs", "weight_kg", "bmi"],
    },
    CatalogEntry {
        device_type: DeviceType::BloodGlucose,
        name: "Blood Glucose Meter",
        model: "BG-300",
        reading_fields: &["glucose_mg_dl", "meal_context"],
    },
    CatalogEntry {
        device_type: DeviceType::PulseOximeter,
        name: "Pulse Oximeter",
        model: "PO-400",
        reading_fields: &["spo2", "pulse", "perfusion_index"],
    },
    CatalogEntry {
        device_type: DeviceType::Thermometer,
        name: "Digital Thermometer",
        model: "TH-500",
        reading_fields: &["temperature_f", "temperature_c"],
    },
    CatalogEntry {
        device_type: DeviceType::PeakFlow,
        name: "Peak Flow Meter",
        model: "PF-600",
        reading_fields: &["pef", "fev1"],
    },
];

/// Look up the catalog entry for a device type.
pub fn catalog_entry(device_type: DeviceType) -> &'static CatalogEntry {
    match device_type {
        DeviceType::BloodPressure => &DEVICE_CATALOG[0],
        DeviceType::WeightScale => &DEVICE_CATALOG[1],
        DeviceType::BloodGlucose => &DEVICE_CATALOG[2],
        DeviceType::PulseOximeter => &DEVICE_CATALOG[3],
        DeviceType::Thermometer => &DEVICE_CATALOG[4],
        DeviceType::PeakFlow => &DEVICE_CATALOG[5],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_device_type() {
        for dt in DeviceType::all() {
            assert_eq!(catalog_entry(*dt).device_type, *dt);
        }
    }
}
