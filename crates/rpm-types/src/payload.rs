//! Schema-validated webhook payloads.
//!
//! Vendor payloads are loosely typed on the wire; here each webhook type gets
//! a concrete deserialized shape, and the per-device reading object becomes a
//! tagged union so downstream mapping is exhaustive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DeviceType;

/// Returned when a logged payload does not match the expected schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadError(pub String);

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed payload: {}", self.0)
    }
}

impl std::error::Error for PayloadError {}

// ---------------------------------------------------------------------------
// Reading union
// ---------------------------------------------------------------------------

/// A type-tagged reading, one variant per device class.
///
/// Serialized internally tagged on `device_type`, matching the field the
/// vendor sends alongside the readings object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "device_type", rename_all = "snake_case")]
pub enum Reading {
    BloodPressure {
        systolic: u32,
        diastolic: u32,
        pulse: Option<u32>,
        #[serde(default)]
        irregular: bool,
    },
    WeightScale {
        weight_lbs: Option<f64>,
        weight_kg: Option<f64>,
        bmi: Option<f64>,
    },
    BloodGlucose {
        glucose_mg_dl: u32,
        meal_context: Option<String>,
    },
    PulseOximeter {
        spo2: u32,
        pulse: Option<u32>,
        perfusion_index: Option<f64>,
    },
    Thermometer {
        temperature_f: Option<f64>,
        temperature_c: Option<f64>,
    },
    PeakFlow {
        pef: u32,
        fev1: Option<f64>,
    },
}

impl Reading {
    /// Parse a raw readings object against the schema for `device_type`.
    pub fn parse(device_type: DeviceType, raw: &Value) -> Result<Self, PayloadError> {
        let Value::Object(map) = raw else {
            return Err(PayloadError(format!(
                "readings must be an object, got {raw}"
            )));
        };
        // Inject the tag so serde resolves the right variant.
        let mut tagged = map.clone();
        tagged.insert(
            "device_type".to_string(),
            Value::String(device_type.as_str().to_string()),
        );
        serde_json::from_value(Value::Object(tagged))
            .map_err(|e| PayloadError(format!("{device_type} readings: {e}")))
    }

    pub fn device_type(&self) -> DeviceType {
        match self {
            Self::BloodPressure { .. } => DeviceType::BloodPressure,
            Self::WeightScale { .. } => DeviceType::WeightScale,
            Self::BloodGlucose { .. } => DeviceType::BloodGlucose,
            Self::PulseOximeter { .. } => DeviceType::PulseOximeter,
            Self::Thermometer { .. } => DeviceType::Thermometer,
            Self::PeakFlow { .. } => DeviceType::PeakFlow,
        }
    }
}

/// Device-reported transport metadata carried alongside a reading.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingMetadata {
    pub battery_level: Option<i64>,
    pub signal_strength: Option<i64>,
}

// ---------------------------------------------------------------------------
// Webhook payload shapes
// ---------------------------------------------------------------------------

/// Body of a `measurement` webhook.
#[derive(Clone, Debug, Deserialize)]
pub struct MeasurementPayload {
    /// Vendor device identifier; resolution is best effort.
    pub device_id: Option<String>,
    pub patient_id: Option<String>,
    pub device_type: DeviceType,
    /// Measurement time; the pipeline substitutes its current time if absent.
    pub timestamp: Option<DateTime<Utc>>,
    pub readings: Value,
    #[serde(default)]
    pub metadata: ReadingMetadata,
}

/// Body of a `fulfillment` webhook.
#[derive(Clone, Debug, Deserialize)]
pub struct FulfillmentPayload {
    /// Vendor order identifier (the join key stamped at order creation).
    pub order_id: String,
    /// Vendor status vocabulary; mapped through a fixed lookup table.
    pub status: String,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Body of a `device_registration` webhook.
#[derive(Clone, Debug, Deserialize)]
pub struct RegistrationPayload {
    /// Vendor device identifier being attached.
    pub device_id: String,
    pub serial_number: String,
    pub device_type: Option<DeviceType>,
    pub patient_id: Option<String>,
    pub registered_at: Option<DateTime<Utc>>,
}

/// Deserialize a logged payload value into a concrete shape.
pub fn parse_payload<T: serde::de::DeserializeOwned>(raw: &Value) -> Result<T, PayloadError> {
    serde_json::from_value(raw.clone()).map_err(|e| PayloadError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blood_pressure_reading_parses() {
        let raw = json!({"systolic": 120, "diastolic": 80, "pulse": 72});
        let r = Reading::parse(DeviceType::BloodPressure, &raw).unwrap();
        assert_eq!(
            r,
            Reading::BloodPressure {
                systolic: 120,
                diastolic: 80,
                pulse: Some(72),
                irregular: false,
            }
        );
        assert_eq!(r.device_type(), DeviceType::BloodPressure);
    }

    #[test]
    fn reading_schema_mismatch_is_an_error() {
        // Glucose fields against the blood-pressure schema.
        let raw = json!({"glucose_mg_dl": 110});
        assert!(Reading::parse(DeviceType::BloodPressure, &raw).is_err());
    }

    #[test]
    fn non_object_readings_rejected() {
        assert!(Reading::parse(DeviceType::PeakFlow, &json!(42)).is_err());
    }

    #[test]
    fn measurement_payload_accepts_missing_timestamp_and_device() {
        let p: MeasurementPayload = parse_payload(&json!({
            "event_type": "measurement",
            "device_type": "thermometer",
            "readings": {"temperature_f": 98.6}
        }))
        .unwrap();
        assert!(p.device_id.is_none());
        assert!(p.timestamp.is_none());
        assert_eq!(p.device_type, DeviceType::Thermometer);
    }
}
