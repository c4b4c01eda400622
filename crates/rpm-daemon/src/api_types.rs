//! Request/response bodies for the rpm-daemon HTTP API.

use std::collections::BTreeMap;

use rpm_types::{Address, DeviceType, LineItem, WebhookEvent};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    pub sandbox_vendor: bool,
}

/// Success acknowledgement for a webhook delivery. `warning` is present when
/// the event was absorbed without mutation.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub mrn: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub conditions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub patient_id: Uuid,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProvisionDeviceRequest {
    pub serial_number: String,
    pub device_type: DeviceType,
}

#[derive(Debug, Deserialize)]
pub struct AssignDeviceRequest {
    pub patient_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct CloseOutDeviceRequest {
    #[serde(default)]
    pub note: Option<String>,
}

/// Simple status-count rollup across the stores.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub patients: usize,
    pub vitals: usize,
    pub devices_by_status: BTreeMap<String, usize>,
    pub orders_by_status: BTreeMap<String, usize>,
    pub webhooks_by_status: BTreeMap<String, usize>,
}

/// Audit view of recent webhook deliveries.
#[derive(Debug, Serialize)]
pub struct WebhookEventsResponse {
    pub events: Vec<WebhookEvent>,
    pub counts: BTreeMap<String, usize>,
}
