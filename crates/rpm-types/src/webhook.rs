//! Webhook event ledger entry: the append-only audit record of every inbound
//! vendor notification. This is the idempotency ledger for operators — the
//! pipeline itself deduplicates at the entity level, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The three webhook types the vendor delivers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventType {
    Measurement,
    Fulfillment,
    DeviceRegistration,
}

impl WebhookEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measurement => "measurement",
            Self::Fulfillment => "fulfillment",
            Self::DeviceRegistration => "device_registration",
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of a logged webhook event.
///
/// Every event starts `Received` and is completed exactly once with one of
/// the three terminal statuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Received,
    Processed,
    /// Handled without mutation; success returned so the vendor stops retrying.
    Warning,
    /// Failed; the vendor's automatic retry is allowed to happen again.
    Error,
}

impl WebhookStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Received)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processed => "processed",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub event_type: WebhookEventType,
    /// Raw payload as delivered, kept verbatim for audit.
    pub payload: Value,
    pub status: WebhookStatus,
    pub error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
