//! Order document: a device shipment tracked against the vendor's
//! fulfillment lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::patient::Address;
use crate::{DeviceType, StatusEntry};

/// All valid order lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Pending,
    Processing,
    Shipped,
    /// Order arrived at the patient. **Terminal.**
    Delivered,
    /// Order cancelled before shipment. **Terminal.**
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of an order: a device class and how many units of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub device_type: DeviceType,
    pub quantity: u32,
}

/// A device-shipment order.
///
/// `vendor_order_id` is set at most once (when the vendor acknowledges order
/// creation) and is the join key for all subsequent fulfillment webhooks.
/// Once `Delivered` or `Cancelled` the order is immutable apart from audit
/// appends.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Internal human-readable order number, e.g. `ORD-20260101-ABC123`.
    pub order_number: String,
    pub vendor_order_id: Option<String>,
    pub patient_id: Uuid,
    pub items: Vec<LineItem>,
    pub status: OrderStatus,
    /// Shipping address snapshot taken at order creation.
    pub shipping_address: Address,
    pub shipping_method: String,
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub notes: String,
    pub status_history: Vec<StatusEntry<OrderStatus>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new `Pending` order with a generated order number.
    pub fn new(
        patient_id: Uuid,
        items: Vec<LineItem>,
        shipping_address: Address,
        notes: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number: generate_order_number(now),
            vendor_order_id: None,
            patient_id,
            items,
            status: OrderStatus::Pending,
            shipping_address,
            shipping_method: "standard".to_string(),
            tracking_number: None,
            tracking_url: None,
            shipped_at: None,
            delivered_at: None,
            notes: notes.into(),
            status_history: vec![StatusEntry::new(OrderStatus::Pending, now, "Order created")],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push_history(&mut self, status: OrderStatus, now: DateTime<Utc>, note: impl Into<String>) {
        self.status_history.push(StatusEntry::new(status, now, note));
    }

    /// Total number of device units across all line items.
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Generate a unique human-readable order number: `ORD-YYYYMMDD-XXXXXX`.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_shape() {
        let now = "2026-01-01T00:00:00Z".parse().unwrap();
        let n = generate_order_number(now);
        assert!(n.starts_with("ORD-20260101-"), "{n}");
        assert_eq!(n.len(), "ORD-20260101-".len() + 6);
    }

    #[test]
    fn new_order_starts_pending_with_one_history_entry() {
        let now = chrono::Utc::now();
        let o = Order::new(
            Uuid::new_v4(),
            vec![LineItem {
                device_type: DeviceType::BloodPressure,
                quantity: 2,
            }],
            Address::default(),
            "",
            now,
        );
        assert_eq!(o.status, OrderStatus::Pending);
        assert_eq!(o.status_history.len(), 1);
        assert_eq!(o.unit_count(), 2);
        assert!(o.vendor_order_id.is_none());
    }
}
