//! Request/response shapes for the vendor fulfillment API.

use rpm_types::{Address, DeviceType};
use serde::{Deserialize, Serialize};

/// One device line of a fulfillment request.
#[derive(Clone, Debug, Serialize)]
pub struct OrderItem {
    pub device_type: DeviceType,
    pub quantity: u32,
}

/// Shipping recipient.
#[derive(Clone, Debug, Serialize)]
pub struct Recipient {
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl From<&Address> for Recipient {
    fn from(a: &Address) -> Self {
        Self {
            name: a.name.clone(),
            street: a.street.clone(),
            city: a.city.clone(),
            state: a.state.clone(),
            zip_code: a.zip_code.clone(),
        }
    }
}

/// A fulfillment request as the engine sees it.
#[derive(Clone, Debug)]
pub struct CreateOrderRequest {
    /// Our order number, echoed back by the vendor in webhooks for tracing.
    pub order_number: String,
    pub recipient: Recipient,
    pub items: Vec<OrderItem>,
}

impl CreateOrderRequest {
    pub fn to_wire(&self) -> WireOrderRequest {
        WireOrderRequest {
            external_reference: self.order_number.clone(),
            recipient: self.recipient.clone(),
            items: self.items.clone(),
        }
    }
}

/// On-the-wire order request body.
#[derive(Clone, Debug, Serialize)]
pub struct WireOrderRequest {
    pub external_reference: String,
    pub recipient: Recipient,
    pub items: Vec<OrderItem>,
}

/// On-the-wire acknowledgement body.
#[derive(Clone, Debug, Deserialize)]
pub struct WireOrderAck {
    pub fulfillment_request_id: String,
}

/// The vendor's acknowledgement of an accepted order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VendorOrderAck {
    pub vendor_order_id: String,
}

/// The vendor's view of an order, as returned by the status poll.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderStatusInfo {
    pub status: String,
    pub tracking_number: Option<String>,
    /// Days from submission to estimated delivery.
    pub estimated_delivery_days: Option<u32>,
}

/// Gateway registration request.
#[derive(Clone, Debug, Serialize)]
pub struct RegisterDeviceRequest {
    pub serial_number: String,
    pub device_type: DeviceType,
}

/// On-the-wire gateway acknowledgement body.
#[derive(Clone, Debug, Deserialize)]
pub struct WireDeviceAck {
    pub hardware_uuid: String,
}

/// The vendor's acknowledgement of a registered gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VendorDeviceAck {
    pub vendor_device_id: String,
}
