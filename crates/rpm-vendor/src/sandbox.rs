//! Deterministic sandbox vendor.
//!
//! Identifiers are derived by hashing stable inputs, so re-running the same
//! order in development produces the same vendor order id every time. That
//! determinism is what lets webhook replays and idempotency paths be
//! exercised without the real vendor.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::types::{
    CreateOrderRequest, OrderStatusInfo, RegisterDeviceRequest, VendorDeviceAck, VendorOrderAck,
};
use crate::{VendorApi, VendorError};

/// Derive the sandbox vendor order id for an order number: `TNV-XXXXXXXX`.
pub fn sandbox_order_id(order_number: &str) -> String {
    format!("TNV-{}", digest_prefix(order_number, 8))
}

/// Derive the sandbox hardware id for a device serial: `HWI-XXXXXXXXXXXX`.
pub fn sandbox_hardware_id(serial_number: &str) -> String {
    format!("HWI-{}", digest_prefix(serial_number, 12))
}

/// Derive the sandbox tracking number for an order number.
pub fn sandbox_tracking_number(order_number: &str) -> String {
    format!("TRK{}", digest_prefix(order_number, 10))
}

/// Estimated delivery, in days from submission, in the 3..=7 range.
pub fn sandbox_delivery_days(order_number: &str) -> u32 {
    let digest = Sha256::digest(order_number.as_bytes());
    3 + (digest[0] % 5) as u32
}

fn digest_prefix(input: &str, len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..len].to_uppercase()
}

#[derive(Debug, Default, Clone)]
pub struct SandboxVendor;

impl SandboxVendor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VendorApi for SandboxVendor {
    fn name(&self) -> &'static str {
        "sandbox"
    }

    async fn create_order(&self, req: &CreateOrderRequest) -> Result<VendorOrderAck, VendorError> {
        let vendor_order_id = sandbox_order_id(&req.order_number);
        tracing::debug!(order_number = %req.order_number, %vendor_order_id, "sandbox order accepted");
        Ok(VendorOrderAck { vendor_order_id })
    }

    async fn get_order_status(
        &self,
        vendor_order_id: &str,
    ) -> Result<OrderStatusInfo, VendorError> {
        Ok(OrderStatusInfo {
            status: "processing".to_string(),
            tracking_number: Some(sandbox_tracking_number(vendor_order_id)),
            estimated_delivery_days: Some(sandbox_delivery_days(vendor_order_id)),
        })
    }

    async fn cancel_order(&self, _vendor_order_id: &str) -> Result<(), VendorError> {
        Ok(())
    }

    async fn register_device(
        &self,
        req: &RegisterDeviceRequest,
    ) -> Result<VendorDeviceAck, VendorError> {
        Ok(VendorDeviceAck {
            vendor_device_id: sandbox_hardware_id(&req.serial_number),
        })
    }

    async fn unregister_device(&self, _vendor_device_id: &str) -> Result<(), VendorError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderItem, Recipient};
    use rpm_types::{Address, DeviceType};

    #[test]
    fn ids_are_deterministic_and_distinct() {
        assert_eq!(
            sandbox_order_id("ORD-20260101-ABC123"),
            sandbox_order_id("ORD-20260101-ABC123")
        );
        assert_ne!(
            sandbox_order_id("ORD-20260101-ABC123"),
            sandbox_order_id("ORD-20260101-ABC124")
        );
        assert!(sandbox_order_id("x").starts_with("TNV-"));
        assert_eq!(sandbox_hardware_id("SN-1").len(), "HWI-".len() + 12);
    }

    #[test]
    fn delivery_window_is_bounded() {
        for n in ["a", "b", "c", "ORD-20260101-ABC123"] {
            let days = sandbox_delivery_days(n);
            assert!((3..=7).contains(&days), "{n} -> {days}");
        }
    }

    #[tokio::test]
    async fn create_order_replays_to_the_same_id() {
        let vendor = SandboxVendor::new();
        let req = CreateOrderRequest {
            order_number: "ORD-20260101-ABC123".to_string(),
            recipient: Recipient::from(&Address::default()),
            items: vec![OrderItem {
                device_type: DeviceType::BloodPressure,
                quantity: 1,
            }],
        };
        let a = vendor.create_order(&req).await.unwrap();
        let b = vendor.create_order(&req).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn registration_is_deterministic() {
        let vendor = SandboxVendor::new();
        let req = RegisterDeviceRequest {
            serial_number: "BP-001".to_string(),
            device_type: DeviceType::BloodPressure,
        };
        let a = vendor.register_device(&req).await.unwrap();
        let b = vendor.register_device(&req).await.unwrap();
        assert_eq!(a, b);
        assert!(a.vendor_device_id.starts_with("HWI-"));
    }
}
