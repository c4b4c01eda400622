//! Order workflow operations invoked by operators (not by webhooks).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rpm_lifecycle as lifecycle;
use rpm_store::{Stores, UpdateError};
use rpm_types::{Address, LineItem, Order, OrderStatus};
use rpm_vendor::{CreateOrderRequest, OrderItem, Recipient, VendorApi, VendorError};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderServiceError {
    PatientNotFound(Uuid),
    OrderNotFound(Uuid),
    EmptyOrder,
    /// The order has no vendor order id yet (vendor submission incomplete).
    NotSubmitted(Uuid),
    Transition(lifecycle::InvalidTransition),
    Vendor(VendorError),
}

impl std::fmt::Display for OrderServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PatientNotFound(id) => write!(f, "patient {id} not found"),
            Self::OrderNotFound(id) => write!(f, "order {id} not found"),
            Self::EmptyOrder => write!(f, "order has no line items"),
            Self::NotSubmitted(id) => write!(f, "order {id} has not been submitted to the vendor"),
            Self::Transition(e) => write!(f, "{e}"),
            Self::Vendor(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for OrderServiceError {}

impl From<VendorError> for OrderServiceError {
    fn from(e: VendorError) -> Self {
        Self::Vendor(e)
    }
}

#[derive(Clone)]
pub struct OrderService {
    stores: Stores,
    vendor: Arc<dyn VendorApi>,
}

impl OrderService {
    pub fn new(stores: Stores, vendor: Arc<dyn VendorApi>) -> Self {
        Self { stores, vendor }
    }

    /// Create an order and submit it to the vendor for fulfillment.
    ///
    /// The order is inserted as `pending` before the vendor call; on vendor
    /// acknowledgement the vendor order id is stamped (at most once) and the
    /// order advances to `processing`. If the vendor is unreachable the
    /// pending order stays in place and the caller decides whether to retry.
    pub async fn create_order(
        &self,
        patient_id: Uuid,
        items: Vec<LineItem>,
        shipping_address: Option<Address>,
        notes: String,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderServiceError> {
        if items.is_empty() || items.iter().all(|i| i.quantity == 0) {
            return Err(OrderServiceError::EmptyOrder);
        }
        let patient = self
            .stores
            .patients
            .get(patient_id)
            .await
            .ok_or(OrderServiceError::PatientNotFound(patient_id))?;
        let address = shipping_address.unwrap_or_else(|| patient.shipping_address());

        let order = Order::new(patient_id, items, address, notes, now);
        let order = self.stores.orders.insert(order).await;
        tracing::info!(order_number = %order.order_number, %patient_id, "order created");

        let ack = self
            .vendor
            .create_order(&CreateOrderRequest {
                order_number: order.order_number.clone(),
                recipient: Recipient::from(&order.shipping_address),
                items: order
                    .items
                    .iter()
                    .map(|i| OrderItem {
                        device_type: i.device_type,
                        quantity: i.quantity,
                    })
                    .collect(),
            })
            .await?;

        let note = format!("Submitted to vendor: {}", ack.vendor_order_id);
        let updated = self
            .stores
            .orders
            .update(order.id, |draft| {
                if draft.vendor_order_id.is_none() {
                    draft.vendor_order_id = Some(ack.vendor_order_id.clone());
                }
                lifecycle::apply_order_transition(
                    draft,
                    OrderStatus::Processing,
                    Some(&note),
                    None,
                    now,
                )
                .map(|_| ())
            })
            .await
            .map_err(|e| match e {
                UpdateError::NotFound => OrderServiceError::OrderNotFound(order.id),
                UpdateError::Domain(t) => OrderServiceError::Transition(t),
            })?;
        Ok(updated)
    }

    /// Poll the vendor's view of a submitted order.
    pub async fn vendor_status(
        &self,
        order_id: Uuid,
    ) -> Result<rpm_vendor::OrderStatusInfo, OrderServiceError> {
        let order = self
            .stores
            .orders
            .get(order_id)
            .await
            .ok_or(OrderServiceError::OrderNotFound(order_id))?;
        let vendor_order_id = order
            .vendor_order_id
            .as_deref()
            .ok_or(OrderServiceError::NotSubmitted(order_id))?;
        Ok(self.vendor.get_order_status(vendor_order_id).await?)
    }

    /// Cancel an order, vendor first, then locally.
    ///
    /// Refused for shipped or delivered orders before any vendor call is
    /// made, so an illegal cancel has no external side effect.
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderServiceError> {
        let order = self
            .stores
            .orders
            .get(order_id)
            .await
            .ok_or(OrderServiceError::OrderNotFound(order_id))?;
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Processing) {
            return Err(OrderServiceError::Transition(lifecycle::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            }));
        }

        if let Some(vendor_order_id) = &order.vendor_order_id {
            self.vendor.cancel_order(vendor_order_id).await?;
        }

        self.stores
            .orders
            .update(order_id, |draft| {
                lifecycle::apply_order_transition(
                    draft,
                    OrderStatus::Cancelled,
                    Some("Cancelled by operator"),
                    None,
                    now,
                )
                .map(|_| ())
            })
            .await
            .map_err(|e| match e {
                UpdateError::NotFound => OrderServiceError::OrderNotFound(order_id),
                UpdateError::Domain(t) => OrderServiceError::Transition(t),
            })
    }
}
