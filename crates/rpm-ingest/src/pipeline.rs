//! The ingestion pipeline: one total mapping function per webhook type.
//!
//! Every inbound payload is appended to the event log as `received` before
//! any processing, then dispatched; the resulting outcome completes the log
//! row exactly once. Handlers never panic past this boundary and never leave
//! an event in `received` state: every payload shape maps to `processed`,
//! `warning` or `error`.
//!
//! Idempotency is entity-level, not event-log-level: re-delivered webhooks
//! are absorbed by the state machines (same-state re-delivery) and by
//! deterministic side-effect identities (fan-out serial numbers), so the log
//! stays a pure audit trail.

use chrono::{DateTime, Utc};
use rpm_lifecycle as lifecycle;
use rpm_store::{Stores, UpdateError};
use rpm_types::{
    Device, FulfillmentPayload, MeasurementPayload, Order, OrderStatus, Reading,
    RegistrationPayload, Vital, VitalSource, WebhookEventType, WebhookStatus,
};
use serde_json::Value;

use crate::policy::{DuplicateMeasurements, IngestPolicy, StatusRetreat};

/// Structured result of processing one webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Processed,
    /// Handled without mutation; the transport returns success so the vendor
    /// stops retrying.
    Warning(String),
    /// Failed; the transport returns failure so the vendor retries.
    Error(String),
}

impl Outcome {
    pub fn log_status(&self) -> WebhookStatus {
        match self {
            Self::Processed => WebhookStatus::Processed,
            Self::Warning(_) => WebhookStatus::Warning,
            Self::Error(_) => WebhookStatus::Error,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Processed => None,
            Self::Warning(d) | Self::Error(d) => Some(d),
        }
    }
}

/// Fixed mapping from the vendor's fulfillment vocabulary to our order enum.
/// The vendor is inconsistent about casing, so the lookup is case-insensitive.
fn map_vendor_status(status: &str) -> Option<OrderStatus> {
    match status.to_ascii_lowercase().as_str() {
        "processing" => Some(OrderStatus::Processing),
        "shipped" => Some(OrderStatus::Shipped),
        "delivered" => Some(OrderStatus::Delivered),
        "cancelled" => Some(OrderStatus::Cancelled),
        _ => None,
    }
}

/// Deterministic serial for a device synthesized by delivery fan-out.
///
/// Derived from order number, device class and unit index, so re-delivering
/// the same fulfillment webhook regenerates the same serials and the
/// uniqueness check in the device store absorbs the repeat.
pub fn fanout_serial(order_number: &str, device_type: rpm_types::DeviceType, unit: u32) -> String {
    format!("SIM-{order_number}-{}-{}", device_type.short_code(), unit + 1)
}

#[derive(Clone)]
pub struct IngestPipeline {
    stores: Stores,
    policy: IngestPolicy,
}

impl IngestPipeline {
    pub fn new(stores: Stores, policy: IngestPolicy) -> Self {
        Self { stores, policy }
    }

    /// Process one authenticated webhook body.
    pub async fn ingest(
        &self,
        event_type: WebhookEventType,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Outcome {
        let event_id = self
            .stores
            .events
            .append(event_type, payload.clone(), now)
            .await;

        let outcome = match event_type {
            WebhookEventType::Measurement => self.handle_measurement(&payload, now).await,
            WebhookEventType::Fulfillment => self.handle_fulfillment(&payload, now).await,
            WebhookEventType::DeviceRegistration => self.handle_registration(&payload, now).await,
        };

        match &outcome {
            Outcome::Processed => tracing::info!(%event_type, %event_id, "webhook processed"),
            Outcome::Warning(d) => {
                tracing::warn!(%event_type, %event_id, detail = %d, "webhook absorbed with warning")
            }
            Outcome::Error(d) => {
                tracing::error!(%event_type, %event_id, detail = %d, "webhook failed")
            }
        }

        self.stores
            .events
            .complete(
                event_id,
                outcome.log_status(),
                outcome.detail().map(str::to_string),
                Utc::now(),
            )
            .await;
        outcome
    }

    /// Resolve a patient identifier claimed in a webhook payload. Unknown or
    /// unparseable claims resolve to nothing rather than failing the event.
    async fn resolve_patient(&self, claimed: Option<&str>) -> Option<uuid::Uuid> {
        let id: uuid::Uuid = claimed?.parse().ok()?;
        self.stores.patients.get(id).await.map(|p| p.id)
    }

    async fn handle_measurement(&self, payload: &Value, now: DateTime<Utc>) -> Outcome {
        let p: MeasurementPayload = match rpm_types::payload::parse_payload(payload) {
            Ok(p) => p,
            Err(e) => return Outcome::Error(e.to_string()),
        };
        let reading = match Reading::parse(p.device_type, &p.readings) {
            Ok(r) => r,
            Err(e) => return Outcome::Error(e.to_string()),
        };

        // Best-effort device resolution: a reading may legitimately arrive
        // before the registration webhook for its device.
        let device = match &p.device_id {
            Some(vendor_id) => self.stores.devices.find_by_vendor_id(vendor_id).await,
            None => None,
        };
        let timestamp = p.timestamp.unwrap_or(now);

        if let Some(d) = &device {
            if self.stores.vitals.exists_for(d.id, timestamp).await
                && self.policy.duplicate_measurements == DuplicateMeasurements::Flag
            {
                return Outcome::Warning(format!(
                    "duplicate measurement for device {} at {timestamp}",
                    d.serial_number
                ));
            }
        }

        // The device's holder wins; the payload's patient claim is the
        // fallback when the device is unknown or unassigned.
        let patient_id = match device.as_ref().and_then(|d| d.patient_id) {
            Some(id) => Some(id),
            None => self.resolve_patient(p.patient_id.as_deref()).await,
        };

        let vital = Vital::new(
            patient_id,
            device.as_ref().map(|d| d.id),
            p.device_type,
            timestamp,
            reading,
            p.metadata,
            VitalSource::DeviceWebhook,
            now,
        );
        self.stores.vitals.insert(vital).await;

        if let Some(d) = device {
            let res = self
                .stores
                .devices
                .update(d.id, |draft| {
                    lifecycle::device::reading_received(draft, timestamp, now)
                })
                .await;
            match res {
                Ok(_) => {}
                // Device vanished or is terminal: the vital is kept, the
                // freshness update is dropped, the vendor must not retry.
                Err(e) => return Outcome::Warning(e.to_string()),
            }
        }
        Outcome::Processed
    }

    async fn handle_fulfillment(&self, payload: &Value, now: DateTime<Utc>) -> Outcome {
        let p: FulfillmentPayload = match rpm_types::payload::parse_payload(payload) {
            Ok(p) => p,
            Err(e) => return Outcome::Error(e.to_string()),
        };
        let Some(to) = map_vendor_status(&p.status) else {
            return Outcome::Error(format!("unknown vendor fulfillment status: {}", p.status));
        };
        let Some(order) = self.stores.orders.find_by_vendor_order_id(&p.order_id).await else {
            return Outcome::Error(format!("order not found for vendor id {}", p.order_id));
        };

        // Vendor-reported event times take precedence over arrival time.
        let effective_now = match to {
            OrderStatus::Shipped => p.shipped_at.unwrap_or(now),
            OrderStatus::Delivered => p.delivered_at.unwrap_or(now),
            _ => now,
        };
        let tracking = lifecycle::TrackingUpdate {
            tracking_number: p.tracking_number.clone(),
            tracking_url: p.tracking_url.clone(),
        };
        let note = format!("Fulfillment update from vendor: {}", p.status);

        let res = self
            .stores
            .orders
            .update(order.id, |draft| {
                lifecycle::apply_order_transition(
                    draft,
                    to,
                    Some(&note),
                    Some(tracking),
                    effective_now,
                )
                .map(|_| ())
            })
            .await;

        let order = match res {
            Ok(order) => order,
            Err(UpdateError::NotFound) => {
                return Outcome::Error(format!("order not found for vendor id {}", p.order_id))
            }
            Err(UpdateError::Domain(e)) => {
                return match self.policy.status_retreat {
                    StatusRetreat::Warn => Outcome::Warning(e.to_string()),
                    StatusRetreat::Error => Outcome::Error(e.to_string()),
                }
            }
        };

        if to == OrderStatus::Delivered {
            // Runs on re-delivery too: deterministic serials make it safe and
            // it heals a previously interrupted fan-out.
            if let Some(warning) = self.fan_out_delivery(&order, now).await {
                return Outcome::Warning(warning);
            }
        }
        Outcome::Processed
    }

    /// Synthesize one `assigned` device per ordered unit and link each to the
    /// order's patient.
    async fn fan_out_delivery(&self, order: &Order, now: DateTime<Utc>) -> Option<String> {
        let mut warning = None;
        for item in &order.items {
            for unit in 0..item.quantity {
                let serial = fanout_serial(&order.order_number, item.device_type, unit);
                let device_id = match self.stores.devices.find_by_serial(&serial).await {
                    Some(existing) => existing.id,
                    None => {
                        let mut device = Device::new(&serial, item.device_type, now);
                        device.order_id = Some(order.id);
                        if let Err(e) =
                            lifecycle::device::assign(&mut device, order.patient_id, now)
                        {
                            warning = Some(e.to_string());
                            continue;
                        }
                        match self.stores.devices.insert(device).await {
                            Ok(d) => d.id,
                            // Lost the race with a concurrent re-delivery;
                            // the row exists, which is all we need.
                            Err(_) => match self.stores.devices.find_by_serial(&serial).await {
                                Some(d) => d.id,
                                None => continue,
                            },
                        }
                    }
                };
                if self
                    .stores
                    .patients
                    .add_device(order.patient_id, device_id)
                    .await
                    .is_err()
                {
                    warning = Some(format!(
                        "patient {} not found while linking delivered devices",
                        order.patient_id
                    ));
                }
            }
        }
        warning
    }

    async fn handle_registration(&self, payload: &Value, now: DateTime<Utc>) -> Outcome {
        let p: RegistrationPayload = match rpm_types::payload::parse_payload(payload) {
            Ok(p) => p,
            Err(e) => return Outcome::Error(e.to_string()),
        };
        let registered_at = p.registered_at.unwrap_or(now);

        match self.stores.devices.find_by_serial(&p.serial_number).await {
            Some(existing) => {
                let res = self
                    .stores
                    .devices
                    .update(existing.id, |draft| {
                        lifecycle::device::attach_vendor_registration(
                            draft,
                            &p.device_id,
                            registered_at,
                        )
                    })
                    .await;
                match res {
                    Ok(_) => Outcome::Processed,
                    Err(e) => Outcome::Warning(e.to_string()),
                }
            }
            None => {
                // Webhook-first creation: hardware can be registered with the
                // vendor before it exists here.
                let Some(device_type) = p.device_type else {
                    return Outcome::Error(format!(
                        "device_type required to create unknown serial {}",
                        p.serial_number
                    ));
                };
                let mut device = Device::new(&p.serial_number, device_type, now);
                let patient_id = self.resolve_patient(p.patient_id.as_deref()).await;
                if let Some(pid) = patient_id {
                    if let Err(e) = lifecycle::device::assign(&mut device, pid, now) {
                        return Outcome::Error(e.to_string());
                    }
                }
                if let Err(e) = lifecycle::device::attach_vendor_registration(
                    &mut device,
                    &p.device_id,
                    registered_at,
                ) {
                    return Outcome::Error(e.to_string());
                }
                match self.stores.devices.insert(device).await {
                    Ok(d) => {
                        if let Some(pid) = patient_id {
                            // Existence was checked during resolution.
                            let _ = self.stores.patients.add_device(pid, d.id).await;
                        }
                        Outcome::Processed
                    }
                    // Concurrent duplicate registration; the other delivery won.
                    Err(_) => Outcome::Processed,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_status_table_is_closed_but_case_insensitive() {
        assert_eq!(map_vendor_status("shipped"), Some(OrderStatus::Shipped));
        assert_eq!(map_vendor_status("Shipped"), Some(OrderStatus::Shipped));
        assert_eq!(map_vendor_status("SHIPPED"), Some(OrderStatus::Shipped));
        assert_eq!(map_vendor_status("in_transit"), None);
    }

    #[test]
    fn fanout_serials_are_stable_and_distinct_per_unit() {
        let a = fanout_serial("ORD-20260101-ABC123", rpm_types::DeviceType::BloodPressure, 0);
        let b = fanout_serial("ORD-20260101-ABC123", rpm_types::DeviceType::BloodPressure, 1);
        assert_eq!(a, "SIM-ORD-20260101-ABC123-BP-1");
        assert_ne!(a, b);
    }
}
