//! End-to-end pipeline scenarios: order workflow, webhook replay, fan-out.

use std::sync::Arc;

use chrono::Utc;
use rpm_ingest::{
    DuplicateMeasurements, IngestPipeline, IngestPolicy, OrderService, OrderServiceError, Outcome,
    StatusRetreat,
};
use rpm_store::Stores;
use rpm_types::{
    DeviceStatus, DeviceType, LineItem, Order, OrderStatus, Patient, WebhookEventType,
    WebhookStatus,
};
use rpm_vendor::SandboxVendor;
use serde_json::json;

struct Harness {
    stores: Stores,
    pipeline: IngestPipeline,
    orders: OrderService,
}

fn harness_with_policy(policy: IngestPolicy) -> Harness {
    let stores = Stores::new();
    let vendor = Arc::new(SandboxVendor::new());
    Harness {
        pipeline: IngestPipeline::new(stores.clone(), policy),
        orders: OrderService::new(stores.clone(), vendor),
        stores,
    }
}

fn harness() -> Harness {
    harness_with_policy(IngestPolicy::default())
}

async fn enrolled_patient(h: &Harness) -> Patient {
    h.stores
        .patients
        .insert(Patient::new("MRN-1001", "Grace", "Hopper", Utc::now()))
        .await
}

async fn processing_order(h: &Harness, quantity: u32) -> Order {
    let patient = enrolled_patient(h).await;
    h.orders
        .create_order(
            patient.id,
            vec![LineItem {
                device_type: DeviceType::BloodPressure,
                quantity,
            }],
            None,
            String::new(),
            Utc::now(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn create_order_stamps_vendor_id_and_advances_to_processing() {
    let h = harness();
    let order = processing_order(&h, 1).await;

    assert_eq!(order.status, OrderStatus::Processing);
    let vendor_id = order.vendor_order_id.expect("vendor id stamped");
    assert!(vendor_id.starts_with("TNV-"));
    // Created + submitted.
    assert_eq!(order.status_history.len(), 2);
}

#[tokio::test]
async fn fulfillment_shipped_then_delivered_fans_out_devices() {
    let h = harness();
    let order = processing_order(&h, 2).await;
    let vendor_id = order.vendor_order_id.clone().unwrap();

    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::Fulfillment,
            json!({"order_id": vendor_id, "status": "shipped", "tracking_number": "1Z123"}),
            Utc::now(),
        )
        .await;
    assert_eq!(outcome, Outcome::Processed);

    let shipped = h.stores.orders.get(order.id).await.unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert!(shipped.shipped_at.is_some());
    assert_eq!(shipped.tracking_number.as_deref(), Some("1Z123"));

    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::Fulfillment,
            json!({"order_id": vendor_id, "status": "delivered"}),
            Utc::now(),
        )
        .await;
    assert_eq!(outcome, Outcome::Processed);

    let devices = h.stores.devices.list().await;
    assert_eq!(devices.len(), 2);
    for d in &devices {
        assert_eq!(d.status, DeviceStatus::Assigned);
        assert_eq!(d.patient_id, Some(order.patient_id));
        assert!(d.serial_number.starts_with(&format!("SIM-{}-BP-", order.order_number)));
    }
    let patient = h.stores.patients.get(order.patient_id).await.unwrap();
    assert_eq!(patient.devices.len(), 2);
}

#[tokio::test]
async fn redelivered_delivered_webhook_creates_no_duplicate_devices() {
    let h = harness();
    let order = processing_order(&h, 2).await;
    let vendor_id = order.vendor_order_id.clone().unwrap();

    for status in ["shipped", "delivered", "delivered", "delivered"] {
        h.pipeline
            .ingest(
                WebhookEventType::Fulfillment,
                json!({"order_id": vendor_id, "status": status}),
                Utc::now(),
            )
            .await;
    }
    assert_eq!(h.stores.devices.list().await.len(), 2);
    assert_eq!(
        h.stores.patients.get(order.patient_id).await.unwrap().devices.len(),
        2
    );
}

#[tokio::test]
async fn out_of_order_status_is_absorbed_as_warning_by_default() {
    let h = harness();
    let order = processing_order(&h, 1).await;
    let vendor_id = order.vendor_order_id.clone().unwrap();

    for status in ["shipped", "delivered"] {
        h.pipeline
            .ingest(
                WebhookEventType::Fulfillment,
                json!({"order_id": vendor_id, "status": status}),
                Utc::now(),
            )
            .await;
    }

    // A late "processing" replay can no longer apply.
    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::Fulfillment,
            json!({"order_id": vendor_id, "status": "processing"}),
            Utc::now(),
        )
        .await;
    assert!(matches!(outcome, Outcome::Warning(_)));
    let after = h.stores.orders.get(order.id).await.unwrap();
    assert_eq!(after.status, OrderStatus::Delivered, "no mutation on warning");
}

#[tokio::test]
async fn strict_policy_turns_retreat_into_error() {
    let h = harness_with_policy(IngestPolicy {
        status_retreat: StatusRetreat::Error,
        ..IngestPolicy::default()
    });
    let order = processing_order(&h, 1).await;
    let vendor_id = order.vendor_order_id.clone().unwrap();

    for status in ["shipped", "delivered"] {
        h.pipeline
            .ingest(
                WebhookEventType::Fulfillment,
                json!({"order_id": vendor_id, "status": status}),
                Utc::now(),
            )
            .await;
    }
    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::Fulfillment,
            json!({"order_id": vendor_id, "status": "processing"}),
            Utc::now(),
        )
        .await;
    assert!(matches!(outcome, Outcome::Error(_)));
}

#[tokio::test]
async fn unknown_vendor_status_and_unknown_order_are_errors() {
    let h = harness();
    let order = processing_order(&h, 1).await;
    let vendor_id = order.vendor_order_id.clone().unwrap();

    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::Fulfillment,
            json!({"order_id": vendor_id, "status": "in_transit"}),
            Utc::now(),
        )
        .await;
    assert!(matches!(outcome, Outcome::Error(_)));

    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::Fulfillment,
            json!({"order_id": "TNV-NOSUCH", "status": "shipped"}),
            Utc::now(),
        )
        .await;
    assert!(matches!(outcome, Outcome::Error(_)));

    // Both failures completed their event-log rows as errors.
    let counts = h.stores.events.counts().await;
    assert_eq!(counts.get("error"), Some(&2));
    assert_eq!(counts.get("received"), None, "nothing left in received");
}

#[tokio::test]
async fn measurement_for_unknown_device_stores_unlinked_vital() {
    let h = harness();
    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::Measurement,
            json!({
                "device_id": "HWI-UNKNOWN",
                "device_type": "blood_pressure",
                "readings": {"systolic": 128, "diastolic": 82}
            }),
            Utc::now(),
        )
        .await;
    assert_eq!(outcome, Outcome::Processed);
    assert_eq!(h.stores.vitals.count().await, 1);
}

#[tokio::test]
async fn registration_then_out_of_order_measurements() {
    let h = harness();

    // Unknown serial: webhook-first creation, directly active.
    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::DeviceRegistration,
            json!({
                "device_id": "HWI-AAA111BBB222",
                "serial_number": "BP-7001",
                "device_type": "blood_pressure"
            }),
            Utc::now(),
        )
        .await;
    assert_eq!(outcome, Outcome::Processed);
    let device = h.stores.devices.find_by_serial("BP-7001").await.unwrap();
    assert_eq!(device.status, DeviceStatus::Active);

    // Known serial: mutation, no second row.
    h.pipeline
        .ingest(
            WebhookEventType::DeviceRegistration,
            json!({
                "device_id": "HWI-AAA111BBB222",
                "serial_number": "BP-7001"
            }),
            Utc::now(),
        )
        .await;
    assert_eq!(h.stores.devices.list().await.len(), 1);

    // T2 then T1: freshness must hold at T2.
    let t2 = "2026-02-02T08:00:00Z";
    let t1 = "2026-02-01T08:00:00Z";
    for ts in [t2, t1] {
        let outcome = h
            .pipeline
            .ingest(
                WebhookEventType::Measurement,
                json!({
                    "device_id": "HWI-AAA111BBB222",
                    "device_type": "blood_pressure",
                    "timestamp": ts,
                    "readings": {"systolic": 120, "diastolic": 80, "pulse": 70}
                }),
                Utc::now(),
            )
            .await;
        assert_eq!(outcome, Outcome::Processed);
    }
    let device = h.stores.devices.find_by_serial("BP-7001").await.unwrap();
    assert_eq!(device.last_reading_at, Some(t2.parse().unwrap()));
    assert_eq!(h.stores.vitals.count().await, 2);
}

#[tokio::test]
async fn mixed_case_vendor_status_is_applied() {
    let h = harness();
    let order = processing_order(&h, 1).await;
    let vendor_id = order.vendor_order_id.clone().unwrap();

    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::Fulfillment,
            json!({"order_id": vendor_id, "status": "Shipped", "tracking_number": "1Z999"}),
            Utc::now(),
        )
        .await;
    assert_eq!(outcome, Outcome::Processed);
    let after = h.stores.orders.get(order.id).await.unwrap();
    assert_eq!(after.status, OrderStatus::Shipped);
}

#[tokio::test]
async fn registration_patient_claim_links_device_to_patient() {
    let h = harness();
    let patient = enrolled_patient(&h).await;

    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::DeviceRegistration,
            json!({
                "device_id": "HWI-CCC333DDD444",
                "serial_number": "TH-8001",
                "device_type": "thermometer",
                "patient_id": patient.id
            }),
            Utc::now(),
        )
        .await;
    assert_eq!(outcome, Outcome::Processed);

    let device = h.stores.devices.find_by_serial("TH-8001").await.unwrap();
    assert_eq!(device.status, DeviceStatus::Active);
    assert_eq!(device.patient_id, Some(patient.id));
    assert!(h
        .stores
        .patients
        .get(patient.id)
        .await
        .unwrap()
        .devices
        .contains(&device.id));

    // An unknown patient claim degrades to an unlinked device, not an error.
    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::DeviceRegistration,
            json!({
                "device_id": "HWI-EEE555FFF666",
                "serial_number": "TH-8002",
                "device_type": "thermometer",
                "patient_id": uuid::Uuid::new_v4()
            }),
            Utc::now(),
        )
        .await;
    assert_eq!(outcome, Outcome::Processed);
    let device = h.stores.devices.find_by_serial("TH-8002").await.unwrap();
    assert_eq!(device.patient_id, None);
}

#[tokio::test]
async fn measurement_patient_claim_is_fallback_for_unlinked_device() {
    let h = harness();
    let patient = enrolled_patient(&h).await;

    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::Measurement,
            json!({
                "device_id": "HWI-UNKNOWN",
                "patient_id": patient.id,
                "device_type": "pulse_oximeter",
                "readings": {"spo2": 96}
            }),
            Utc::now(),
        )
        .await;
    assert_eq!(outcome, Outcome::Processed);

    let vitals = h.stores.vitals.list_for_patient(patient.id).await;
    assert_eq!(vitals.len(), 1);
    assert!(vitals[0].device_id.is_none());
}

#[tokio::test]
async fn flag_policy_absorbs_duplicate_measurement_without_storing() {
    let h = harness_with_policy(IngestPolicy {
        duplicate_measurements: DuplicateMeasurements::Flag,
        ..IngestPolicy::default()
    });
    h.pipeline
        .ingest(
            WebhookEventType::DeviceRegistration,
            json!({
                "device_id": "HWI-X",
                "serial_number": "GL-1",
                "device_type": "blood_glucose"
            }),
            Utc::now(),
        )
        .await;

    let body = json!({
        "device_id": "HWI-X",
        "device_type": "blood_glucose",
        "timestamp": "2026-03-01T09:00:00Z",
        "readings": {"glucose_mg_dl": 110}
    });
    let first = h
        .pipeline
        .ingest(WebhookEventType::Measurement, body.clone(), Utc::now())
        .await;
    assert_eq!(first, Outcome::Processed);

    let second = h
        .pipeline
        .ingest(WebhookEventType::Measurement, body, Utc::now())
        .await;
    assert!(matches!(second, Outcome::Warning(_)));
    assert_eq!(h.stores.vitals.count().await, 1);
}

#[tokio::test]
async fn cancel_is_refused_once_shipped() {
    let h = harness();
    let order = processing_order(&h, 1).await;
    let vendor_id = order.vendor_order_id.clone().unwrap();

    h.pipeline
        .ingest(
            WebhookEventType::Fulfillment,
            json!({"order_id": vendor_id, "status": "shipped"}),
            Utc::now(),
        )
        .await;

    let err = h.orders.cancel_order(order.id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, OrderServiceError::Transition(_)));
    let after = h.stores.orders.get(order.id).await.unwrap();
    assert_eq!(after.status, OrderStatus::Shipped);
}

#[tokio::test]
async fn cancel_from_processing_succeeds() {
    let h = harness();
    let order = processing_order(&h, 1).await;
    let cancelled = h.orders.cancel_order(order.id, Utc::now()).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn malformed_payload_is_an_error_with_completed_log_row() {
    let h = harness();
    let outcome = h
        .pipeline
        .ingest(
            WebhookEventType::Measurement,
            json!({"device_type": "blood_pressure", "readings": "not-an-object"}),
            Utc::now(),
        )
        .await;
    assert!(matches!(outcome, Outcome::Error(_)));

    let recent = h.stores.events.recent(10).await;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].status, WebhookStatus::Error);
    assert!(recent[0].error.is_some());
}
