//! Axum router and all HTTP handlers for rpm-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rpm_ingest::{DeviceServiceError, OrderServiceError, Outcome};
use rpm_types::{Patient, WebhookEventType};
use serde_json::Value;
use uuid::Uuid;

use crate::api_types::{
    AssignDeviceRequest, CloseOutDeviceRequest, CreateOrderRequest, CreatePatientRequest,
    ErrorResponse, HealthResponse, ProvisionDeviceRequest, StatsResponse, WebhookAck,
    WebhookEventsResponse,
};
use crate::state::AppState;

/// Header carrying the vendor's HMAC-SHA256 hex digest of the raw body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// How many rows the webhook audit view returns.
const RECENT_EVENTS_LIMIT: usize = 50;

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/webhooks/measurement", post(measurement_webhook))
        .route("/v1/webhooks/fulfillment", post(fulfillment_webhook))
        .route(
            "/v1/webhooks/device-registration",
            post(registration_webhook),
        )
        .route("/v1/webhooks/events", get(webhook_events))
        .route("/v1/patients", post(create_patient).get(list_patients))
        .route("/v1/orders", post(create_order).get(list_orders))
        .route("/v1/orders/:id/cancel", post(cancel_order))
        .route("/v1/orders/:id/vendor-status", get(order_vendor_status))
        .route("/v1/devices", post(provision_device).get(list_devices))
        .route("/v1/devices/catalog", get(device_catalog))
        .route("/v1/devices/offline", get(offline_devices))
        .route("/v1/devices/:id/assign", post(assign_device))
        .route("/v1/devices/:id/return", post(return_device))
        .route("/v1/devices/:id/lost", post(lose_device))
        .route("/v1/stats", get(stats))
        .with_state(state)
}

fn error_json(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            sandbox_vendor: st.sandbox,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/webhooks/* — signature check, parse, pipeline dispatch
// ---------------------------------------------------------------------------

pub(crate) async fn measurement_webhook(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_webhook(st, WebhookEventType::Measurement, headers, body).await
}

pub(crate) async fn fulfillment_webhook(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_webhook(st, WebhookEventType::Fulfillment, headers, body).await
}

pub(crate) async fn registration_webhook(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_webhook(st, WebhookEventType::DeviceRegistration, headers, body).await
}

/// Shared webhook flow. The signature is checked on the exact raw bytes
/// before any parsing; malformed JSON is rejected before the pipeline and is
/// the only webhook failure that skips the event log.
async fn handle_webhook(
    st: Arc<AppState>,
    event_type: WebhookEventType,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = st.auth.verify(&body, signature) {
        return error_json(StatusCode::UNAUTHORIZED, e.to_string());
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => return error_json(StatusCode::BAD_REQUEST, format!("malformed JSON: {e}")),
    };

    match st.pipeline.ingest(event_type, payload, Utc::now()).await {
        Outcome::Processed => (
            StatusCode::OK,
            Json(WebhookAck {
                status: "ok",
                warning: None,
            }),
        )
            .into_response(),
        // Success to the vendor so its retry schedule stops.
        Outcome::Warning(warning) => (
            StatusCode::OK,
            Json(WebhookAck {
                status: "ok",
                warning: Some(warning),
            }),
        )
            .into_response(),
        // Failure: the vendor is allowed to retry.
        Outcome::Error(e) => error_json(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/webhooks/events — audit view
// ---------------------------------------------------------------------------

pub(crate) async fn webhook_events(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let events = st.stores.events.recent(RECENT_EVENTS_LIMIT).await;
    let counts = st.stores.events.counts().await;
    (StatusCode::OK, Json(WebhookEventsResponse { events, counts }))
}

// ---------------------------------------------------------------------------
// Patients
// ---------------------------------------------------------------------------

pub(crate) async fn create_patient(
    State(st): State<Arc<AppState>>,
    Json(req): Json<CreatePatientRequest>,
) -> Response {
    if st.stores.patients.find_by_mrn(&req.mrn).await.is_some() {
        return error_json(
            StatusCode::CONFLICT,
            format!("patient with mrn {} already exists", req.mrn),
        );
    }
    let mut patient = Patient::new(req.mrn, req.first_name, req.last_name, Utc::now());
    patient.email = req.email;
    patient.phone = req.phone;
    patient.conditions = req.conditions;
    if let Some(address) = req.address {
        patient.address = address;
    }
    let patient = st.stores.patients.insert(patient).await;
    (StatusCode::CREATED, Json(patient)).into_response()
}

pub(crate) async fn list_patients(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.stores.patients.list().await))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

fn order_error(e: OrderServiceError) -> Response {
    let status = match &e {
        OrderServiceError::PatientNotFound(_) | OrderServiceError::OrderNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        OrderServiceError::EmptyOrder => StatusCode::BAD_REQUEST,
        OrderServiceError::NotSubmitted(_) | OrderServiceError::Transition(_) => {
            StatusCode::CONFLICT
        }
        // Covers VendorUnavailable (timeout) and vendor API rejections alike.
        OrderServiceError::Vendor(_) => StatusCode::BAD_GATEWAY,
    };
    error_json(status, e.to_string())
}

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Response {
    match st
        .orders
        .create_order(
            req.patient_id,
            req.items,
            req.shipping_address,
            req.notes.unwrap_or_default(),
            Utc::now(),
        )
        .await
    {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => order_error(e),
    }
}

pub(crate) async fn cancel_order(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match st.orders.cancel_order(id, Utc::now()).await {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => order_error(e),
    }
}

pub(crate) async fn order_vendor_status(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match st.orders.vendor_status(id).await {
        Ok(info) => (StatusCode::OK, Json(info)).into_response(),
        Err(e) => order_error(e),
    }
}

pub(crate) async fn list_orders(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.stores.orders.list().await))
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

fn device_error(e: DeviceServiceError) -> Response {
    let status = match &e {
        DeviceServiceError::PatientNotFound(_) | DeviceServiceError::DeviceNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        DeviceServiceError::DuplicateSerial(_) | DeviceServiceError::Lifecycle(_) => {
            StatusCode::CONFLICT
        }
        DeviceServiceError::Vendor(_) => StatusCode::BAD_GATEWAY,
    };
    error_json(status, e.to_string())
}

pub(crate) async fn provision_device(
    State(st): State<Arc<AppState>>,
    Json(req): Json<ProvisionDeviceRequest>,
) -> Response {
    match st
        .devices
        .provision(req.serial_number, req.device_type, Utc::now())
        .await
    {
        Ok(device) => (StatusCode::CREATED, Json(device)).into_response(),
        Err(e) => device_error(e),
    }
}

pub(crate) async fn assign_device(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignDeviceRequest>,
) -> Response {
    match st.devices.assign(id, req.patient_id, Utc::now()).await {
        Ok(device) => (StatusCode::OK, Json(device)).into_response(),
        Err(e) => device_error(e),
    }
}

pub(crate) async fn return_device(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Option<Json<CloseOutDeviceRequest>>,
) -> Response {
    let note = body.and_then(|Json(b)| b.note);
    match st.devices.mark_returned(id, note, Utc::now()).await {
        Ok(device) => (StatusCode::OK, Json(device)).into_response(),
        Err(e) => device_error(e),
    }
}

pub(crate) async fn lose_device(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Option<Json<CloseOutDeviceRequest>>,
) -> Response {
    let note = body.and_then(|Json(b)| b.note);
    match st.devices.mark_lost(id, note, Utc::now()).await {
        Ok(device) => (StatusCode::OK, Json(device)).into_response(),
        Err(e) => device_error(e),
    }
}

pub(crate) async fn device_catalog() -> impl IntoResponse {
    (StatusCode::OK, Json(rpm_types::DEVICE_CATALOG))
}

pub(crate) async fn list_devices(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.stores.devices.list().await))
}

pub(crate) async fn offline_devices(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(st.devices.offline_report(Utc::now()).await))
}

// ---------------------------------------------------------------------------
// GET /v1/stats
// ---------------------------------------------------------------------------

pub(crate) async fn stats(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(StatsResponse {
            patients: st.stores.patients.count().await,
            vitals: st.stores.vitals.count().await,
            devices_by_status: st.stores.devices.count_by_status().await,
            orders_by_status: st.stores.orders.count_by_status().await,
            webhooks_by_status: st.stores.events.counts().await,
        }),
    )
}
