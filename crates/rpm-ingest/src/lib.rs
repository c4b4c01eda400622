//! Webhook ingestion and engine operations.
//!
//! The flow: transport verifies the signature ([`auth`]) on the raw body,
//! then hands the parsed JSON to the [`pipeline`], which logs, dispatches to
//! the per-type mapping function, and completes the event-log row with a
//! structured [`Outcome`]. Operator-initiated workflows (order creation and
//! cancellation, device provisioning and assignment) live in [`orders`] and
//! [`devices`] and call the vendor synchronously.

pub mod auth;
pub mod devices;
pub mod orders;
pub mod pipeline;
pub mod policy;

pub use auth::{AuthError, WebhookAuthenticator};
pub use devices::{DeviceService, DeviceServiceError};
pub use orders::{OrderService, OrderServiceError};
pub use pipeline::{fanout_serial, IngestPipeline, Outcome};
pub use policy::{DuplicateMeasurements, IngestPolicy, StatusRetreat};
