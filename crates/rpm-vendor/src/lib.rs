//! Outbound vendor fulfillment API.
//!
//! This crate owns the vendor abstraction and its two implementations: the
//! live HTTP adapter and a deterministic sandbox used in development and
//! tests. Callers depend on [`VendorApi`] only; which one is wired in is a
//! deployment decision.

pub mod sandbox;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;

pub use sandbox::SandboxVendor;
pub use types::{
    CreateOrderRequest, OrderItem, OrderStatusInfo, Recipient, RegisterDeviceRequest,
    VendorDeviceAck, VendorOrderAck,
};

/// Failure of an outbound vendor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorError {
    /// The vendor did not answer (connect failure or timeout). Callers keep
    /// local state unchanged and surface a retryable error.
    Unavailable(String),
    /// The vendor answered with a non-success status.
    Api { status: u16, detail: String },
    /// The vendor answered 2xx but the body did not match the contract.
    InvalidResponse(String),
}

impl std::fmt::Display for VendorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(detail) => write!(f, "vendor unavailable: {detail}"),
            Self::Api { status, detail } => {
                write!(f, "vendor rejected the request ({status}): {detail}")
            }
            Self::InvalidResponse(detail) => write!(f, "unexpected vendor response: {detail}"),
        }
    }
}

impl std::error::Error for VendorError {}

/// Vendor fulfillment operations the engine needs.
#[async_trait]
pub trait VendorApi: Send + Sync {
    fn name(&self) -> &'static str;

    /// Submit an order for fulfillment. Returns the vendor's order
    /// identifier, which becomes the join key for fulfillment webhooks.
    async fn create_order(&self, req: &CreateOrderRequest) -> Result<VendorOrderAck, VendorError>;

    /// Poll the vendor's view of an order.
    async fn get_order_status(&self, vendor_order_id: &str)
        -> Result<OrderStatusInfo, VendorError>;

    /// Request cancellation of a previously submitted order.
    async fn cancel_order(&self, vendor_order_id: &str) -> Result<(), VendorError>;

    /// Register a device gateway with the vendor. Returns the vendor's
    /// hardware identifier.
    async fn register_device(
        &self,
        req: &RegisterDeviceRequest,
    ) -> Result<VendorDeviceAck, VendorError>;

    /// Unregister a device gateway (on return or loss).
    async fn unregister_device(&self, vendor_device_id: &str) -> Result<(), VendorError>;
}

/// Connection settings for the live adapter.
///
/// API key is read from the environment by the caller and passed in; do not
/// log it.
#[derive(Debug, Clone)]
pub struct VendorConfig {
    pub base_url: String,
    pub api_key: String,
    /// Tenant identifier the vendor scopes orders under.
    pub client_domain: String,
    pub timeout: Duration,
}

impl VendorConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Every setting has a workable default, so env loading cannot fail.
    pub fn from_env() -> Self {
        let base_url = std::env::var("RPM_VENDOR_BASE_URL")
            .unwrap_or_else(|_| "https://api.tenovi.com".to_string());
        let api_key = std::env::var("RPM_VENDOR_API_KEY").unwrap_or_default();
        let client_domain = std::env::var("RPM_VENDOR_CLIENT_DOMAIN").unwrap_or_default();
        let timeout_secs = std::env::var("RPM_VENDOR_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Self::DEFAULT_TIMEOUT_SECS);
        Self {
            base_url,
            api_key,
            client_domain,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Live HTTP adapter.
pub struct HttpVendorClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    client_domain: String,
}

impl HttpVendorClient {
    pub fn new(config: VendorConfig) -> Result<Self, VendorError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VendorError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            client_domain: config.client_domain,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header("X-Client-Domain", &self.client_domain)
    }

    fn map_transport(e: reqwest::Error) -> VendorError {
        if e.is_timeout() || e.is_connect() {
            VendorError::Unavailable(e.to_string())
        } else {
            VendorError::InvalidResponse(e.to_string())
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, VendorError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = resp.text().await.unwrap_or_default();
        Err(VendorError::Api {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl VendorApi for HttpVendorClient {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn create_order(&self, req: &CreateOrderRequest) -> Result<VendorOrderAck, VendorError> {
        let resp = self
            .request(reqwest::Method::POST, "/clients/fulfillment-requests/")
            .json(&req.to_wire())
            .send()
            .await
            .map_err(Self::map_transport)?;
        let ack: types::WireOrderAck = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| VendorError::InvalidResponse(e.to_string()))?;
        tracing::info!(vendor_order_id = %ack.fulfillment_request_id, "vendor acknowledged order");
        Ok(VendorOrderAck {
            vendor_order_id: ack.fulfillment_request_id,
        })
    }

    async fn get_order_status(
        &self,
        vendor_order_id: &str,
    ) -> Result<OrderStatusInfo, VendorError> {
        let resp = self
            .request(
                reqwest::Method::GET,
                &format!("/clients/fulfillment-requests/{vendor_order_id}/"),
            )
            .send()
            .await
            .map_err(Self::map_transport)?;
        Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| VendorError::InvalidResponse(e.to_string()))
    }

    async fn cancel_order(&self, vendor_order_id: &str) -> Result<(), VendorError> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/clients/fulfillment-requests/{vendor_order_id}/cancel/"),
            )
            .send()
            .await
            .map_err(Self::map_transport)?;
        Self::check(resp).await?;
        Ok(())
    }

    async fn register_device(
        &self,
        req: &RegisterDeviceRequest,
    ) -> Result<VendorDeviceAck, VendorError> {
        let resp = self
            .request(reqwest::Method::POST, "/clients/hwi/register-gateway/")
            .json(req)
            .send()
            .await
            .map_err(Self::map_transport)?;
        let ack: types::WireDeviceAck = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| VendorError::InvalidResponse(e.to_string()))?;
        Ok(VendorDeviceAck {
            vendor_device_id: ack.hardware_uuid,
        })
    }

    async fn unregister_device(&self, vendor_device_id: &str) -> Result<(), VendorError> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/clients/hwi/{vendor_device_id}/unregister-gateway/"),
            )
            .send()
            .await
            .map_err(Self::map_transport)?;
        Self::check(resp).await?;
        Ok(())
    }
}
