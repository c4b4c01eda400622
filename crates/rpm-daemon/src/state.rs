//! Shared runtime state for rpm-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The stores, pipeline
//! and services are all cheap clone handles over the same documents; the
//! process entry point owns their lifecycle and nothing is lazily
//! initialized.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rpm_ingest::{DeviceService, IngestPipeline, IngestPolicy, OrderService, WebhookAuthenticator};
use rpm_store::vitals::DEFAULT_RETENTION_DAYS;
use rpm_store::Stores;
use rpm_vendor::{HttpVendorClient, SandboxVendor, VendorApi, VendorConfig, VendorError};
use serde::Serialize;

/// Static build metadata included in the health response.
#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Process configuration assembled from environment variables.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Sandbox mode: synthetic vendor responses and no webhook signature
    /// enforcement.
    pub sandbox: bool,
    pub webhook_secret: Option<String>,
    pub policy: IngestPolicy,
    pub vendor: VendorConfig,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let sandbox = std::env::var("RPM_SANDBOX_MODE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self {
            sandbox,
            webhook_secret: std::env::var("RPM_WEBHOOK_SECRET").ok(),
            policy: IngestPolicy::from_env(),
            vendor: VendorConfig::from_env(),
        }
    }
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub sandbox: bool,
    pub stores: Stores,
    pub auth: WebhookAuthenticator,
    pub pipeline: IngestPipeline,
    pub orders: OrderService,
    pub devices: DeviceService,
}

impl AppState {
    pub fn new(config: EngineConfig) -> Result<Self, VendorError> {
        let vendor: Arc<dyn VendorApi> = if config.sandbox {
            Arc::new(SandboxVendor::new())
        } else {
            Arc::new(HttpVendorClient::new(config.vendor)?)
        };
        let stores = Stores::new();
        Ok(Self {
            build: BuildInfo {
                service: "rpm-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            sandbox: config.sandbox,
            auth: WebhookAuthenticator::new(config.webhook_secret, config.sandbox),
            pipeline: IngestPipeline::new(stores.clone(), config.policy),
            orders: OrderService::new(stores.clone(), Arc::clone(&vendor)),
            devices: DeviceService::new(stores.clone(), vendor),
            stores,
        })
    }

    /// Sandbox state: synthetic vendor, no signature enforcement. Used by
    /// the scenario tests.
    pub fn sandbox() -> Self {
        let config = EngineConfig {
            sandbox: true,
            webhook_secret: None,
            policy: IngestPolicy::default(),
            vendor: VendorConfig::from_env(),
        };
        match Self::new(config) {
            Ok(state) => state,
            // Sandbox construction performs no I/O.
            Err(_) => unreachable!("sandbox state cannot fail to construct"),
        }
    }
}

/// Periodically expire vitals past the retention window.
pub fn spawn_retention_sweep(stores: Stores, every: Duration) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        loop {
            tick.tick().await;
            let removed = stores
                .vitals
                .sweep_expired(Utc::now(), chrono::Duration::days(DEFAULT_RETENTION_DAYS))
                .await;
            if removed > 0 {
                tracing::info!(removed, "retention sweep expired vitals");
            }
        }
    });
}
