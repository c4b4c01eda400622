//! Webhook simulator CLI.
//!
//! Sends synthetic vendor webhooks at a running rpm-daemon, for disconnected
//! development and manual testing. Payloads mirror the vendor's shapes; when
//! a secret is given the body is signed exactly as the vendor would sign it.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rpm_ingest::WebhookAuthenticator;
use rpm_types::DeviceType;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "rpm")]
#[command(about = "RPM engine webhook simulator", long_about = None)]
struct Cli {
    /// Daemon base URL.
    #[arg(long, default_value = "http://127.0.0.1:8088")]
    daemon: String,

    /// Webhook secret; when set, the body is HMAC-signed. Omit against a
    /// sandbox-mode daemon.
    #[arg(long, env = "RPM_WEBHOOK_SECRET")]
    secret: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a measurement webhook with a plausible reading for the type.
    Measurement {
        /// Vendor hardware id (HWI-...) of the reporting device.
        #[arg(long)]
        device_id: String,

        /// blood_pressure | weight_scale | blood_glucose | pulse_oximeter |
        /// thermometer | peak_flow
        #[arg(long)]
        device_type: String,

        /// Measurement time, RFC 3339. Defaults to now.
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Send a fulfillment status webhook.
    Fulfillment {
        /// Vendor order id (TNV-...).
        #[arg(long)]
        order_id: String,

        /// processing | shipped | delivered | cancelled
        #[arg(long)]
        status: String,

        #[arg(long)]
        tracking_number: Option<String>,
    },

    /// Send a device-registration webhook.
    Registration {
        /// Vendor hardware id to attach.
        #[arg(long)]
        device_id: String,

        #[arg(long)]
        serial_number: String,

        /// Required when the serial is not yet known to the engine.
        #[arg(long)]
        device_type: Option<String>,
    },

    /// Print the deterministic sandbox ids for an order number or serial.
    SandboxIds {
        /// Order number (ORD-...) and/or device serial to derive ids for.
        #[arg(long)]
        order_number: Option<String>,

        #[arg(long)]
        serial_number: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    match &cli.cmd {
        Commands::Measurement {
            device_id,
            device_type,
            timestamp,
        } => {
            let device_type = parse_device_type(device_type)?;
            let entry = rpm_types::catalog_entry(device_type);
            println!("simulating {} ({})", entry.name, entry.model);
            let timestamp = match timestamp {
                Some(ts) => ts.clone(),
                None => Utc::now().to_rfc3339(),
            };
            let payload = json!({
                "device_id": device_id,
                "device_type": device_type,
                "timestamp": timestamp,
                "readings": sample_readings(device_type),
                "metadata": {"battery_level": 87, "signal_strength": -61}
            });
            post(&cli, "/v1/webhooks/measurement", payload).await
        }
        Commands::Fulfillment {
            order_id,
            status,
            tracking_number,
        } => {
            let mut payload = json!({"order_id": order_id, "status": status});
            if let Some(tn) = tracking_number {
                payload["tracking_number"] = json!(tn);
            }
            post(&cli, "/v1/webhooks/fulfillment", payload).await
        }
        Commands::Registration {
            device_id,
            serial_number,
            device_type,
        } => {
            let mut payload = json!({
                "device_id": device_id,
                "serial_number": serial_number,
                "registered_at": Utc::now().to_rfc3339(),
            });
            if let Some(dt) = device_type {
                payload["device_type"] = json!(parse_device_type(dt)?);
            }
            post(&cli, "/v1/webhooks/device-registration", payload).await
        }
        Commands::SandboxIds {
            order_number,
            serial_number,
        } => {
            if let Some(n) = order_number {
                println!("vendor_order_id: {}", rpm_vendor::sandbox::sandbox_order_id(n));
                println!(
                    "tracking_number: {}",
                    rpm_vendor::sandbox::sandbox_tracking_number(n)
                );
            }
            if let Some(s) = serial_number {
                println!(
                    "vendor_device_id: {}",
                    rpm_vendor::sandbox::sandbox_hardware_id(s)
                );
            }
            Ok(())
        }
    }
}

async fn post(cli: &Cli, path: &str, payload: Value) -> Result<()> {
    let body = serde_json::to_vec(&payload)?;
    let url = format!("{}{}", cli.daemon.trim_end_matches('/'), path);

    let mut req = reqwest::Client::new()
        .post(&url)
        .header("content-type", "application/json");
    if let Some(secret) = &cli.secret {
        req = req.header(
            "x-webhook-signature",
            WebhookAuthenticator::sign(secret, &body),
        );
    }

    let resp = req
        .body(body)
        .send()
        .await
        .with_context(|| format!("POST {url}"))?;
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    println!("{status} {text}");
    if !status.is_success() {
        anyhow::bail!("daemon rejected the webhook");
    }
    Ok(())
}

fn parse_device_type(s: &str) -> Result<DeviceType> {
    serde_json::from_value(Value::String(s.to_string()))
        .with_context(|| format!("unknown device type '{s}'"))
}

/// A plausible fixed reading per device class.
fn sample_readings(device_type: DeviceType) -> Value {
    match device_type {
        DeviceType::BloodPressure => json!({"systolic": 124, "diastolic": 79, "pulse": 71}),
        DeviceType::WeightScale => json!({"weight_lbs": 176.2}),
        DeviceType::BloodGlucose => json!({"glucose_mg_dl": 104, "meal_context": "fasting"}),
        DeviceType::PulseOximeter => json!({"spo2": 97, "pulse": 68}),
        DeviceType::Thermometer => json!({"temperature_f": 98.2}),
        DeviceType::PeakFlow => json!({"pef": 460, "fev1": 3.1}),
    }
}
