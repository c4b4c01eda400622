use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rpm_types::Vital;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Vitals older than this are removed by the retention sweep.
pub const DEFAULT_RETENTION_DAYS: i64 = 365;

#[derive(Clone, Default)]
pub struct VitalStore {
    inner: Arc<RwLock<BTreeMap<Uuid, Vital>>>,
}

impl VitalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vital. Within one device a measurement timestamp must stay
    /// unique, so a colliding insert is nudged forward by 1ms per collision
    /// rather than overwriting the earlier reading.
    pub async fn insert(&self, mut vital: Vital) -> Vital {
        let mut g = self.inner.write().await;
        if vital.device_id.is_some() {
            while g
                .values()
                .any(|v| v.device_id == vital.device_id && v.timestamp == vital.timestamp)
            {
                vital.timestamp += Duration::milliseconds(1);
            }
        }
        g.insert(vital.id, vital.clone());
        vital
    }

    /// Whether a reading for this device at this exact timestamp has already
    /// been stored. This is the duplicate-delivery signal for the pipeline.
    pub async fn exists_for(&self, device_id: Uuid, timestamp: DateTime<Utc>) -> bool {
        self.inner
            .read()
            .await
            .values()
            .any(|v| v.device_id == Some(device_id) && v.timestamp == timestamp)
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> Vec<Vital> {
        let mut vitals: Vec<Vital> = self
            .inner
            .read()
            .await
            .values()
            .filter(|v| v.patient_id == Some(patient_id))
            .cloned()
            .collect();
        vitals.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        vitals
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Remove vitals whose measurement time fell out of the retention window.
    /// Returns how many were removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let cutoff = now - retention;
        let mut g = self.inner.write().await;
        let before = g.len();
        g.retain(|_, v| v.timestamp >= cutoff);
        before - g.len()
    }
}
