//! Device store: keyed by id, unique on serial number.

use std::collections::BTreeMap;
use std::sync::Arc;

use rpm_types::Device;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::UpdateError;

/// Returned when inserting a device whose serial number already exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSerial(pub String);

impl std::fmt::Display for DuplicateSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "device with serial {} already exists", self.0)
    }
}

impl std::error::Error for DuplicateSerial {}

#[derive(Clone, Default)]
pub struct DeviceStore {
    inner: Arc<RwLock<BTreeMap<Uuid, Device>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device, enforcing serial uniqueness. The existence check and
    /// the insert happen under one write lock, so concurrent idempotent
    /// provisioning (deterministic serials) cannot race into duplicates.
    pub async fn insert(&self, device: Device) -> Result<Device, DuplicateSerial> {
        let mut g = self.inner.write().await;
        if g.values().any(|d| d.serial_number == device.serial_number) {
            return Err(DuplicateSerial(device.serial_number));
        }
        g.insert(device.id, device.clone());
        Ok(device)
    }

    pub async fn get(&self, id: Uuid) -> Option<Device> {
        self.inner.read().await.get(&id).cloned()
    }

    pub async fn find_by_serial(&self, serial: &str) -> Option<Device> {
        self.inner
            .read()
            .await
            .values()
            .find(|d| d.serial_number == serial)
            .cloned()
    }

    pub async fn find_by_vendor_id(&self, vendor_device_id: &str) -> Option<Device> {
        self.inner
            .read()
            .await
            .values()
            .find(|d| d.vendor_device_id.as_deref() == Some(vendor_device_id))
            .cloned()
    }

    /// Atomic read-modify-write; committed only if the closure returns `Ok`.
    pub async fn update<E, F>(&self, id: Uuid, f: F) -> Result<Device, UpdateError<E>>
    where
        F: FnOnce(&mut Device) -> Result<(), E>,
    {
        let mut g = self.inner.write().await;
        let Some(doc) = g.get_mut(&id) else {
            return Err(UpdateError::NotFound);
        };
        let mut draft = doc.clone();
        f(&mut draft).map_err(UpdateError::Domain)?;
        *doc = draft.clone();
        Ok(draft)
    }

    pub async fn list(&self) -> Vec<Device> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn count_by_status(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for d in self.inner.read().await.values() {
            *counts.entry(d.status.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rpm_types::DeviceType;

    #[tokio::test]
    async fn duplicate_serial_rejected() {
        let store = DeviceStore::new();
        let now = Utc::now();
        store
            .insert(Device::new("SN-1", DeviceType::BloodPressure, now))
            .await
            .unwrap();
        let err = store
            .insert(Device::new("SN-1", DeviceType::BloodPressure, now))
            .await
            .unwrap_err();
        assert_eq!(err, DuplicateSerial("SN-1".to_string()));
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn rejected_update_leaves_document_untouched() {
        let store = DeviceStore::new();
        let d = store
            .insert(Device::new("SN-2", DeviceType::Thermometer, Utc::now()))
            .await
            .unwrap();

        let res: Result<Device, UpdateError<&str>> = store
            .update(d.id, |draft| {
                draft.serial_number = "mutated".into();
                Err("nope")
            })
            .await;
        assert!(matches!(res, Err(UpdateError::Domain("nope"))));
        assert_eq!(store.get(d.id).await.unwrap().serial_number, "SN-2");
    }
}
