use std::collections::BTreeMap;
use std::sync::Arc;

use rpm_types::Patient;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::UpdateError;

#[derive(Clone, Default)]
pub struct PatientStore {
    inner: Arc<RwLock<BTreeMap<Uuid, Patient>>>,
}

impl PatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, patient: Patient) -> Patient {
        self.inner
            .write()
            .await
            .insert(patient.id, patient.clone());
        patient
    }

    pub async fn get(&self, id: Uuid) -> Option<Patient> {
        self.inner.read().await.get(&id).cloned()
    }

    pub async fn find_by_mrn(&self, mrn: &str) -> Option<Patient> {
        self.inner
            .read()
            .await
            .values()
            .find(|p| p.mrn == mrn)
            .cloned()
    }

    /// Link a device to a patient. Idempotent: the device set absorbs
    /// re-delivery.
    pub async fn add_device(&self, id: Uuid, device_id: Uuid) -> Result<Patient, UpdateError<std::convert::Infallible>> {
        self.update(id, |p| {
            p.devices.insert(device_id);
            Ok(())
        })
        .await
    }

    pub async fn remove_device(&self, id: Uuid, device_id: Uuid) -> Result<Patient, UpdateError<std::convert::Infallible>> {
        self.update(id, |p| {
            p.devices.remove(&device_id);
            Ok(())
        })
        .await
    }

    /// Atomic read-modify-write; committed only if the closure returns `Ok`.
    pub async fn update<E, F>(&self, id: Uuid, f: F) -> Result<Patient, UpdateError<E>>
    where
        F: FnOnce(&mut Patient) -> Result<(), E>,
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

    pub async fn list(&self) -> Vec<Patient> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn device_link_is_idempotent() {
        let store = PatientStore::new();
        let p = store
            .insert(Patient::new("MRN-1", "Ada", "Lovelace", Utc::now()))
            .await;
        let device = Uuid::new_v4();

        store.add_device(p.id, device).await.unwrap();
        store.add_device(p.id, device).await.unwrap();
        assert_eq!(store.get(p.id).await.unwrap().devices.len(), 1);

        store.remove_device(p.id, device).await.unwrap();
        assert!(store.get(p.id).await.unwrap().devices.is_empty());
    }
}
