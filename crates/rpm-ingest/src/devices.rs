//! Device inventory operations invoked by operators (not by webhooks).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rpm_lifecycle as lifecycle;
use rpm_store::{Stores, UpdateError};
use rpm_types::{Device, DeviceType};
use rpm_vendor::{RegisterDeviceRequest, VendorApi, VendorError};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceServiceError {
    PatientNotFound(Uuid),
    DeviceNotFound(Uuid),
    DuplicateSerial(String),
    Lifecycle(lifecycle::DeviceLifecycleError),
    Vendor(VendorError),
}

impl std::fmt::Display for DeviceServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PatientNotFound(id) => write!(f, "patient {id} not found"),
            Self::DeviceNotFound(id) => write!(f, "device {id} not found"),
            Self::DuplicateSerial(s) => write!(f, "device with serial {s} already exists"),
            Self::Lifecycle(e) => write!(f, "{e}"),
            Self::Vendor(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DeviceServiceError {}

impl From<VendorError> for DeviceServiceError {
    fn from(e: VendorError) -> Self {
        Self::Vendor(e)
    }
}

#[derive(Clone)]
pub struct DeviceService {
    stores: Stores,
    vendor: Arc<dyn VendorApi>,
}

impl DeviceService {
    pub fn new(stores: Stores, vendor: Arc<dyn VendorApi>) -> Self {
        Self { stores, vendor }
    }

    /// Add a device to inventory.
    pub async fn provision(
        &self,
        serial_number: String,
        device_type: DeviceType,
        now: DateTime<Utc>,
    ) -> Result<Device, DeviceServiceError> {
        let device = Device::new(serial_number, device_type, now);
        self.stores
            .devices
            .insert(device)
            .await
            .map_err(|e| DeviceServiceError::DuplicateSerial(e.0))
    }

    /// Assign an inventory device to a patient.
    ///
    /// Registers the gateway with the vendor first (if not already
    /// registered), so a vendor failure leaves local state untouched. The
    /// `AlreadyAssigned` guard is enforced by the lifecycle module.
    pub async fn assign(
        &self,
        device_id: Uuid,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Device, DeviceServiceError> {
        let device = self
            .stores
            .devices
            .get(device_id)
            .await
            .ok_or(DeviceServiceError::DeviceNotFound(device_id))?;
        if self.stores.patients.get(patient_id).await.is_none() {
            return Err(DeviceServiceError::PatientNotFound(patient_id));
        }

        let vendor_device_id = match &device.vendor_device_id {
            Some(existing) => existing.clone(),
            None => {
                self.vendor
                    .register_device(&RegisterDeviceRequest {
                        serial_number: device.serial_number.clone(),
                        device_type: device.device_type,
                    })
                    .await?
                    .vendor_device_id
            }
        };

        let updated = self
            .stores
            .devices
            .update(device_id, |draft| {
                lifecycle::device::assign(draft, patient_id, now)?;
                if draft.vendor_device_id.is_none() {
                    draft.vendor_device_id = Some(vendor_device_id.clone());
                }
                Ok::<_, lifecycle::DeviceLifecycleError>(())
            })
            .await
            .map_err(|e| match e {
                UpdateError::NotFound => DeviceServiceError::DeviceNotFound(device_id),
                UpdateError::Domain(l) => DeviceServiceError::Lifecycle(l),
            })?;

        // Idempotent set insert; safe to repeat on retries.
        if self
            .stores
            .patients
            .add_device(patient_id, device_id)
            .await
            .is_err()
        {
            return Err(DeviceServiceError::PatientNotFound(patient_id));
        }
        tracing::info!(%device_id, %patient_id, "device assigned");
        Ok(updated)
    }

    /// Process a device return: unregister the gateway, clear the patient
    /// link, move to the terminal `returned` state.
    pub async fn mark_returned(
        &self,
        device_id: Uuid,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Device, DeviceServiceError> {
        self.close_out(device_id, note, now, lifecycle::device::mark_returned)
            .await
    }

    /// Mark a device lost. Same flow as a return, different terminal state.
    pub async fn mark_lost(
        &self,
        device_id: Uuid,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Device, DeviceServiceError> {
        self.close_out(device_id, note, now, lifecycle::device::mark_lost)
            .await
    }

    async fn close_out(
        &self,
        device_id: Uuid,
        note: Option<String>,
        now: DateTime<Utc>,
        transition: fn(
            &mut Device,
            Option<&str>,
            DateTime<Utc>,
        ) -> Result<(), lifecycle::DeviceLifecycleError>,
    ) -> Result<Device, DeviceServiceError> {
        let device = self
            .stores
            .devices
            .get(device_id)
            .await
            .ok_or(DeviceServiceError::DeviceNotFound(device_id))?;

        if let Some(vendor_device_id) = &device.vendor_device_id {
            self.vendor.unregister_device(vendor_device_id).await?;
        }

        let previous_patient = device.patient_id;
        let updated = self
            .stores
            .devices
            .update(device_id, |draft| transition(draft, note.as_deref(), now))
            .await
            .map_err(|e| match e {
                UpdateError::NotFound => DeviceServiceError::DeviceNotFound(device_id),
                UpdateError::Domain(l) => DeviceServiceError::Lifecycle(l),
            })?;

        if let Some(patient_id) = previous_patient {
            // Patient may have been removed independently; nothing to unlink.
            let _ = self.stores.patients.remove_device(patient_id, device_id).await;
        }
        Ok(updated)
    }

    /// Offline report over all devices, derived at read time.
    pub async fn offline_report(&self, now: DateTime<Utc>) -> Vec<lifecycle::OfflineDevice> {
        let devices = self.stores.devices.list().await;
        lifecycle::offline_report(&devices, now)
    }
}
