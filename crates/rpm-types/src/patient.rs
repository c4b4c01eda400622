//! Patient document: owned by the clinical-records boundary; the engine only
//! references patients by id and maintains the linked-device set.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Postal address. Doubles as the shipping-address snapshot on orders, where
/// `name` carries the recipient name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip_code: String,
}

/// An enrolled remote-monitoring patient.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    /// Medical record number, unique across the program.
    pub mrn: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Address,
    /// Ids of devices currently linked to this patient (order-irrelevant set).
    pub devices: BTreeSet<Uuid>,
    /// Program enrollment, e.g. "RPM".
    pub program: String,
    pub conditions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(
        mrn: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mrn: mrn.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: None,
            phone: None,
            address: Address::default(),
            devices: BTreeSet::new(),
            program: "RPM".to_string(),
            conditions: Vec::new(),
            created_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Shipping address with the patient's name filled in as recipient.
    pub fn shipping_address(&self) -> Address {
        Address {
            name: self.full_name(),
            ..self.address.clone()
        }
    }
}
