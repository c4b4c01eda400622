use std::collections::BTreeMap;
use std::sync::Arc;

use rpm_types::Order;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::UpdateError;

#[derive(Clone, Default)]
pub struct OrderStore {
    inner: Arc<RwLock<BTreeMap<Uuid, Order>>>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, order: Order) -> Order {
        self.inner.write().await.insert(order.id, order.clone());
        order
    }

    pub async fn get(&self, id: Uuid) -> Option<Order> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Resolve a fulfillment webhook's join key.
    pub async fn find_by_vendor_order_id(&self, vendor_order_id: &str) -> Option<Order> {
        self.inner
            .read()
            .await
            .values()
            .find(|o| o.vendor_order_id.as_deref() == Some(vendor_order_id))
            .cloned()
    }

    pub async fn find_by_order_number(&self, order_number: &str) -> Option<Order> {
        self.inner
            .read()
            .await
            .values()
            .find(|o| o.order_number == order_number)
            .cloned()
    }

    /// Atomic read-modify-write; committed only if the closure returns `Ok`.
    pub async fn update<E, F>(&self, id: Uuid, f: F) -> Result<Order, UpdateError<E>>
    where
        F: FnOnce(&mut Order) -> Result<(), E>,
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

    pub async fn list(&self) -> Vec<Order> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn count_by_status(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for o in self.inner.read().await.values() {
            *counts.entry(o.status.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }
}
