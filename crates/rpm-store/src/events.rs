//! Append-only webhook event ledger.
//!
//! Every inbound webhook is appended as `received` before any processing
//! starts, and completed exactly once with a terminal status afterwards. A
//! second completion attempt is refused, which keeps the ledger an honest
//! record even if a handler path double-reports.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rpm_types::{WebhookEvent, WebhookEventType, WebhookStatus};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct EventLog {
    inner: Arc<RwLock<Vec<WebhookEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new `received` entry and return its id.
    pub async fn append(
        &self,
        event_type: WebhookEventType,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Uuid {
        let event = WebhookEvent {
            id: Uuid::new_v4(),
            event_type,
            payload,
            status: WebhookStatus::Received,
            error: None,
            received_at: now,
            processed_at: None,
        };
        let id = event.id;
        self.inner.write().await.push(event);
        id
    }

    /// Complete an entry with a terminal status. Returns `false` when the
    /// entry is unknown or already terminal; the first completion wins.
    pub async fn complete(
        &self,
        id: Uuid,
        status: WebhookStatus,
        error: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if !status.is_terminal() {
            return false;
        }
        let mut g = self.inner.write().await;
        let Some(event) = g.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        if event.status.is_terminal() {
            return false;
        }
        event.status = status;
        event.error = error;
        event.processed_at = Some(now);
        true
    }

    pub async fn get(&self, id: Uuid) -> Option<WebhookEvent> {
        self.inner.read().await.iter().find(|e| e.id == id).cloned()
    }

    /// Most recent entries first, capped at `limit`.
    pub async fn recent(&self, limit: usize) -> Vec<WebhookEvent> {
        let g = self.inner.read().await;
        g.iter().rev().take(limit).cloned().collect()
    }

    pub async fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for e in self.inner.read().await.iter() {
            *counts.entry(e.status.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn completion_happens_exactly_once() {
        let log = EventLog::new();
        let id = log
            .append(WebhookEventType::Measurement, json!({}), Utc::now())
            .await;

        assert!(
            log.complete(id, WebhookStatus::Processed, None, Utc::now())
                .await
        );
        assert!(
            !log.complete(
                id,
                WebhookStatus::Error,
                Some("late".into()),
                Utc::now()
            )
            .await,
            "second completion must be refused"
        );

        let event = log.get(id).await.unwrap();
        assert_eq!(event.status, WebhookStatus::Processed);
        assert!(event.error.is_none());
        assert!(event.processed_at.is_some());
    }

    #[tokio::test]
    async fn received_is_not_a_valid_completion() {
        let log = EventLog::new();
        let id = log
            .append(WebhookEventType::Fulfillment, json!({}), Utc::now())
            .await;
        assert!(
            !log.complete(id, WebhookStatus::Received, None, Utc::now())
                .await
        );
    }

    #[tokio::test]
    async fn recent_is_newest_first() {
        let log = EventLog::new();
        log.append(WebhookEventType::Measurement, json!({"n": 1}), Utc::now())
            .await;
        log.append(WebhookEventType::Fulfillment, json!({"n": 2}), Utc::now())
            .await;

        let recent = log.recent(10).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event_type, WebhookEventType::Fulfillment);
    }
}
