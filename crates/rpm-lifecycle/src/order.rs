//! Order status state machine.
//!
//! # State diagram
//!
//! ```text
//!   draft -> pending -> processing -> shipped -> delivered (term.)
//!                |          |
//!                +----------+--> cancelled (term.)
//! ```
//!
//! `cancelled` is reachable from `pending` or `processing` only; attempting
//! to cancel a shipped or delivered order fails with [`InvalidTransition`].

use chrono::{DateTime, Utc};
use rpm_types::{Order, OrderStatus};

/// Returned when a target status is not a legal successor of the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid order transition: {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Tracking fields stamped by a `shipped` transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingUpdate {
    pub tracking_number: Option<String>,
    pub tracking_url: Option<String>,
}

/// Whether an applied transition changed state or absorbed a re-delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Transitioned,
    /// The order was already in the target status; only an audit history
    /// entry was appended.
    AlreadyInState,
}

/// Legal predecessor states for each target status.
fn legal_predecessors(to: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;
    match to {
        Draft => &[],
        Pending => &[Draft],
        Processing => &[Pending],
        Shipped => &[Processing],
        Delivered => &[Shipped],
        Cancelled => &[Pending, Processing],
    }
}

/// Apply a status transition to an order.
///
/// On success the order's status is updated, transition-specific fields are
/// stamped (`shipped` sets `shipped_at` and tracking info, `delivered` sets
/// `delivered_at`), and exactly one history entry is appended.
///
/// Re-applying the current status returns [`Applied::AlreadyInState`]: no
/// field changes, but the re-delivery is still recorded in the history.
///
/// # Errors
/// [`InvalidTransition`] when `to` is not reachable from the current status;
/// the order is left unchanged.
pub fn apply_order_transition(
    order: &mut Order,
    to: OrderStatus,
    note: Option<&str>,
    tracking: Option<TrackingUpdate>,
    now: DateTime<Utc>,
) -> Result<Applied, InvalidTransition> {
    if order.status == to {
        // Idempotent absorb of a retried webhook: audit, don't error.
        let note = note
            .map(str::to_string)
            .unwrap_or_else(|| format!("Status {to} re-delivered; no change"));
        order.push_history(to, now, note);
        order.updated_at = now;
        return Ok(Applied::AlreadyInState);
    }

    if !legal_predecessors(to).contains(&order.status) {
        return Err(InvalidTransition {
            from: order.status,
            to,
        });
    }

    match to {
        OrderStatus::Shipped => {
            order.shipped_at = Some(now);
            if let Some(t) = tracking {
                if t.tracking_number.is_some() {
                    order.tracking_number = t.tracking_number;
                }
                if t.tracking_url.is_some() {
                    order.tracking_url = t.tracking_url;
                }
            }
        }
        OrderStatus::Delivered => {
            order.delivered_at = Some(now);
        }
        _ => {}
    }

    order.status = to;
    let note = note
        .map(str::to_string)
        .unwrap_or_else(|| format!("Status changed to {to}"));
    order.push_history(to, now, note);
    order.updated_at = now;

    Ok(Applied::Transitioned)
}
