//! Notification outbox domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use green_grocer_core::{NotificationId, NotificationKind, NotificationStatus, OrderId, UserId};

/// A queued outbound customer notification.
///
/// Rows are written in the same transaction as the state change that
/// triggered them and delivered later by the dispatcher job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification ID.
    pub id: NotificationId,
    /// What the notification is about.
    pub kind: NotificationKind,
    /// Recipient.
    pub user_id: UserId,
    /// Related order, if any.
    pub order_id: Option<OrderId>,
    /// Message payload rendered by the dispatcher.
    pub payload: serde_json::Value,
    /// Delivery state.
    pub status: NotificationStatus,
    /// Delivery attempts so far.
    pub attempts: i64,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
    /// When the notification was queued.
    pub created_at: DateTime<Utc>,
    /// When delivery succeeded.
    pub sent_at: Option<DateTime<Utc>>,
}
