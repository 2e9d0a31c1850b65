//! Notification outbox dispatcher.
//!
//! Drains queued notifications in creation order, renders a message per
//! kind, and delivers it to the customer's WhatsApp number. Failed sends
//! are retried on later runs until the attempt budget is spent, after
//! which the notification is marked failed and left for inspection.
//!
//! Without a configured gateway the dispatcher logs each message instead
//! of sending it, so development environments drain the queue too.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::instrument;

use green_grocer_core::{NotificationKind, Phone};

use crate::db::{NotificationRepository, RepositoryError, UserRepository};
use crate::models::notification::Notification;
use crate::models::user::User;
use crate::notify::gateway::{NotifyError, WhatsAppClient};

/// Delivery attempts before a notification is marked failed.
const MAX_ATTEMPTS: i64 = 5;

/// Notifications drained per dispatch run.
const DISPATCH_BATCH: i64 = 50;

/// Outcome of one dispatch run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DispatchReport {
    /// Notifications delivered (or logged, without a gateway).
    pub sent: usize,
    /// Notifications whose delivery attempt failed.
    pub failed: usize,
}

/// Drains the notification outbox.
pub struct NotificationDispatcher<'a> {
    pool: &'a SqlitePool,
    client: Option<&'a WhatsAppClient>,
}

impl<'a> NotificationDispatcher<'a> {
    /// Create a new dispatcher. `client` is `None` when no gateway is
    /// configured; messages are then logged instead of sent.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, client: Option<&'a WhatsAppClient>) -> Self {
        Self { pool, client }
    }

    /// Deliver up to one batch of queued notifications.
    ///
    /// Delivery failures are recorded per notification and never abort the
    /// run; only database failures do.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if reading or updating the outbox fails.
    #[instrument(skip_all)]
    pub async fn dispatch_pending(&self) -> Result<DispatchReport, RepositoryError> {
        let notifications = NotificationRepository::new(self.pool);
        let users = UserRepository::new(self.pool);

        let pending = notifications.pending(DISPATCH_BATCH).await?;
        let mut report = DispatchReport::default();

        for notification in pending {
            let Some(user) = users.find_by_id(notification.user_id).await? else {
                notifications
                    .record_attempt_failure(notification.id, "user no longer exists", MAX_ATTEMPTS)
                    .await?;
                report.failed += 1;
                continue;
            };

            let text = render_message(&notification, &user);
            match self.deliver(&user.phone, &text).await {
                Ok(()) => {
                    notifications.mark_sent(notification.id, Utc::now()).await?;
                    report.sent += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        notification_id = %notification.id,
                        kind = %notification.kind,
                        attempts = notification.attempts + 1,
                        "Notification delivery failed"
                    );
                    notifications
                        .record_attempt_failure(notification.id, &e.to_string(), MAX_ATTEMPTS)
                        .await?;
                    report.failed += 1;
                }
            }
        }

        if report.sent > 0 || report.failed > 0 {
            tracing::info!(sent = report.sent, failed = report.failed, "Dispatched notifications");
        }
        Ok(report)
    }

    async fn deliver(&self, to: &Phone, text: &str) -> Result<(), NotifyError> {
        match self.client {
            Some(client) => client.send_message(to, text).await,
            None => {
                tracing::info!(to = %to, message = text, "No gateway configured; notification logged");
                Ok(())
            }
        }
    }
}

/// Render the outgoing message text for a notification.
fn render_message(notification: &Notification, user: &User) -> String {
    let payload = &notification.payload;
    let order_number = payload["order_number"].as_str().unwrap_or("unknown");

    match notification.kind {
        NotificationKind::OrderConfirmation => format!(
            "Thank you {}! We received your order {} totalling {}. We will confirm it shortly.",
            user.name, order_number, payload["total_amount"]
        ),
        NotificationKind::PaymentReceived => format!(
            "Payment received for order {}. {} loyalty points were added to your account.",
            order_number, payload["points_awarded"]
        ),
        NotificationKind::OrderCompleted => {
            format!("Your order {order_number} has been completed. Thank you for your business!")
        }
        NotificationKind::OrderCancelled => {
            format!("Your order {order_number} has been cancelled.")
        }
        NotificationKind::TierUpgrade => format!(
            "Congratulations {}! You are now a {} member.",
            user.name,
            payload["tier"].as_str().unwrap_or("new tier")
        ),
    }
}
