//! Customer notifications.
//!
//! State changes queue rows into the notification outbox; the dispatcher
//! drains the queue and delivers messages over the WhatsApp gateway.
//! Delivery is fire-and-forget with bounded retries: a failed send never
//! affects the order or loyalty mutation that queued it.

pub mod dispatcher;
pub mod gateway;

pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use gateway::{NotifyError, WhatsAppClient};
