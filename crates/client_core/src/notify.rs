//! One-shot user-visible notifications ("toasts") shared by all screens.

use shared::domain::CollectionName;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub collection: CollectionName,
    pub message: String,
    /// Correlation token of the mutation that produced this notification, if any.
    pub token: Option<Uuid>,
}

#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn emit(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => error!(
                collection = %notification.collection,
                token = ?notification.token,
                message = %notification.message,
                "notification"
            ),
            NotificationLevel::Warning => warn!(
                collection = %notification.collection,
                message = %notification.message,
                "notification"
            ),
            NotificationLevel::Success | NotificationLevel::Info => info!(
                collection = %notification.collection,
                token = ?notification.token,
                message = %notification.message,
                "notification"
            ),
        }
        let _ = self.tx.send(notification);
    }

    pub fn notify(
        &self,
        level: NotificationLevel,
        collection: &CollectionName,
        message: impl Into<String>,
        token: Option<Uuid>,
    ) {
        self.emit(Notification {
            level,
            collection: collection.clone(),
            message: message.into(),
            token,
        });
    }
}
