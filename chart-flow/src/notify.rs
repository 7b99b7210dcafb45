use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationVariant {
    Success,
    Info,
    Warning,
    Error,
}

/// A user-visible message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub variant: NotificationVariant,
    pub message: String,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            variant: NotificationVariant::Error,
            message: message.into(),
        }
    }
}

/// Sink for user-visible notifications.
///
/// Implementations must return promptly and must not fail.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.variant {
            NotificationVariant::Error => error!(target: "notifications", "{}", notification.message),
            NotificationVariant::Warning => warn!(target: "notifications", "{}", notification.message),
            NotificationVariant::Success | NotificationVariant::Info => {
                info!(target: "notifications", "{}", notification.message)
            }
        }
    }
}

/// Forwards notifications to a channel, typically drained by the UI layer
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new(sender: UnboundedSender<Notification>) -> Self {
        Self { sender }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // nobody listening anymore
        let _ = self.sender.send(notification);
    }
}

/// Kind of chart-data mutation named in messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Saving,
    Editing,
    Deletion,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Saving => "saving",
            Operation::Editing => "editing",
            Operation::Deletion => "deletion",
        };
        f.write_str(name)
    }
}

/// Localized strings for one kind of chart entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteLocales {
    pub entity_label: String,
}

impl NoteLocales {
    pub fn new(entity_label: impl Into<String>) -> Self {
        Self {
            entity_label: entity_label.into(),
        }
    }

    pub fn error_message(&self, operation: Operation) -> String {
        format!(
            "An error occurred during {} {}. Please try again.",
            self.entity_label, operation
        )
    }
}
