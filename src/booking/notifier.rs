use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    Client(i64),
    /// The configured admin chat, if any.
    AdminChat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Reminder,
    CompletionPrompt,
    ApprovalRequested,
    Approved,
    Rejected,
    Cancelled,
    NoShow,
    Completed,
}

/// A request to tell someone about an appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub recipient: Recipient,
    pub kind: MessageKind,
    pub appointment_id: Uuid,
    /// Reminder label for `Reminder` requests.
    pub label: Option<String>,
    pub starts_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
#[error("notification to {recipient:?} failed: {reason}")]
pub struct NotifyError {
    pub recipient: Recipient,
    pub reason: String,
}

/// Outbound delivery. Failures are logged by the caller and never roll back a transition.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, request: &NotificationRequest) -> Result<(), NotifyError>;
}

/// Drops every request. Used when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _request: &NotificationRequest) -> Result<(), NotifyError> {
        Ok(())
    }
}
