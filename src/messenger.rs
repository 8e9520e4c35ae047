use async_trait::async_trait;
use ulid::Ulid;

use crate::model::UserId;

/// An inline action offered with a direct message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAction {
    pub label: String,
    pub kind: ActionKind,
    pub booking_id: Ulid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Extend,
    Cancel,
}

impl MessageAction {
    pub fn extend(booking_id: Ulid) -> Self {
        Self {
            label: "Extend by an hour?".into(),
            kind: ActionKind::Extend,
            booking_id,
        }
    }

    pub fn cancel(booking_id: Ulid) -> Self {
        Self {
            label: "Cancel booking".into(),
            kind: ActionKind::Cancel,
            booking_id,
        }
    }
}

#[derive(Debug)]
pub struct SendError(pub String);

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "message delivery failed: {}", self.0)
    }
}

impl std::error::Error for SendError {}

/// Delivery into a user's private chat channel. Best-effort by contract:
/// call sites spawn the send without awaiting it from the triggering
/// operation and log failures — an error here never fails or rolls back
/// the transaction that produced the message.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(
        &self,
        user_id: UserId,
        text: &str,
        actions: &[MessageAction],
    ) -> Result<(), SendError>;
}

/// Logs instead of delivering. Stands in wherever no chat transport is wired.
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(
        &self,
        user_id: UserId,
        text: &str,
        _actions: &[MessageAction],
    ) -> Result<(), SendError> {
        tracing::info!(user_id, text, "direct message");
        Ok(())
    }
}

/// Captures every message instead of delivering. Unit tests assert on the
/// captured traffic.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingMessenger {
    sent: std::sync::Mutex<Vec<(UserId, String, Vec<MessageAction>)>>,
}

#[cfg(test)]
impl RecordingMessenger {
    pub fn sent(&self) -> Vec<(UserId, String, Vec<MessageAction>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(
        &self,
        user_id: UserId,
        text: &str,
        actions: &[MessageAction],
    ) -> Result<(), SendError> {
        self.sent
            .lock()
            .unwrap()
            .push((user_id, text.to_string(), actions.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_messenger_always_succeeds() {
        let messenger = LogMessenger;
        let action = MessageAction::cancel(Ulid::new());
        assert!(messenger.send(7, "hello", &[action]).await.is_ok());
    }

    #[tokio::test]
    async fn recording_messenger_captures_traffic() {
        let messenger = RecordingMessenger::default();
        messenger.send(7, "hello", &[]).await.unwrap();
        let sent = messenger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 7);
        assert_eq!(sent[0].1, "hello");
    }
}
