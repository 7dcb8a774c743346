//! Operator-facing user messages.
//!
//! The scheduler reports a couple of conditions (no default type, no backends
//! reporting) to a sink before failing. Sink failures are logged and never
//! abort scheduling.

use super::RequestContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Action during which the message was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageAction {
    Create,
    AllocateHost,
    Extend,
}

impl MessageAction {
    /// Stable action code.
    pub fn code(self) -> &'static str {
        match self {
            MessageAction::Create => "001",
            MessageAction::AllocateHost => "002",
            MessageAction::Extend => "003",
        }
    }
}

/// Kind of resource the message is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageResource {
    Share,
    ShareGroup,
    ShareReplica,
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDetail {
    NoDefaultShareType,
    ShareBackendNotReadyYet,
    NoValidHost,
}

impl MessageDetail {
    pub fn code(self) -> &'static str {
        match self {
            MessageDetail::NoDefaultShareType => "002",
            MessageDetail::ShareBackendNotReadyYet => "003",
            MessageDetail::NoValidHost => "004",
        }
    }
}

impl fmt::Display for MessageDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MessageDetail::NoDefaultShareType => {
                "No default share type has been made available. You must specify a share type for creating shares."
            }
            MessageDetail::ShareBackendNotReadyYet => {
                "Share Driver has failed to setup one or more share backends, or they are not reporting capabilities yet."
            }
            MessageDetail::NoValidHost => {
                "No storage could be allocated for this share request. Capabilities requested may not be available."
            }
        };
        f.write_str(text)
    }
}

/// One message as recorded by a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: Uuid,
    pub request_id: Uuid,
    pub project_id: Option<String>,
    pub action: MessageAction,
    pub resource_type: MessageResource,
    pub resource_id: Option<String>,
    pub detail: MessageDetail,
    /// `<action>-<detail>` code pair
    pub message_code: String,
    pub created_at: DateTime<Utc>,
}

impl UserMessage {
    pub fn new(
        context: &RequestContext,
        action: MessageAction,
        project_id: Option<&str>,
        resource_type: MessageResource,
        resource_id: Option<&str>,
        detail: MessageDetail,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id: context.request_id,
            project_id: project_id.map(str::to_string),
            action,
            resource_type,
            resource_id: resource_id.map(str::to_string),
            detail,
            message_code: format!("{}-{}", action.code(), detail.code()),
            created_at: Utc::now(),
        }
    }
}

/// Errors a sink may report.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message store unavailable: {0}")]
    Unavailable(String),
}

/// Receiver of structured failure notifications.
pub trait MessageSink: Send + Sync {
    fn create(
        &self,
        context: &RequestContext,
        action: MessageAction,
        project_id: Option<&str>,
        resource_type: MessageResource,
        resource_id: Option<&str>,
        detail: MessageDetail,
    ) -> Result<(), MessageError>;
}

/// Sink that emits each message as a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMessageSink;

impl MessageSink for TracingMessageSink {
    fn create(
        &self,
        context: &RequestContext,
        action: MessageAction,
        project_id: Option<&str>,
        resource_type: MessageResource,
        resource_id: Option<&str>,
        detail: MessageDetail,
    ) -> Result<(), MessageError> {
        let message = UserMessage::new(
            context,
            action,
            project_id,
            resource_type,
            resource_id,
            detail,
        );
        tracing::warn!(
            message_id = %message.id,
            request_id = %message.request_id,
            project_id = message.project_id.as_deref().unwrap_or_default(),
            resource_type = ?message.resource_type,
            resource_id = message.resource_id.as_deref().unwrap_or_default(),
            message_code = %message.message_code,
            "{}",
            message.detail
        );
        Ok(())
    }
}

/// Sink that keeps messages in memory. Used by the CLI and tests.
#[derive(Debug, Default)]
pub struct MemoryMessageSink {
    messages: Mutex<Vec<UserMessage>>,
}

impl MemoryMessageSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn messages(&self) -> Vec<UserMessage> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<UserMessage> {
        match self.messages.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl MessageSink for MemoryMessageSink {
    fn create(
        &self,
        context: &RequestContext,
        action: MessageAction,
        project_id: Option<&str>,
        resource_type: MessageResource,
        resource_id: Option<&str>,
        detail: MessageDetail,
    ) -> Result<(), MessageError> {
        let message = UserMessage::new(
            context,
            action,
            project_id,
            resource_type,
            resource_id,
            detail,
        );
        self.messages
            .lock()
            .map_err(|e| MessageError::Unavailable(e.to_string()))?
            .push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_records_and_drains() {
        let sink = MemoryMessageSink::new();
        let ctx = RequestContext::new("alice", "proj");
        sink.create(
            &ctx,
            MessageAction::Create,
            ctx.project_id.as_deref(),
            MessageResource::Share,
            Some("share-1"),
            MessageDetail::NoDefaultShareType,
        )
        .unwrap();

        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_code, "001-002");
        assert_eq!(messages[0].project_id.as_deref(), Some("proj"));
        assert_eq!(messages[0].request_id, ctx.request_id);

        assert_eq!(sink.drain().len(), 1);
        assert!(sink.messages().is_empty());
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        let ctx = RequestContext::admin();
        assert!(TracingMessageSink
            .create(
                &ctx,
                MessageAction::Create,
                None,
                MessageResource::Share,
                None,
                MessageDetail::ShareBackendNotReadyYet,
            )
            .is_ok());
    }

    #[test]
    fn test_enums_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&MessageDetail::ShareBackendNotReadyYet).unwrap(),
            r#""share_backend_not_ready_yet""#
        );
        assert_eq!(
            serde_json::to_string(&MessageResource::ShareGroup).unwrap(),
            r#""share_group""#
        );
    }
}
