//! Collaborators on the generation side of a turn.
//!
//! [`Completion`] produces the answer text from an opaque message list;
//! [`HistorySink`] persists finished exchanges outside the process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChatError, GatewayError};
use crate::types::MessageRole;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionRole {
    System,
    User,
    Assistant,
}

impl From<MessageRole> for CompletionRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => CompletionRole::User,
            MessageRole::Assistant => CompletionRole::Assistant,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub role: CompletionRole,
    pub content: String,
}

impl CompletionMessage {
    pub fn new(role: CompletionRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionReply {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Language generation backend.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, messages: &[CompletionMessage]) -> Result<CompletionReply, ChatError>;
}

/// One question/answer pair, as stored by the backend chat history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub organization_id: Option<String>,
    pub user_id: Option<String>,
    pub facility_id: Option<String>,
    pub session_id: Uuid,
    pub message: String,
    pub response: String,
    pub message_type: String,
}

impl ExchangeRecord {
    pub const CHAT_SESSION: &'static str = "chat_session";
}

/// Durable chat-history storage. Failures are logged, never surfaced to the caller.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn save_exchange(&self, record: ExchangeRecord) -> Result<(), GatewayError>;
}
