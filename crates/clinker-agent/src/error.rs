//! Error types for the orchestration core.

use clinker_core::error::ClinkerError;

/// Errors surfaced to callers of the chat orchestrator and session store.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(uuid::Uuid),
    #[error("gateway error: {0}")]
    GatewayError(String),
    #[error("completion error: {0}")]
    CompletionError(String),
    #[error("storage error: {0}")]
    StorageError(String),
}

impl From<ClinkerError> for ChatError {
    fn from(err: ClinkerError) -> Self {
        match err {
            ClinkerError::Gateway(msg) => ChatError::GatewayError(msg),
            other => ChatError::StorageError(other.to_string()),
        }
    }
}

/// Failure of a single data gateway call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,
    #[error("gateway transport failure: {0}")]
    Transport(String),
    #[error("gateway returned HTTP {0}")]
    Status(u16),
    #[error("gateway returned an invalid payload: {0}")]
    InvalidPayload(String),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

impl From<GatewayError> for ChatError {
    fn from(err: GatewayError) -> Self {
        ChatError::GatewayError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(4000).to_string(),
            "message exceeds maximum length of 4000 characters"
        );

        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(
            ChatError::SessionNotFound(id).to_string(),
            "session not found: 550e8400-e29b-41d4-a716-446655440000"
        );
        assert_eq!(
            ChatError::CompletionError("model offline".into()).to_string(),
            "completion error: model offline"
        );
    }

    #[test]
    fn test_gateway_error_display() {
        assert_eq!(GatewayError::Timeout.to_string(), "gateway request timed out");
        assert_eq!(GatewayError::Status(503).to_string(), "gateway returned HTTP 503");
        assert!(GatewayError::InvalidPayload("missing id".into())
            .to_string()
            .contains("missing id"));
    }

    #[test]
    fn test_from_clinker_gateway_error() {
        let err: ChatError = ClinkerError::Gateway("refused".into()).into();
        assert!(matches!(err, ChatError::GatewayError(ref m) if m == "refused"));
    }

    #[test]
    fn test_from_clinker_other_error_is_storage() {
        let err: ChatError = ClinkerError::Storage("disk full".into()).into();
        assert!(matches!(err, ChatError::StorageError(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_from_gateway_error() {
        let err: ChatError = GatewayError::Timeout.into();
        assert_eq!(err.to_string(), "gateway error: gateway request timed out");
    }
}
