//! Chat orchestrator: central coordinator wiring classification, resolution,
//! context aggregation, and session state.
//!
//! [`ChatOrchestrator::handle`] prepares everything the generation step needs
//! for one question. [`ChatOrchestrator::respond`] additionally runs a
//! [`Completion`], records the answer, and hands the exchange to an optional
//! [`HistorySink`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use clinker_core::config::AgentConfig;

use crate::aggregator::ContextAggregator;
use crate::classifier::IntentClassifier;
use crate::completion::{
    Completion, CompletionMessage, CompletionRole, ExchangeRecord, HistorySink, TokenUsage,
};
use crate::error::ChatError;
use crate::gateway::DataGateway;
use crate::resolver::{FacilityResolver, RequirementResolver};
use crate::session::SessionStore;
use crate::types::{ChatRequest, ChatTurn, Message, MessageRole, Metadata, TurnStatus};

/// Answer used when the generation step fails.
pub const FALLBACK_REPLY: &str = "I apologize, but I'm experiencing technical difficulties. \
Please try again later or contact support if the issue persists.";

/// A finished turn with its generated answer.
#[derive(Clone, Debug, Serialize)]
pub struct ChatReply {
    pub turn: ChatTurn,
    pub answer: String,
    pub model: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Central chat orchestrator.
pub struct ChatOrchestrator {
    classifier: IntentClassifier,
    resolver: RequirementResolver,
    aggregator: ContextAggregator,
    sessions: Arc<SessionStore>,
    history_sink: Option<Arc<dyn HistorySink>>,
    config: AgentConfig,
}

impl ChatOrchestrator {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        sessions: Arc<SessionStore>,
        config: AgentConfig,
    ) -> Self {
        let timeout = Duration::from_millis(config.fetch_timeout_ms);
        let facilities =
            FacilityResolver::new(Arc::clone(&gateway), config.facility_selection, timeout);

        Self {
            classifier: IntentClassifier::default(),
            resolver: RequirementResolver::new(facilities),
            aggregator: ContextAggregator::new(gateway, timeout),
            sessions,
            history_sink: None,
            config,
        }
    }

    /// Persist finished exchanges through `sink`.
    pub fn with_history_sink(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.history_sink = Some(sink);
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Prepare one question for generation.
    ///
    /// Validation and unknown-session failures are returned as errors.
    /// Anything that goes wrong after the context is built degrades the
    /// turn instead.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatTurn, ChatError> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if question.chars().count() > self.config.max_question_chars {
            return Err(ChatError::MessageTooLong(self.config.max_question_chars));
        }

        // Open or create the session; identifiers not given fall back to the session's.
        let (session_id, facility_id, organization_id) = match request.session_id {
            Some(id) => {
                let session = self.sessions.get(id)?;
                (
                    id,
                    request.facility_id.clone().or(session.facility_id),
                    request.organization_id.clone().or(session.organization_id),
                )
            }
            None => {
                let id = self.sessions.create(
                    request.user_id.clone(),
                    request.facility_id.clone(),
                    request.organization_id.clone(),
                )?;
                (id, request.facility_id.clone(), request.organization_id.clone())
            }
        };

        let analysis = self.classifier.classify(question, facility_id.is_some());
        let resolution = self
            .resolver
            .resolve(&analysis, facility_id.as_deref(), organization_id.as_deref())
            .await;
        let context = self.aggregator.aggregate_resolution(&resolution).await;

        let mut status = TurnStatus::Completed;

        let history = match self
            .sessions
            .history(session_id, Some(self.config.history_turns))
        {
            Ok(h) => h,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "History unavailable");
                status = TurnStatus::Degraded {
                    reason: e.to_string(),
                };
                Vec::new()
            }
        };

        let mut metadata = Metadata::new();
        metadata.insert("question_type".into(), analysis.question_type.clone().into());
        metadata.insert("context_type".into(), context.context_type().into());
        if let Err(e) =
            self.sessions
                .add_message(session_id, MessageRole::User, question, Some(metadata))
        {
            warn!(session_id = %session_id, error = %e, "Failed to record question");
            status = TurnStatus::Degraded {
                reason: e.to_string(),
            };
        }

        info!(
            session_id = %session_id,
            question_type = %analysis.question_type,
            confidence = analysis.confidence,
            context_type = context.context_type(),
            facility_id = resolution.effective_facility_id.as_deref().unwrap_or("-"),
            auto_selected = resolution.auto_selected,
            degraded = status.is_degraded(),
            "Question handled"
        );

        Ok(ChatTurn {
            session_id,
            question: question.to_string(),
            analysis,
            resolution,
            context,
            history,
            status,
        })
    }

    /// Append the generation step's answer to a session.
    pub fn record_reply(
        &self,
        session_id: Uuid,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<Message, ChatError> {
        self.sessions
            .add_message(session_id, MessageRole::Assistant, content, metadata)
    }

    /// Messages handed to the generation step: context, prior turns, question.
    pub fn build_messages(turn: &ChatTurn) -> Vec<CompletionMessage> {
        let context = serde_json::to_string_pretty(&turn.context).unwrap_or_else(|e| {
            warn!(error = %e, "Context serialization failed");
            String::from("{}")
        });

        let mut messages = Vec::with_capacity(turn.history.len() + 2);
        messages.push(CompletionMessage::new(CompletionRole::System, context));
        messages.extend(
            turn.history
                .iter()
                .map(|m| CompletionMessage::new(m.role.into(), m.content.clone())),
        );
        messages.push(CompletionMessage::new(
            CompletionRole::User,
            turn.question.clone(),
        ));
        messages
    }

    /// Handle a question end to end with `completion` generating the answer.
    ///
    /// A failed completion yields [`FALLBACK_REPLY`] and a degraded turn.
    pub async fn respond(
        &self,
        request: ChatRequest,
        completion: &dyn Completion,
    ) -> Result<ChatReply, ChatError> {
        let user_id = request.user_id.clone();
        let mut turn = self.handle(request).await?;
        let messages = Self::build_messages(&turn);

        let (answer, model, usage) = match completion.complete(&messages).await {
            Ok(reply) => (reply.text, reply.model, reply.usage),
            Err(e) => {
                warn!(session_id = %turn.session_id, error = %e, "Completion failed");
                turn.status = TurnStatus::Degraded {
                    reason: e.to_string(),
                };
                (FALLBACK_REPLY.to_string(), None, None)
            }
        };

        let mut metadata = Metadata::new();
        metadata.insert("question_type".into(), turn.analysis.question_type.clone().into());
        metadata.insert("context_type".into(), turn.context.context_type().into());
        if let Some(model) = &model {
            metadata.insert("model".into(), model.clone().into());
        }
        if let Some(usage) = usage {
            if let Ok(value) = serde_json::to_value(usage) {
                metadata.insert("usage".into(), value);
            }
        }

        if let Err(e) = self.record_reply(turn.session_id, &answer, Some(metadata)) {
            warn!(session_id = %turn.session_id, error = %e, "Failed to record reply");
            turn.status = TurnStatus::Degraded {
                reason: e.to_string(),
            };
        }

        if let Some(sink) = &self.history_sink {
            let record = ExchangeRecord {
                organization_id: turn.resolution.organization_id.clone(),
                user_id,
                facility_id: turn.resolution.effective_facility_id.clone(),
                session_id: turn.session_id,
                message: turn.question.clone(),
                response: answer.clone(),
                message_type: ExchangeRecord::CHAT_SESSION.to_string(),
            };
            let sink = Arc::clone(sink);
            tokio::spawn(async move {
                let session_id = record.session_id;
                if let Err(e) = sink.save_exchange(record).await {
                    warn!(session_id = %session_id, error = %e, "Failed to persist chat history");
                }
            });
        }

        Ok(ChatReply {
            turn,
            answer,
            model,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayFixture, StaticGateway};
    use crate::types::DataRequirement;
    use async_trait::async_trait;
    use clinker_core::config::SessionConfig;
    use serde_json::json;

    struct FixedCompletion(Result<String, String>);

    #[async_trait]
    impl Completion for FixedCompletion {
        async fn complete(
            &self,
            messages: &[CompletionMessage],
        ) -> Result<crate::completion::CompletionReply, ChatError> {
            assert_eq!(messages[0].role, CompletionRole::System);
            match &self.0 {
                Ok(text) => Ok(crate::completion::CompletionReply {
                    text: text.clone(),
                    model: Some("test-model".into()),
                    usage: Some(TokenUsage {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                        total_tokens: 15,
                    }),
                }),
                Err(e) => Err(ChatError::CompletionError(e.clone())),
            }
        }
    }

    fn orchestrator() -> ChatOrchestrator {
        let fixture: GatewayFixture = serde_json::from_value(json!({
            "organizations": { "org-1": [{ "id": "f-1", "name": "North Plant" }] },
            "facilities": { "f-1": { "id": "f-1", "name": "North Plant" } },
            "emissions": { "f-1": [{ "year": 2024, "month": 1, "total_emissions": 10.0 }] }
        }))
        .unwrap();
        ChatOrchestrator::new(
            Arc::new(StaticGateway::new(fixture)),
            Arc::new(SessionStore::new(SessionConfig::default())),
            AgentConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_rejects_blank_question() {
        let orch = orchestrator();
        let err = orch.handle(ChatRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(orch.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_long_question() {
        let orch = orchestrator();
        let long = "a".repeat(4001);
        let err = orch.handle(ChatRequest::new(long)).await.unwrap_err();
        assert!(matches!(err, ChatError::MessageTooLong(4000)));
    }

    #[tokio::test]
    async fn test_unknown_session_is_error() {
        let orch = orchestrator();
        let err = orch
            .handle(ChatRequest::new("hello").with_session(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_handle_creates_session_and_records_question() {
        let orch = orchestrator();
        let turn = orch
            .handle(ChatRequest::new("Show emissions").with_facility("f-1"))
            .await
            .unwrap();
        assert_eq!(turn.status, TurnStatus::Completed);
        assert!(turn.history.is_empty());
        assert!(turn
            .analysis
            .data_requirements
            .contains(&DataRequirement::EmissionData));
        assert_eq!(turn.context.context_type(), "facility_specific");

        let history = orch.sessions().history(turn.session_id, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "Show emissions");
        assert_eq!(history[0].metadata["context_type"], "facility_specific");
    }

    #[tokio::test]
    async fn test_session_identifiers_carry_over() {
        let orch = orchestrator();
        let first = orch
            .handle(ChatRequest::new("Show emissions").with_facility("f-1"))
            .await
            .unwrap();
        let second = orch
            .handle(ChatRequest::new("And the emission trend?").with_session(first.session_id))
            .await
            .unwrap();
        assert_eq!(second.resolution.effective_facility_id.as_deref(), Some("f-1"));
        assert_eq!(second.history.len(), 1);
        assert_eq!(second.history[0].content, "Show emissions");
    }

    #[tokio::test]
    async fn test_respond_records_reply() {
        let orch = orchestrator();
        let reply = orch
            .respond(
                ChatRequest::new("Show emissions").with_facility("f-1"),
                &FixedCompletion(Ok("Emissions were 10 kg.".into())),
            )
            .await
            .unwrap();
        assert_eq!(reply.answer, "Emissions were 10 kg.");
        assert_eq!(reply.model.as_deref(), Some("test-model"));
        assert_eq!(reply.turn.status, TurnStatus::Completed);

        let history = orch.sessions().history(reply.turn.session_id, None).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[1].metadata["model"], "test-model");
        assert_eq!(history[1].metadata["usage"]["total_tokens"], 15);
    }

    #[tokio::test]
    async fn test_respond_completion_failure_degrades() {
        let orch = orchestrator();
        let reply = orch
            .respond(
                ChatRequest::new("hello there"),
                &FixedCompletion(Err("model offline".into())),
            )
            .await
            .unwrap();
        assert_eq!(reply.answer, FALLBACK_REPLY);
        assert!(reply.turn.status.is_degraded());
        let history = orch.sessions().history(reply.turn.session_id, None).unwrap();
        assert_eq!(history[1].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_build_messages_order() {
        let orch = orchestrator();
        let first = orch.handle(ChatRequest::new("hello there")).await.unwrap();
        orch.record_reply(first.session_id, "hi!", None).unwrap();
        let turn = orch
            .handle(ChatRequest::new("what is clinker?").with_session(first.session_id))
            .await
            .unwrap();

        let messages = ChatOrchestrator::build_messages(&turn);
        let roles: Vec<CompletionRole> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                CompletionRole::System,
                CompletionRole::User,
                CompletionRole::Assistant,
                CompletionRole::User,
            ]
        );
        assert!(messages[0].content.contains("context_type"));
        assert_eq!(messages[3].content, "what is clinker?");
    }

    #[tokio::test]
    async fn test_history_limited_to_configured_turns() {
        let config = AgentConfig {
            history_turns: 2,
            ..AgentConfig::default()
        };
        let orch = ChatOrchestrator::new(
            Arc::new(StaticGateway::default()),
            Arc::new(SessionStore::default()),
            config,
        );
        let first = orch.handle(ChatRequest::new("one")).await.unwrap();
        for q in ["two", "three", "four"] {
            orch.handle(ChatRequest::new(q).with_session(first.session_id))
                .await
                .unwrap();
        }
        let turn = orch
            .handle(ChatRequest::new("five").with_session(first.session_id))
            .await
            .unwrap();
        let contents: Vec<&str> = turn.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["three", "four"]);
    }
}
