//! Orchestration core for the Clinker assistant.
//!
//! Classifies cement-industry questions, gathers the facility data they need
//! from a backend gateway, and keeps per-conversation session state for the
//! generation step.

pub mod aggregator;
pub mod classifier;
pub mod completion;
pub mod context;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod resolver;
pub mod rules;
pub mod session;
pub mod types;

pub use aggregator::{ContextAggregator, FetchPlan};
pub use classifier::{infer_time_range, IntentClassifier};
pub use completion::{
    Completion, CompletionMessage, CompletionReply, CompletionRole, ExchangeRecord, HistorySink,
    TokenUsage,
};
pub use context::{
    ConsumptionSnapshot, ConsumptionSummary, ContextBundle, ErrorContext, FacilityContext,
    GeneralContext, SourceFailure, SummaryMetrics,
};
pub use error::{ChatError, GatewayError};
pub use gateway::{DataGateway, Fault, Fetched, GatewayFixture, GatewayOp, StaticGateway};
pub use orchestrator::{ChatOrchestrator, ChatReply, FALLBACK_REPLY};
pub use resolver::{FacilityResolver, RequirementResolver, Resolution};
pub use rules::{CategoryRule, RuleTable};
pub use session::SessionStore;
pub use types::{
    AnalysisResult, ChatRequest, ChatSession, ChatTurn, DataRequirement, Message, MessageRole,
    Metadata, Requirements, SessionStats, SessionSummary, TurnStatus,
};
