//! Shared types for question analysis, sessions, and chat turns.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ContextBundle;
use crate::resolver::Resolution;

// =============================================================================
// Question analysis
// =============================================================================

/// A category of external data needed to answer a question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataRequirement {
    None,
    FacilityBasic,
    EmissionData,
    ProductionData,
    TargetsGoals,
    IndustryBenchmarks,
    HistoricalTrends,
    ResourcesConfig,
    OrganizationData,
}

impl DataRequirement {
    /// Requirements that can only be served once a facility is known.
    pub const FACILITY_SCOPED: [DataRequirement; 4] = [
        DataRequirement::FacilityBasic,
        DataRequirement::EmissionData,
        DataRequirement::ProductionData,
        DataRequirement::ResourcesConfig,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataRequirement::None => "none",
            DataRequirement::FacilityBasic => "facility_basic",
            DataRequirement::EmissionData => "emission_data",
            DataRequirement::ProductionData => "production_data",
            DataRequirement::TargetsGoals => "targets_goals",
            DataRequirement::IndustryBenchmarks => "industry_benchmarks",
            DataRequirement::HistoricalTrends => "historical_trends",
            DataRequirement::ResourcesConfig => "resources_config",
            DataRequirement::OrganizationData => "organization_data",
        }
    }

    pub fn is_facility_scoped(&self) -> bool {
        Self::FACILITY_SCOPED.contains(self)
    }
}

impl fmt::Display for DataRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered set of data requirements.
pub type Requirements = BTreeSet<DataRequirement>;

/// Outcome of classifying a question.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Winning category, or "general".
    pub question_type: String,
    /// Either exactly `{None}` or a set without `None`.
    pub data_requirements: Requirements,
    /// In [0, 1].
    pub confidence: f64,
    pub reasoning: String,
    pub suggested_time_range_months: Option<u32>,
}

impl AnalysisResult {
    /// Whether answering needs any external data at all.
    pub fn requires_data(&self) -> bool {
        !self.data_requirements.contains(&DataRequirement::None)
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// Open key-value metadata attached to sessions and messages.
pub type Metadata = HashMap<String, serde_json::Value>;

/// A single message in a conversation. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A conversation with bounded history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub facility_id: Option<String>,
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Session listing entry (no message bodies).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub facility_id: Option<String>,
    pub organization_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub message_count: usize,
}

impl From<&ChatSession> for SessionSummary {
    fn from(s: &ChatSession) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id.clone(),
            facility_id: s.facility_id.clone(),
            organization_id: s.organization_id.clone(),
            created_at: s.created_at,
            last_activity_at: s.last_activity_at,
            message_count: s.messages.len(),
        }
    }
}

/// Aggregate session counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub total_messages: usize,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Chat turns
// =============================================================================

/// An incoming question with optional identifiers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl ChatRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_facility(mut self, facility_id: impl Into<String>) -> Self {
        self.facility_id = Some(facility_id.into());
        self
    }

    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Whether a turn ran cleanly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    /// Something went wrong at the boundary; partial results are still returned.
    Degraded { reason: String },
}

impl TurnStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, TurnStatus::Degraded { .. })
    }
}

/// Everything the generation step needs for one question.
#[derive(Clone, Debug, Serialize)]
pub struct ChatTurn {
    pub session_id: Uuid,
    pub question: String,
    pub analysis: AnalysisResult,
    pub resolution: Resolution,
    pub context: ContextBundle,
    /// Prior messages, oldest first, excluding this question.
    pub history: Vec<Message>,
    pub status: TurnStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_serializes_snake_case() {
        let json = serde_json::to_string(&DataRequirement::EmissionData).unwrap();
        assert_eq!(json, "\"emission_data\"");
        let back: DataRequirement = serde_json::from_str("\"organization_data\"").unwrap();
        assert_eq!(back, DataRequirement::OrganizationData);
    }

    #[test]
    fn test_requirement_display_matches_serde() {
        for req in [
            DataRequirement::None,
            DataRequirement::TargetsGoals,
            DataRequirement::HistoricalTrends,
        ] {
            let json = serde_json::to_string(&req).unwrap();
            assert_eq!(json.trim_matches('"'), req.to_string());
        }
    }

    #[test]
    fn test_facility_scoped_set() {
        assert!(DataRequirement::FacilityBasic.is_facility_scoped());
        assert!(DataRequirement::ResourcesConfig.is_facility_scoped());
        assert!(!DataRequirement::TargetsGoals.is_facility_scoped());
        assert!(!DataRequirement::HistoricalTrends.is_facility_scoped());
        assert!(!DataRequirement::OrganizationData.is_facility_scoped());
    }

    #[test]
    fn test_requires_data() {
        let mut analysis = AnalysisResult {
            question_type: "general".into(),
            data_requirements: [DataRequirement::None].into_iter().collect(),
            confidence: 0.5,
            reasoning: String::new(),
            suggested_time_range_months: Some(6),
        };
        assert!(!analysis.requires_data());
        analysis.data_requirements = [DataRequirement::EmissionData].into_iter().collect();
        assert!(analysis.requires_data());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&MessageRole::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(MessageRole::User.as_str(), "user");
    }

    #[test]
    fn test_chat_request_builder() {
        let req = ChatRequest::new("hi")
            .with_facility("f-1")
            .with_organization("o-1")
            .with_user("u-1");
        assert_eq!(req.question, "hi");
        assert_eq!(req.facility_id.as_deref(), Some("f-1"));
        assert_eq!(req.organization_id.as_deref(), Some("o-1"));
        assert_eq!(req.user_id.as_deref(), Some("u-1"));
        assert!(req.session_id.is_none());
    }

    #[test]
    fn test_turn_status_serialization() {
        let status = TurnStatus::Degraded {
            reason: "session vanished".into(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "degraded");
        assert_eq!(json["reason"], "session vanished");
        assert!(status.is_degraded());
        assert!(!TurnStatus::Completed.is_degraded());
    }
}
