use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ClinkerError, Result};

/// Top-level configuration for the Clinker assistant core.
///
/// Loaded from `~/.clinker/config.toml` by default. Each section corresponds
/// to one component of the orchestration pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinkerConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl ClinkerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClinkerConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ClinkerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Conversation session limits and sweep cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle for longer than this are purged by the sweep.
    pub ttl_hours: u32,
    /// How often the background sweep runs.
    pub sweep_interval_secs: u64,
    /// Maximum number of messages retained per session.
    pub max_messages: usize,
    /// A session counts as active in stats if touched within this window.
    pub active_window_minutes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            sweep_interval_secs: 3600,
            max_messages: 50,
            active_window_minutes: 60,
        }
    }
}

/// How a default facility is picked when a question needs facility data
/// but none was given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilitySelection {
    /// Earliest `created_at` first, ties broken by id.
    #[default]
    Oldest,
    /// Whatever the gateway returned first.
    FirstReturned,
}

/// Orchestration and context-gathering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Per-fetch timeout for each data gateway call.
    pub fetch_timeout_ms: u64,
    /// Number of prior messages handed to the generation step.
    pub history_turns: usize,
    /// Maximum accepted question length in characters.
    pub max_question_chars: usize,
    pub facility_selection: FacilitySelection,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: 10_000,
            history_turns: 10,
            max_question_chars: 4000,
            facility_selection: FacilitySelection::default(),
        }
    }
}

/// Backend data gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the backend REST API.
    pub base_url: String,
    /// API key sent as `X-API-Key`.
    pub api_key: String,
    /// Client-wide request timeout.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_key: String::new(),
            timeout_secs: 30,
        }
    }
}
