//! CLI argument definitions for the Clinker binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use clinker_core::config::GatewayConfig;

/// Clinker: question routing and context assembly for cement plant data.
#[derive(Parser, Debug)]
#[command(name = "clinker", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Backend base URL.
    #[arg(long = "backend-url", global = true)]
    pub backend_url: Option<String>,

    /// Serve data from a JSON fixture file instead of the backend.
    #[arg(long = "fixture", global = true)]
    pub fixture: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Classify a question, gather its context, and print the prepared turn.
    Ask {
        question: String,
        #[command(flatten)]
        scope: Scope,
    },
    /// Classify a question without touching the backend.
    Classify {
        question: String,
        /// Treat the question as scoped to a known facility.
        #[arg(long = "with-facility")]
        with_facility: bool,
    },
    /// Read questions from stdin, one per line, within a single session.
    Chat {
        #[command(flatten)]
        scope: Scope,
    },
}

/// Identifiers a question may be scoped to.
#[derive(clap::Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    #[arg(short = 'f', long = "facility")]
    pub facility: Option<String>,
    #[arg(short = 'o', long = "organization")]
    pub organization: Option<String>,
    #[arg(short = 'u', long = "user")]
    pub user: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CLINKER_CONFIG env var > ~/.clinker/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CLINKER_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the tracing filter directive.
    ///
    /// Priority: --log-level flag > RUST_LOG env var > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            if !level.is_empty() {
                return level;
            }
        }
        config_level.to_string()
    }

    /// Apply backend overrides on top of the file configuration.
    ///
    /// Priority: --backend-url flag > CLINKER_BACKEND_URL env var > config.
    /// The API key is only read from CLINKER_API_KEY or the config file.
    pub fn apply_gateway_overrides(&self, gateway: &mut GatewayConfig) {
        self.apply_gateway_overrides_with(gateway, |key| std::env::var(key).ok());
    }

    fn apply_gateway_overrides_with(
        &self,
        gateway: &mut GatewayConfig,
        env: impl Fn(&str) -> Option<String>,
    ) {
        if let Some(url) = self.backend_url.clone().or_else(|| env("CLINKER_BACKEND_URL")) {
            gateway.base_url = url;
        }
        if let Some(key) = env("CLINKER_API_KEY") {
            gateway.api_key = key;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".clinker").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".clinker").join("config.toml");
    }
    PathBuf::from("config.toml")
}
