//! Clinker application binary - composition root.
//!
//! 1. Load configuration from TOML and apply CLI/env overrides
//! 2. Initialize tracing
//! 3. Choose the data gateway (backend HTTP API or a JSON fixture)
//! 4. Start the session store sweeper
//! 5. Run the requested command, printing results as JSON

mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use clinker_agent::{
    ChatOrchestrator, ChatRequest, DataGateway, IntentClassifier, SessionStore, StaticGateway,
};
use clinker_core::config::ClinkerConfig;
use clinker_gateway::HttpDataGateway;

use cli::{CliArgs, Command, Scope};

fn request(question: &str, scope: &Scope, session_id: Option<Uuid>) -> ChatRequest {
    let mut req = ChatRequest::new(question);
    req.session_id = session_id;
    req.facility_id = scope.facility.clone();
    req.organization_id = scope.organization.clone();
    req.user_id = scope.user.clone();
    req
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Answer stdin questions one line at a time, all within one session.
async fn chat_loop(
    orchestrator: &ChatOrchestrator,
    scope: &Scope,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session_id = None;

    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        match orchestrator
            .handle(request(question, scope, session_id))
            .await
        {
            Ok(turn) => {
                session_id = Some(turn.session_id);
                print_json(&turn)?;
            }
            Err(e) => tracing::warn!(error = %e, "Question rejected"),
        }
    }

    if let Some(id) = session_id {
        tracing::info!(session_id = %id, "Chat input closed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config. Load errors are reported once tracing is up.
    let config_file = args.resolve_config_path();
    let loaded = ClinkerConfig::load(&config_file);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => ClinkerConfig::default(),
    };
    args.apply_gateway_overrides(&mut config.gateway);

    // Tracing.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&level)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Clinker v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Configuration unavailable, using defaults"
        ),
    }

    if let Command::Classify {
        question,
        with_facility,
    } = &args.command
    {
        let analysis = IntentClassifier::default().classify(question, *with_facility);
        return print_json(&analysis);
    }

    // Gateway.
    let sessions = Arc::new(SessionStore::new(config.session.clone()));
    let gateway: Arc<dyn DataGateway> = match &args.fixture {
        Some(path) => Arc::new(StaticGateway::from_json_file(path)?),
        None => Arc::new(HttpDataGateway::new(&config.gateway)?),
    };
    let orchestrator =
        ChatOrchestrator::new(gateway, Arc::clone(&sessions), config.agent.clone());

    sessions.start();

    let outcome = match &args.command {
        Command::Ask { question, scope } => match orchestrator
            .handle(request(question, scope, None))
            .await
        {
            Ok(turn) => print_json(&turn),
            Err(e) => Err(e.into()),
        },
        Command::Chat { scope } => chat_loop(&orchestrator, scope).await,
        Command::Classify { .. } => Ok(()),
    };

    sessions.stop().await;
    tracing::info!(stats = ?sessions.stats(), "Clinker stopped");
    outcome
}
