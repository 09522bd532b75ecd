// defense-cli/src/main.rs
// ============================================================================
// Module: Defense CLI Entry Point
// Description: Runnable example wiring the deliberation engine end to end.
// Purpose: Load a TOML configuration, build the concrete providers/stores it
//          names, submit one project for deliberation, and poll its
//          progress to a terminal stage.
// Dependencies: clap, defense-broker, defense-config, defense-core,
//               defense-orchestrator, defense-providers, defense-store-sqlite,
//               serde_json, tokio, tracing, tracing-subscriber
// ============================================================================

//! ## Overview
//! This binary carries no HTTP surface of its own; it is the example the
//! workspace's other crates are otherwise only covered by unit and
//! integration tests. `defense-gate run` loads a config, resolves its
//! storage and evidence backends from command-line overrides, submits a
//! single project, and polls [`defense_orchestrator::Engine::status`] until
//! the deliberation reaches a terminal stage, printing the final Defense
//! File as JSON.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use bigdecimal::BigDecimal;
use clap::Parser;
use defense_broker::FilesystemDefenseFileStore;
use defense_broker::FilesystemDefenseFileStoreConfig;
use defense_broker::LogNotifier;
use defense_config::DeliberationConfig;
use defense_core::identifiers::CompanyId;
use defense_core::identifiers::ProjectId;
use defense_core::identifiers::TriggerId;
use defense_core::identifiers::UserId;
use defense_core::interfaces::ModelResponse;
use defense_core::model::Project;
use defense_core::model::TenantContext;
use defense_core::runtime::NoopOrchestratorMetrics;
use defense_core::runtime::StartOutcome;
use defense_core::time::Clock;
use defense_core::time::SystemClock;
use defense_orchestrator::build_engine;
use defense_orchestrator::EngineCollaborators;
use defense_providers::JsonRetrievalProvider;
use defense_providers::JsonRetrievalProviderConfig;
use defense_providers::ScriptedModelPort;
use defense_store_sqlite::SqliteDeliberationStateStore;
use defense_store_sqlite::SqliteStateStoreConfig;
use defense_store_sqlite::SqliteUsageCounterStore;
use defense_store_sqlite::SqliteUsageStoreConfig;
use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the deliberation example.
#[derive(Parser, Debug)]
#[command(name = "defense-gate", about = "Runs one deliberation end to end")]
struct Cli {
    /// Path to the TOML deliberation config (agents, stage graph, plans,
    /// timeouts, Defense File root).
    #[arg(long, value_name = "PATH")]
    config: PathBuf,
    /// Directory the JSON retrieval provider reads evidence documents from.
    #[arg(long, value_name = "DIR")]
    evidence_root: PathBuf,
    /// `SQLite` database file for deliberation run state.
    #[arg(long, value_name = "PATH", default_value = "defense-gate-state.sqlite3")]
    state_db: PathBuf,
    /// `SQLite` database file for per-company usage counters.
    #[arg(long, value_name = "PATH", default_value = "defense-gate-usage.sqlite3")]
    usage_db: PathBuf,
    /// Company (tenant) the submitted project belongs to.
    #[arg(long, value_name = "COMPANY")]
    company: String,
    /// Identifier for the submitted project.
    #[arg(long, value_name = "PROJECT_ID")]
    project_id: String,
    /// Short project name.
    #[arg(long, value_name = "NAME")]
    name: String,
    /// Name of the client the contracted service is for.
    #[arg(long, value_name = "NAME", default_value = "")]
    client_name: String,
    /// Description of the contracted service under review.
    #[arg(long, value_name = "TEXT")]
    description: String,
    /// Contracted amount, in the company's reporting currency.
    #[arg(long, value_name = "AMOUNT")]
    amount: String,
    /// ISO 4217 currency code for `amount`.
    #[arg(long, value_name = "CODE", default_value = "USD")]
    currency: String,
    /// Category of service being contracted.
    #[arg(long, value_name = "TYPE", default_value = "")]
    service_type: String,
    /// Name of the sponsoring individual on the client side.
    #[arg(long, value_name = "NAME", default_value = "")]
    sponsor_name: String,
    /// Email address of the sponsoring individual.
    #[arg(long, value_name = "EMAIL", default_value = "")]
    sponsor_email: String,
    /// Idempotency key for this submission; resubmitting the same trigger
    /// id is a no-op rather than starting a second run.
    #[arg(long, value_name = "ID", default_value = "cli-run")]
    trigger_id: String,
    /// How long to keep polling for a terminal stage before giving up.
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    poll_timeout_secs: u64,
}

/// Errors this example binary's top-level run may surface.
#[derive(Debug, Error)]
enum CliError {
    /// The config file could not be loaded or failed validation.
    #[error("config error: {0}")]
    Config(#[from] defense_config::ConfigError),
    /// A storage backend could not be opened.
    #[error("storage error: {0}")]
    Storage(String),
    /// `amount` was not a valid decimal.
    #[error("invalid --amount: {0}")]
    InvalidAmount(String),
    /// The submitted project was rejected before admission.
    #[error("engine error: {0}")]
    Engine(String),
    /// The deliberation did not reach a terminal stage before
    /// `poll_timeout_secs` elapsed.
    #[error("deliberation did not finish within the poll timeout")]
    PollTimeout,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "defense-gate run failed");
            ExitCode::FAILURE
        }
    }
}

/// Loads the config, wires the engine, submits the project, and polls it
/// through to a terminal stage.
async fn run(cli: Cli) -> Result<(), CliError> {
    let wiring = DeliberationConfig::load(&cli.config)?.build()?;

    let retrieval = JsonRetrievalProvider::new(JsonRetrievalProviderConfig {
        root: cli.evidence_root.clone(),
        ..JsonRetrievalProviderConfig::default()
    })
    .map_err(|err| CliError::Storage(err.to_string()))?;

    let model = ScriptedModelPort::new(vec![ModelResponse {
        text: "DECISION: approve\nCONFIDENCE: 0.8\n\
               Evidence supports a clear razon de negocios and proportionate materialidad."
            .to_string(),
        tool_calls: Vec::new(),
        prompt_tokens: 192,
        completion_tokens: 64,
    }]);

    let defense_files = FilesystemDefenseFileStore::new(FilesystemDefenseFileStoreConfig {
        root: wiring.defense_file_root.clone(),
    })
    .await
    .map_err(|err| CliError::Storage(err.to_string()))?;

    let states = SqliteDeliberationStateStore::open(&SqliteStateStoreConfig::new(&cli.state_db))
        .map_err(|err| CliError::Storage(err.to_string()))?;
    let usage = SqliteUsageCounterStore::open(&SqliteUsageStoreConfig::new(&cli.usage_db))
        .map_err(|err| CliError::Storage(err.to_string()))?;

    let collaborators = EngineCollaborators {
        retrieval: Arc::new(retrieval),
        model: Arc::new(model),
        clock: Arc::new(SystemClock),
        tools: Arc::new(defense_core::EmptyToolRegistry),
        defense_files: Arc::new(defense_files),
        states: Arc::new(states),
        usage: Arc::new(usage),
        notifier: Arc::new(LogNotifier),
        metrics: Arc::new(NoopOrchestratorMetrics),
        artifacts: Arc::new(defense_broker::FilesystemArtifactStore::new(
            defense_broker::FilesystemArtifactStoreConfig { root: cli.evidence_root.join("_artifacts") },
        )
        .await
        .map_err(|err| CliError::Storage(err.to_string()))?),
    };

    let engine = build_engine(wiring, collaborators);

    let company_id = CompanyId::new(cli.company);
    let project_id = ProjectId::new(cli.project_id);
    let amount =
        BigDecimal::from_str(&cli.amount).map_err(|err| CliError::InvalidAmount(err.to_string()))?;
    let project = Project {
        id: project_id.clone(),
        company_id: company_id.clone(),
        created_by: UserId::new("cli"),
        name: cli.name,
        client_name: cli.client_name,
        description: cli.description,
        amount,
        currency: cli.currency,
        service_type: cli.service_type,
        sponsor_name: cli.sponsor_name,
        sponsor_email: cli.sponsor_email,
        submitted_at: SystemClock.now(),
        supporting_context: Vec::new(),
        metadata: serde_json::Map::new(),
    };
    let tenant = TenantContext::scoped(UserId::new("cli"), company_id.clone());
    let trigger_id = TriggerId::new(cli.trigger_id);

    let outcome =
        engine.start(&tenant, project, trigger_id).await.map_err(|err| CliError::Engine(err.to_string()))?;
    match outcome {
        StartOutcome::Started => tracing::info!("deliberation started"),
        StartOutcome::DuplicateTrigger => tracing::info!("trigger already admitted, resuming poll"),
        StartOutcome::Resumed => tracing::info!("deliberation resumed"),
    }

    poll_until_terminal(&engine, &tenant, &company_id, &project_id, Duration::from_secs(cli.poll_timeout_secs))
        .await
}

/// Polls the engine's status board every 250ms until the run reaches a
/// terminal stage or `timeout` elapses.
async fn poll_until_terminal<R, M, C>(
    engine: &defense_orchestrator::Engine<R, M, C>,
    tenant: &TenantContext,
    company_id: &CompanyId,
    project_id: &ProjectId,
    timeout: Duration,
) -> Result<(), CliError>
where
    R: defense_core::RetrievalPort + 'static,
    M: defense_core::ModelPort + 'static,
    C: defense_core::time::Clock + 'static,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(record) = engine
            .status(tenant, company_id, project_id)
            .await
            .map_err(|err| CliError::Engine(err.to_string()))?
        {
            tracing::info!(stage = %record.stage, status = %record.status, "progress");
            if record.stage.is_terminal() {
                return Ok(());
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(CliError::PollTimeout);
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}
