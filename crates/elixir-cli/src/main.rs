#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
// crates/elixir-cli/src/main.rs
// ============================================================================
// Module: ElixirTrials CLI Entry Point
// Description: Command dispatcher for triggering pipeline runs, running the
//              outbox consumer loop, applying review actions, and auditing
//              invariants from the terminal.
// Purpose: Give an operator one binary that wires every production
//          collaborator (Postgres-backed repositories, the HTTP LLM gateway,
//          the terminology router, the OMOP mapper, the local document
//          adapter) behind the same trait objects `system-tests` assembles
//          from fakes (spec.md §6).
// Dependencies: clap, elixir-config, elixir-core, elixir-integrity,
//               elixir-outbox, elixir-pipeline, elixir-review,
//               elixir-store-postgres, elixir-terminology, elixir-omop,
//               tokio, tracing, tracing-subscriber.
// ============================================================================

//! ## Overview
//! Every subcommand resolves [`elixir_config::EnvConfig`] from the process
//! environment, builds the primary and OMOP connection pools, and runs
//! migrations once before touching any repository — mirroring
//! `decision-gate-cli`'s `command_serve` posture of resolving configuration
//! before constructing its server.

// ============================================================================
// SECTION: Imports
// ============================================================================

mod document;

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use elixir_config::EnvConfig;
use elixir_config::RoutingTable;
use elixir_core::CriterionId;
use elixir_core::FieldMapping;
use elixir_core::OutboxEvent;
use elixir_core::OutboxEventType;
use elixir_core::OutboxStore;
use elixir_core::Protocol;
use elixir_core::ProtocolId;
use elixir_core::ProtocolRepository;
use elixir_core::ReviewAction;
use elixir_core::ReviewerId;
use elixir_core::VocabSystem;
use elixir_integrity::IntegrityChecker;
use elixir_integrity::IntegrityScope;
use elixir_llm::HttpLlmGateway;
use elixir_omop::PostgresOmopMapper;
use elixir_outbox::Consumer;
use elixir_outbox::HandlerRegistry;
use elixir_pipeline::PipelineConfig;
use elixir_pipeline::PipelineOutboxHandler;
use elixir_pipeline::PipelineRunner;
use elixir_pipeline::ReextractionOutboxHandler;
use elixir_review::ReviewActionRequest;
use elixir_review::ReviewService;
use elixir_review::ReextractionService;
use elixir_store_postgres::PostgresAuditLogRepository;
use elixir_store_postgres::PostgresCheckpointStore;
use elixir_store_postgres::PostgresCriteriaBatchRepository;
use elixir_store_postgres::PostgresCriterionRepository;
use elixir_store_postgres::PostgresEntityRepository;
use elixir_store_postgres::PostgresOutboxStore;
use elixir_store_postgres::PostgresProtocolRepository;
use elixir_store_postgres::PostgresReviewRepository;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::document::LocalFileDocumentFetcher;
use crate::document::PlainTextDocumentParser;

/// Base URLs for the six vocabulary adapters `elixir-terminology` dispatches
/// across (spec.md §4.1). Not exposed as environment overrides; operators
/// needing a non-default endpoint run behind a local proxy at these names.
const VOCAB_BASE_URLS: [(VocabSystem, &str); 6] = [
    (VocabSystem::Umls, "https://uts-ws.nlm.nih.gov/rest"),
    (VocabSystem::Snomed, "https://browser.ihtsdotools.org/snowstorm/snomed-ct"),
    (VocabSystem::Icd10, "https://icd10cmtool.cdc.gov/api"),
    (VocabSystem::RxNorm, "https://rxnav.nlm.nih.gov/REST"),
    (VocabSystem::Loinc, "https://fhir.loinc.org"),
    (VocabSystem::Hpo, "https://hpo.jax.org/api"),
];

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "elixir-trials", arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Uploads a protocol and enqueues its pipeline run.
    Upload(UploadCommand),
    /// Runs the outbox consumer loop until interrupted.
    Consume(ConsumeCommand),
    /// Applies a reviewer action to a criterion.
    Review(ReviewCommand),
    /// Archives the active batch and re-enqueues extraction.
    Reextract(ReextractCommand),
    /// Runs the read-only invariant audit.
    Integrity(IntegrityCommand),
}

/// Arguments for `upload`.
#[derive(Args, Debug)]
struct UploadCommand {
    /// Human-facing protocol title.
    #[arg(long)]
    title: String,
    /// Storage-relative path to the source document (spec.md §6).
    #[arg(long)]
    file_uri: String,
}

/// Arguments for `consume`.
#[derive(Args, Debug)]
struct ConsumeCommand {
    /// Poll interval in seconds.
    #[arg(long, default_value_t = 2)]
    poll_interval_secs: u64,
    /// Number of events claimed per poll.
    #[arg(long, default_value_t = 20)]
    batch_size: u32,
}

/// Arguments for `review`.
#[derive(Args, Debug)]
struct ReviewCommand {
    /// Target criterion id. Exactly one of `--criterion-id`/`--entity-id`
    /// must be given.
    #[arg(long)]
    criterion_id: Option<Uuid>,
    /// Target entity id. Exactly one of `--criterion-id`/`--entity-id` must
    /// be given (spec.md §4.7 step 1: "Load target (Criterion or Entity)").
    #[arg(long)]
    entity_id: Option<Uuid>,
    /// Reviewer account id.
    #[arg(long)]
    reviewer_id: Uuid,
    /// Approve, reject, or modify.
    #[arg(long, value_enum)]
    action: CliReviewAction,
    /// Optional free-text reviewer comment.
    #[arg(long)]
    comment: Option<String>,
    /// Replacement criterion text, for a text-only modify.
    #[arg(long)]
    text: Option<String>,
    /// Replacement field mappings as a JSON array, for a structured modify.
    #[arg(long)]
    structured_fields: Option<String>,
}

/// CLI-facing mirror of [`ReviewAction`], giving clap a [`ValueEnum`] without
/// adding that derive to the domain type itself.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum CliReviewAction {
    /// Accept the target as extracted.
    Approve,
    /// Reject the target.
    Reject,
    /// Edit the target's text or structured fields.
    Modify,
}

impl From<CliReviewAction> for ReviewAction {
    fn from(value: CliReviewAction) -> Self {
        match value {
            CliReviewAction::Approve => Self::Approve,
            CliReviewAction::Reject => Self::Reject,
            CliReviewAction::Modify => Self::Modify,
        }
    }
}

/// Arguments for `reextract`.
#[derive(Args, Debug)]
struct ReextractCommand {
    /// Protocol to re-extract.
    #[arg(long)]
    protocol_id: Uuid,
    /// Operator-supplied reason, recorded on the audit trail.
    #[arg(long)]
    reason: String,
}

/// Arguments for `integrity`.
#[derive(Args, Debug)]
struct IntegrityCommand {
    /// Restrict the audit to one protocol; omit to scan every protocol.
    #[arg(long)]
    protocol_id: Option<Uuid>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper, printed as a single line on failure.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Writes a single line to stdout, routed through `writeln!` rather than
/// `println!` so `clippy::print_stdout` stays denied for the rest of the
/// crate.
fn write_stdout_line(message: &str) -> CliResult<()> {
    writeln!(std::io::stdout(), "{message}").map_err(|error| CliError::new(error.to_string()))
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "command failed");
            ExitCode::FAILURE
        }
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let env = EnvConfig::from_process_env().map_err(|error| CliError::new(error.to_string()))?;

    match cli.command {
        Commands::Upload(command) => command_upload(&env, command).await,
        Commands::Consume(command) => command_consume(&env, command).await,
        Commands::Review(command) => command_review(&env, command).await,
        Commands::Reextract(command) => command_reextract(&env, command).await,
        Commands::Integrity(command) => command_integrity(&env, command).await,
    }
}

// ============================================================================
// SECTION: Collaborator Construction
// ============================================================================

/// Every repository trait object the CLI's subcommands share, built from one
/// primary connection pool.
struct Repositories {
    protocols: Arc<dyn ProtocolRepository>,
    batches: Arc<PostgresCriteriaBatchRepository>,
    criteria: Arc<PostgresCriterionRepository>,
    entities: Arc<PostgresEntityRepository>,
    reviews: Arc<PostgresReviewRepository>,
    audit_logs: Arc<PostgresAuditLogRepository>,
    review_transaction: Arc<elixir_store_postgres::PostgresReviewTransaction>,
    checkpoints: Arc<PostgresCheckpointStore>,
    outbox: Arc<PostgresOutboxStore>,
}

async fn build_repositories(env: &EnvConfig) -> CliResult<Repositories> {
    let pool = elixir_store_postgres::build_pool(&env.database_url, elixir_store_postgres::DEFAULT_POOL_SIZE)
        .map_err(|error| CliError::new(error.to_string()))?;
    elixir_store_postgres::migrate::run_migrations(&pool).await.map_err(|error| CliError::new(error.to_string()))?;

    Ok(Repositories {
        protocols: Arc::new(PostgresProtocolRepository::new(pool.clone())),
        batches: Arc::new(PostgresCriteriaBatchRepository::new(pool.clone())),
        criteria: Arc::new(PostgresCriterionRepository::new(pool.clone())),
        entities: Arc::new(PostgresEntityRepository::new(pool.clone())),
        reviews: Arc::new(PostgresReviewRepository::new(pool.clone())),
        audit_logs: Arc::new(PostgresAuditLogRepository::new(pool.clone())),
        review_transaction: Arc::new(elixir_store_postgres::PostgresReviewTransaction::new(pool.clone())),
        checkpoints: Arc::new(PostgresCheckpointStore::new(pool.clone())),
        outbox: Arc::new(PostgresOutboxStore::new(pool)),
    })
}

/// Builds a runner wired to every production collaborator.
async fn build_runner(env: &EnvConfig, repos: &Repositories) -> CliResult<Arc<PipelineRunner>> {
    let http = reqwest::Client::new();

    let llm = Arc::new(HttpLlmGateway::new(
        http.clone(),
        gemini_endpoint(env),
        env.google_api_key.clone().unwrap_or_default(),
        env.gemini_model_name.clone(),
        "1".to_string(),
    ));

    let mut router = elixir_terminology::Router::new(RoutingTable::default());
    for (system, base_url) in VOCAB_BASE_URLS {
        let api_key = matches!(system, VocabSystem::Umls).then(|| env.umls_api_key.clone()).flatten();
        router.register(Arc::new(elixir_terminology::HttpVocabularyClient::new(system, base_url, api_key)));
    }

    let omop_pool =
        elixir_omop::build_pool(&env.omop_vocab_url, elixir_omop::DEFAULT_POOL_SIZE).map_err(|error| CliError::new(error.to_string()))?;
    let omop = Arc::new(PostgresOmopMapper::new(omop_pool));

    let storage_root = std::path::PathBuf::from(env.local_upload_dir.clone().unwrap_or_else(|| ".".to_string()));

    Ok(Arc::new(PipelineRunner::new(
        Arc::clone(&repos.protocols),
        repos.batches.clone() as Arc<dyn elixir_core::CriteriaBatchRepository>,
        repos.criteria.clone() as Arc<dyn elixir_core::CriterionRepository>,
        repos.entities.clone() as Arc<dyn elixir_core::EntityRepository>,
        repos.audit_logs.clone() as Arc<dyn elixir_core::AuditLogRepository>,
        repos.checkpoints.clone() as Arc<dyn elixir_core::CheckpointStore>,
        llm,
        Arc::new(router),
        omop,
        Arc::new(LocalFileDocumentFetcher::new(storage_root)),
        Arc::new(PlainTextDocumentParser),
        PipelineConfig::default(),
    )))
}

fn gemini_endpoint(env: &EnvConfig) -> String {
    match env.model_backend {
        elixir_config::env::ModelBackend::Gemini => "https://generativelanguage.googleapis.com/v1beta/models:generateContent".to_string(),
        elixir_config::env::ModelBackend::Vertex => {
            let project = env.gcp_project_id.clone().unwrap_or_default();
            let region = env.gcp_region.clone().unwrap_or_default();
            let endpoint = env.vertex_endpoint_id.clone().unwrap_or_default();
            format!("https://{region}-aiplatform.googleapis.com/v1/projects/{project}/locations/{region}/endpoints/{endpoint}:predict")
        }
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

async fn command_upload(env: &EnvConfig, command: UploadCommand) -> CliResult<()> {
    let repos = build_repositories(env).await?;

    let protocol = Protocol::new(command.title, command.file_uri.clone());
    repos.protocols.insert(&protocol).await.map_err(|error| CliError::new(error.to_string()))?;

    let payload = serde_json::json!({ "protocol_id": protocol.id, "file_uri": command.file_uri });
    let event = OutboxEvent::new(OutboxEventType::ProtocolUploaded, payload);
    repos.outbox.publish(&event).await.map_err(|error| CliError::new(error.to_string()))?;

    info!(protocol_id = %protocol.id, "protocol uploaded and enqueued");
    write_stdout_line(&protocol.id.to_string())?;
    Ok(())
}

async fn command_consume(env: &EnvConfig, command: ConsumeCommand) -> CliResult<()> {
    let repos = build_repositories(env).await?;
    let runner = build_runner(env, &repos).await?;

    let reextraction = Arc::new(ReextractionService {
        protocols: Arc::clone(&repos.protocols),
        batches: repos.batches.clone() as Arc<dyn elixir_core::CriteriaBatchRepository>,
        criteria: repos.criteria.clone() as Arc<dyn elixir_core::CriterionRepository>,
        reviews: repos.reviews.clone() as Arc<dyn elixir_core::ReviewRepository>,
        audit_logs: repos.audit_logs.clone() as Arc<dyn elixir_core::AuditLogRepository>,
        checkpoints: repos.checkpoints.clone() as Arc<dyn elixir_core::CheckpointStore>,
        outbox: repos.outbox.clone() as Arc<dyn OutboxStore>,
    });

    let registry = HandlerRegistry::new()
        .with_handler(Arc::new(PipelineOutboxHandler::new(Arc::clone(&runner))))
        .with_handler(Arc::new(ReextractionOutboxHandler::new(runner, reextraction)));
    let consumer = Consumer::new(repos.outbox.clone() as Arc<dyn OutboxStore>, registry)
        .with_schedule(std::time::Duration::from_secs(command.poll_interval_secs), command.batch_size);

    let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    info!("outbox consumer starting");
    consumer.run(shutdown_rx).await.map_err(|error| CliError::new(error.to_string()))
}

async fn command_review(env: &EnvConfig, command: ReviewCommand) -> CliResult<()> {
    let repos = build_repositories(env).await?;
    let service = ReviewService {
        criteria: repos.criteria.clone() as Arc<dyn elixir_core::CriterionRepository>,
        entities: repos.entities.clone() as Arc<dyn elixir_core::EntityRepository>,
        batches: repos.batches.clone() as Arc<dyn elixir_core::CriteriaBatchRepository>,
        transaction: repos.review_transaction.clone() as Arc<dyn elixir_core::ReviewTransaction>,
    };

    let structured_fields = command
        .structured_fields
        .as_deref()
        .map(serde_json::from_str::<Vec<FieldMapping>>)
        .transpose()
        .map_err(|error| CliError::new(format!("invalid --structured-fields JSON: {error}")))?;

    let request = ReviewActionRequest {
        reviewer_id: ReviewerId::from_uuid(command.reviewer_id),
        action: command.action.into(),
        comment: command.comment,
        modified_text: command.text,
        modified_structured_fields: structured_fields,
    };

    let review = match (command.criterion_id, command.entity_id) {
        (Some(criterion_id), None) => {
            service.apply_action(CriterionId::from_uuid(criterion_id), &request).await.map_err(|error| CliError::new(error.to_string()))?
        }
        (None, Some(entity_id)) => service
            .apply_entity_action(elixir_core::EntityId::from_uuid(entity_id), &request)
            .await
            .map_err(|error| CliError::new(error.to_string()))?,
        _ => return Err(CliError::new("exactly one of --criterion-id or --entity-id must be given")),
    };

    let rendered = serde_json::to_string_pretty(&review).map_err(|error| CliError::new(error.to_string()))?;
    write_stdout_line(&rendered)?;
    Ok(())
}

async fn command_reextract(env: &EnvConfig, command: ReextractCommand) -> CliResult<()> {
    let repos = build_repositories(env).await?;
    let service = ReextractionService {
        protocols: Arc::clone(&repos.protocols),
        batches: repos.batches.clone() as Arc<dyn elixir_core::CriteriaBatchRepository>,
        criteria: repos.criteria.clone() as Arc<dyn elixir_core::CriterionRepository>,
        reviews: repos.reviews.clone() as Arc<dyn elixir_core::ReviewRepository>,
        audit_logs: repos.audit_logs.clone() as Arc<dyn elixir_core::AuditLogRepository>,
        checkpoints: repos.checkpoints.clone() as Arc<dyn elixir_core::CheckpointStore>,
        outbox: repos.outbox.clone() as Arc<dyn OutboxStore>,
    };

    service
        .trigger_reextraction(ProtocolId::from_uuid(command.protocol_id), command.reason)
        .await
        .map_err(|error| CliError::new(error.to_string()))?;

    info!(protocol_id = %command.protocol_id, "re-extraction enqueued");
    Ok(())
}

async fn command_integrity(env: &EnvConfig, command: IntegrityCommand) -> CliResult<()> {
    let repos = build_repositories(env).await?;
    let checker = IntegrityChecker::new(
        Arc::clone(&repos.protocols),
        repos.batches.clone() as Arc<dyn elixir_core::CriteriaBatchRepository>,
        repos.criteria.clone() as Arc<dyn elixir_core::CriterionRepository>,
        repos.entities.clone() as Arc<dyn elixir_core::EntityRepository>,
        repos.reviews.clone() as Arc<dyn elixir_core::ReviewRepository>,
        repos.audit_logs.clone() as Arc<dyn elixir_core::AuditLogRepository>,
    );

    let scope = command.protocol_id.map_or(IntegrityScope::All, |id| IntegrityScope::Protocol(ProtocolId::from_uuid(id)));
    let report = checker.check(scope).await.map_err(|error| CliError::new(error.to_string()))?;

    for issue in &report.issues {
        write_stdout_line(&issue.to_string())?;
    }
    if report.is_clean() {
        write_stdout_line("no integrity issues found")?;
    }
    Ok(())
}
