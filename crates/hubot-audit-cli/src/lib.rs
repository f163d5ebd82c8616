//! # Hubot Audit CLI
//!
//! Operator tool for the audit pipeline.
//!
//! This module provides CLI commands for:
//! - Showing the resolved audit configuration and gate state
//! - Pushing a recorded chat message through the adapter-call path
//! - Pushing a recorded HTTP exchange through the `saveLog` path
//!
//! Both send commands accept `--dry-run`, which swaps the search backend for
//! an in-memory recorder and prints the documents that would have been
//! indexed.

use clap::{Parser, Subcommand, ValueEnum};
use hubot_audit_core::{
    build_index_client, AuditPipeline, AuditSettings, ChatMessage, DeliveryHandle,
    ElasticsearchConfig, GateState, HttpEventKind, HttpRequestDescriptor, HttpResponseDescriptor,
    IdentityTags, InMemoryIndexClient, IndexClient, IndexError, IndexRequest, ListenerContext,
    RobotIdentity, SettingsError, StaticRobotIdentity,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Structure
// ============================================================================

/// Hubot audit CLI - inspect and exercise the audit trail
#[derive(Parser, Debug)]
#[command(name = "hubot-audit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and exercise the hubot audit pipeline")]
#[command(
    long_about = "Resolves the audit configuration the bot host would use and runs recorded chat messages or HTTP exchanges through the audit pipeline"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "HUBOT_AUDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Audit endpoint, overriding configuration and environment
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Logging level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the resolved audit configuration and gate state
    Status {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Audit a chat message read from a JSON file
    SendMessage {
        /// File holding the message (`text`, `user`, `room`)
        file: PathBuf,

        /// Adapter name recorded on the entry
        #[arg(long)]
        adapter_name: Option<String>,

        /// Robot name recorded on the entry
        #[arg(long)]
        robot_name: Option<String>,

        /// Record documents in memory instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Audit an HTTP exchange read from a JSON file
    SendHttp {
        /// File holding `{ "request": ..., "response": ... }`
        file: PathBuf,

        /// Treat the exchange as an incoming request
        #[arg(long)]
        incoming: bool,

        /// Instrumentation notification the exchange arrived on
        #[arg(long, default_value = "success")]
        outcome: ExchangeOutcome,

        /// Record documents in memory instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

/// HTTP instrumentation notification kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExchangeOutcome {
    Success,
    Error,
}

impl From<ExchangeOutcome> for HttpEventKind {
    fn from(outcome: ExchangeOutcome) -> Self {
        match outcome {
            ExchangeOutcome::Success => HttpEventKind::Success,
            ExchangeOutcome::Error => HttpEventKind::Error,
        }
    }
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] SettingsError),

    #[error("Index client error: {0}")]
    IndexClient(#[from] IndexError),

    #[error("Invalid input file {path}: {message}")]
    InvalidInput { path: PathBuf, message: String },

    #[error("Logging initialization failed: {message}")]
    Logging { message: String },

    #[error("Output rendering failed: {message}")]
    Output { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Reports
// ============================================================================

/// Resolved audit configuration
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: GateState,
    pub endpoint: Option<String>,
    pub backend_url: Option<String>,
    pub tags: IdentityTags,
    pub blacklisted_hosts: Vec<String>,
    pub ignored_users: Vec<String>,
}

impl StatusReport {
    /// Describe the pipeline built from the given settings
    pub fn new(pipeline: &AuditPipeline, settings: &AuditSettings) -> Self {
        let backend_url = settings.audit_endpoint().and_then(|endpoint| {
            ElasticsearchConfig::from_audit_endpoint(endpoint, settings)
                .ok()
                .map(|config| config.base_url.to_string())
        });

        Self {
            state: pipeline.gate().state(),
            endpoint: pipeline.gate().endpoint().map(str::to_string),
            backend_url,
            tags: pipeline.tags().clone(),
            blacklisted_hosts: pipeline.host_filter().blacklisted_hosts().to_vec(),
            ignored_users: settings.ignored_users(),
        }
    }

    /// Render the report
    pub fn render(&self, format: OutputFormat) -> Result<String, CliError> {
        match format {
            OutputFormat::Json => to_pretty_json(self),
            OutputFormat::Text => {
                let lines = [
                    format!("state:             {}", self.state),
                    format!(
                        "endpoint:          {}",
                        self.endpoint.as_deref().unwrap_or("<none>")
                    ),
                    format!(
                        "backend:           {}",
                        self.backend_url.as_deref().unwrap_or("<none>")
                    ),
                    format!("instance id:       {}", self.tags.instance_id),
                    format!("space id:          {}", self.tags.space_id),
                    format!("group id:          {}", self.tags.group_id),
                    format!("blacklisted hosts: {}", self.blacklisted_hosts.join(", ")),
                    format!("ignored users:     {}", self.ignored_users.join(", ")),
                ];
                Ok(lines.join("\n"))
            }
        }
    }
}

/// Result of pushing one event through the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    /// Pipeline outcome label
    pub outcome: String,

    /// Delivery status, when a document was submitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<String>,

    /// Documents captured by a dry run
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<IndexRequest>,
}

/// Recorded HTTP exchange
#[derive(Debug, Clone, Deserialize)]
pub struct HttpExchangeFile {
    pub request: HttpRequestDescriptor,

    #[serde(default)]
    pub response: HttpResponseDescriptor,
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let output = execute(&cli).await?;
    println!("{}", output);
    Ok(())
}

/// Run a parsed command and return its rendered output
pub async fn execute(cli: &Cli) -> Result<String, CliError> {
    let settings = load_settings(cli)?;

    match &cli.command {
        Commands::Status { format } => execute_status_command(&settings, *format),
        Commands::SendMessage {
            file,
            adapter_name,
            robot_name,
            dry_run,
        } => {
            let mut robot = StaticRobotIdentity::new();
            if let Some(name) = adapter_name {
                robot = robot.with_adapter_name(name.clone());
            }
            if let Some(name) = robot_name {
                robot = robot.with_robot_name(name.clone());
            }

            let report =
                execute_send_message_command(&settings, file, Arc::new(robot), *dry_run).await?;
            to_pretty_json(&report)
        }
        Commands::SendHttp {
            file,
            incoming,
            outcome,
            dry_run,
        } => {
            let report = execute_send_http_command(
                &settings,
                file,
                *incoming,
                HttpEventKind::from(*outcome),
                *dry_run,
            )
            .await?;
            to_pretty_json(&report)
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Initialize logging based on CLI arguments
///
/// `RUST_LOG` takes precedence over `--log-level`. Logs go to stderr so
/// command output on stdout stays machine-readable.
pub fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .map_err(|e| CliError::Logging {
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::Logging {
        message: e.to_string(),
    })
}

/// Load settings and apply command-line overrides
pub fn load_settings(cli: &Cli) -> Result<AuditSettings, CliError> {
    let mut settings = AuditSettings::load(cli.config.as_deref())?;

    if let Some(endpoint) = &cli.endpoint {
        debug!(endpoint = %endpoint, "Overriding audit endpoint from command line");
        settings.audit_endpoint = Some(endpoint.clone());
    }

    Ok(settings)
}

/// Execute status command
pub fn execute_status_command(
    settings: &AuditSettings,
    format: OutputFormat,
) -> Result<String, CliError> {
    info!(format = ?format, "Resolving audit status");

    let pipeline = AuditPipeline::from_settings(settings, None).build();
    StatusReport::new(&pipeline, settings).render(format)
}

/// Execute send-message command
pub async fn execute_send_message_command(
    settings: &AuditSettings,
    file: &Path,
    robot: Arc<dyn RobotIdentity>,
    dry_run: bool,
) -> Result<DeliveryReport, CliError> {
    let message: ChatMessage = read_json(file).await?;
    info!(file = %file.display(), dry_run, "Auditing chat message");

    let (pipeline, recorder) = build_pipeline(settings, Some(robot), dry_run)?;
    pipeline.announce_gate_state();

    let context = ListenerContext::from(message);
    let outcome = pipeline.record_adapter_call(&context, || debug!("Message handed on"));
    let label = outcome.label();

    Ok(finish(label, outcome.into_delivery(), recorder).await)
}

/// Execute send-http command
pub async fn execute_send_http_command(
    settings: &AuditSettings,
    file: &Path,
    incoming: bool,
    kind: HttpEventKind,
    dry_run: bool,
) -> Result<DeliveryReport, CliError> {
    let exchange: HttpExchangeFile = read_json(file).await?;
    info!(file = %file.display(), incoming, kind = %kind, dry_run, "Auditing HTTP exchange");

    let (pipeline, recorder) = build_pipeline(settings, None, dry_run)?;
    pipeline.announce_gate_state();

    let outcome = pipeline.save_log(&exchange.request, &exchange.response, incoming, kind);
    let label = outcome.label();

    Ok(finish(label, outcome.into_delivery(), recorder).await)
}

fn build_pipeline(
    settings: &AuditSettings,
    robot: Option<Arc<dyn RobotIdentity>>,
    dry_run: bool,
) -> Result<(AuditPipeline, Option<InMemoryIndexClient>), CliError> {
    let recorder = dry_run.then(InMemoryIndexClient::new);
    let client: Option<Arc<dyn IndexClient>> = match &recorder {
        Some(memory) => Some(Arc::new(memory.clone())),
        None => build_index_client(settings)?,
    };

    let mut builder = AuditPipeline::from_settings(settings, client);
    if let Some(robot) = robot {
        builder = builder.robot(robot);
    }
    Ok((builder.build(), recorder))
}

async fn finish(
    outcome: &str,
    delivery: Option<DeliveryHandle>,
    recorder: Option<InMemoryIndexClient>,
) -> DeliveryReport {
    let delivery = match delivery {
        Some(handle) => Some(handle.wait().await.as_str().to_string()),
        None => None,
    };

    DeliveryReport {
        outcome: outcome.to_string(),
        delivery,
        documents: recorder.map(|r| r.requests()).unwrap_or_default(),
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let contents = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&contents).map_err(|e| CliError::InvalidInput {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Output {
        message: e.to_string(),
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
