//! # Lead Relay CLI
//!
//! Operator command-line interface for Lead Relay.
//!
//! This module provides CLI commands for:
//! - Signing bodies and verifying webhook signatures
//! - Previewing how a lead maps onto a contact
//! - Processing a lead into the filesystem contact store
//! - Validating lead settings files
//! - Graph page subscription and token management

use clap::{Parser, Subcommand};
use graph_api_client::{AccessToken, ApiError, AppCredentials, GraphClient, GraphClientConfig};
use lead_relay_core::{
    adapters::{FilesystemContactStore, GraphLeadFetcher},
    pipeline::LeadPreview,
    signature::{check_signature, sign, SignatureAlgorithm, SignatureFailure},
    ContactField, FieldMapper, FieldNormalizer, LeadError, LeadFetcher, LeadId, LeadOutcome,
    LeadPipeline, LeadSettings, PageId, RawLeadPayload, SecretString, StoreError,
    TracingDiagnosticLog,
};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Path argument meaning standard input
pub const STDIN_PATH: &str = "-";

// ============================================================================
// CLI Structure
// ============================================================================

/// Lead Relay CLI - Facebook Lead Ads to contact store relay
#[derive(Parser)]
#[command(name = "lead-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operator tools for the Lead Relay service")]
#[command(
    long_about = "Lead Relay turns Facebook Lead Ads submissions into contacts. These tools sign and verify webhook bodies, preview lead mapping, process leads and manage Graph page subscriptions."
)]
pub struct Cli {
    /// Lead settings file (YAML, JSON or TOML); a service config with a
    /// `leads` section is accepted as well
    #[arg(short, long, env = "LEAD_RELAY_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Graph API base URL
    #[arg(
        long,
        env = "LEAD_RELAY_GRAPH_URL",
        default_value = "https://graph.facebook.com",
        global = true
    )]
    pub graph_url: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print the X-Hub-Signature header value for a body
    Sign {
        /// Body file, `-` for stdin
        #[arg(default_value = STDIN_PATH)]
        body: PathBuf,

        /// Signing secret; defaults to the settings' app secret
        #[arg(long, env = "LEAD_RELAY_APP_SECRET", hide_env_values = true)]
        secret: Option<String>,

        /// Digest algorithm
        #[arg(short, long, default_value = "sha256")]
        algorithm: AlgorithmArg,
    },

    /// Check a signature header against a body
    Verify {
        /// Body file, `-` for stdin
        #[arg(default_value = STDIN_PATH)]
        body: PathBuf,

        /// Header value, e.g. `sha256=ab12...`
        #[arg(long)]
        signature: String,

        /// Signing secret; defaults to the settings' app secret
        #[arg(long, env = "LEAD_RELAY_APP_SECRET", hide_env_values = true)]
        secret: Option<String>,
    },

    /// Normalize and map a lead without writing anything
    Preview {
        /// Lead object file, `-` for stdin
        #[arg(default_value = STDIN_PATH)]
        lead: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Process a lead into the filesystem contact store
    Process {
        /// Lead object file, `-` for stdin
        #[arg(conflicts_with = "leadgen_id")]
        lead: Option<PathBuf>,

        /// Fetch the lead from Graph instead of reading a file
        #[arg(long)]
        leadgen_id: Option<String>,

        /// Page the lead belongs to, selects the page access token
        #[arg(long, requires = "leadgen_id")]
        page_id: Option<String>,

        /// Contact store directory
        #[arg(long, env = "LEAD_RELAY_CONTACTS_PATH", default_value = "./data/contacts")]
        store: PathBuf,
    },

    /// Check a settings file for problems
    ValidateSettings,

    /// Exchange a short-lived user token for a long-lived one
    ExchangeToken {
        /// Short-lived user access token
        #[arg(long, env = "LEAD_RELAY_USER_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// List the pages the user token manages
    Pages {
        /// User access token; defaults to the settings' long-lived token
        #[arg(long, env = "LEAD_RELAY_USER_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Include page access tokens in the output
        #[arg(long)]
        show_tokens: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Subscribe the app to a page's leadgen webhooks
    Subscribe {
        /// Page ID
        page_id: String,

        /// Page access token; defaults to the settings' token for the page
        #[arg(long, env = "LEAD_RELAY_PAGE_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Remove the app's webhook subscription from a page
    Unsubscribe {
        /// Page ID
        page_id: String,

        /// Page access token; defaults to the settings' token for the page
        #[arg(long, env = "LEAD_RELAY_PAGE_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
}

/// Signature digest algorithms
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum AlgorithmArg {
    Sha256,
    Sha1,
}

impl From<AlgorithmArg> for SignatureAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Sha256 => SignatureAlgorithm::Sha256,
            AlgorithmArg::Sha1 => SignatureAlgorithm::Sha1,
        }
    }
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON output
    Json,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lead error: {0}")]
    Lead(#[from] LeadError),

    #[error("Contact store error: {0}")]
    Store(#[from] StoreError),

    #[error("Graph API error: {0}")]
    Graph(#[from] ApiError),

    #[error("Signature verification failed: {0}")]
    SignatureRejected(SignatureFailure),

    #[error("Settings have {count} problem(s)")]
    InvalidSettings { count: usize },

    #[error("Output serialization failed: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::InvalidSettings { .. } => 1,
            Self::InvalidArgument { .. } => 2,
            Self::SignatureRejected(_) => 3,
            Self::Lead(_) | Self::Store(_) => 4,
            Self::Graph(_) => 5,
            Self::Io(_) | Self::Output(_) => 6,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidFormat(#[from] config::ConfigError),

    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },
}

// ============================================================================
// Settings
// ============================================================================

/// Load lead settings from `path`, or defaults when no file is given.
///
/// The file format follows the extension. A document with a top-level
/// `leads` table (the service configuration) is read from that table;
/// otherwise the whole document is the settings.
pub fn load_settings(path: Option<&Path>) -> Result<LeadSettings, ConfigError> {
    let Some(path) = path else {
        return Ok(LeadSettings::default());
    };
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let document = config::Config::builder()
        .add_source(config::File::from(path).required(true))
        .build()?;

    match document.get::<LeadSettings>("leads") {
        Ok(settings) => Ok(settings),
        Err(config::ConfigError::NotFound(_)) => Ok(document.try_deserialize()?),
        Err(e) => Err(e.into()),
    }
}

/// Severity of a settings finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    Error,
    Warning,
}

/// A problem found in lead settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsFinding {
    pub severity: FindingSeverity,
    pub message: String,
}

impl SettingsFinding {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: FindingSeverity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: FindingSeverity::Warning,
            message: message.into(),
        }
    }
}

/// Check settings for values that would make intake fail or behave
/// unexpectedly.
pub fn check_settings(settings: &LeadSettings) -> Vec<SettingsFinding> {
    let mut findings = Vec::new();

    if settings.app_secret.is_empty() && settings.webhook_secret.is_empty() {
        findings.push(SettingsFinding::error(
            "no app_secret or webhook_secret configured; every delivery will be rejected",
        ));
    }
    if !settings.app_secret.is_empty() && settings.verify_token.is_empty() {
        findings.push(SettingsFinding::warning(
            "verify_token is empty; the Graph subscription handshake will fail",
        ));
    }
    if settings.long_lived_token.is_empty()
        && settings.page_tokens.values().all(SecretString::is_empty)
    {
        findings.push(SettingsFinding::warning(
            "no Graph access token configured; webhook leads cannot be fetched",
        ));
    }

    for (source, target) in &settings.mapping.standard {
        let known = target == "email"
            || target == "full_name"
            || ContactField::from_str(target).is_ok();
        if !known {
            findings.push(SettingsFinding::warning(format!(
                "standard mapping '{}' targets unknown contact field '{}'; the value will be dropped",
                source, target
            )));
        }
    }

    findings
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    initialize_logging(&cli);
    execute(cli).await
}

/// Run a parsed command
pub async fn execute(cli: Cli) -> Result<(), CliError> {
    let settings = load_settings(cli.settings.as_deref())?;
    debug!(settings = ?cli.settings, "Settings loaded");

    match cli.command {
        Commands::Sign {
            body,
            secret,
            algorithm,
        } => execute_sign_command(&body, secret, algorithm, &settings),
        Commands::Verify {
            body,
            signature,
            secret,
        } => execute_verify_command(&body, &signature, secret, &settings),
        Commands::Preview { lead, format } => execute_preview_command(&lead, format, &settings),
        Commands::Process {
            lead,
            leadgen_id,
            page_id,
            store,
        } => {
            let source = match (lead, leadgen_id) {
                (_, Some(id)) => LeadSource::Graph {
                    leadgen_id: id,
                    page_id,
                },
                (Some(path), None) => LeadSource::File(path),
                (None, None) => LeadSource::File(PathBuf::from(STDIN_PATH)),
            };
            execute_process_command(source, &store, &cli.graph_url, &settings).await
        }
        Commands::ValidateSettings => execute_validate_settings_command(&settings),
        Commands::ExchangeToken { token } => {
            execute_exchange_token_command(&token, &cli.graph_url, &settings).await
        }
        Commands::Pages {
            token,
            show_tokens,
            format,
        } => execute_pages_command(token, show_tokens, format, &cli.graph_url, &settings).await,
        Commands::Subscribe { page_id, token } => {
            execute_subscription_command(&page_id, token, true, &cli.graph_url, &settings).await
        }
        Commands::Unsubscribe { page_id, token } => {
            execute_subscription_command(&page_id, token, false, &cli.graph_url, &settings).await
        }
    }
}

/// Initialize logging based on CLI arguments
///
/// Logs go to stderr so command output on stdout stays machine readable.
fn initialize_logging(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A subscriber may already be installed when run in-process
    let _ = if cli.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

// ============================================================================
// Command Implementations
// ============================================================================

fn read_input(path: &Path) -> Result<Vec<u8>, CliError> {
    if path.as_os_str() == STDIN_PATH {
        let mut buffer = Vec::new();
        std::io::stdin().read_to_end(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(std::fs::read(path)?)
    }
}

fn resolve_secret(
    explicit: Option<String>,
    configured: &SecretString,
    key: &str,
) -> Result<SecretString, CliError> {
    match explicit.filter(|s| !s.is_empty()) {
        Some(secret) => Ok(SecretString::new(secret)),
        None if !configured.is_empty() => Ok(configured.clone()),
        None => Err(ConfigError::MissingRequired {
            key: key.to_string(),
        }
        .into()),
    }
}

fn graph_client(graph_url: &str) -> Result<GraphClient, CliError> {
    Ok(GraphClient::new(
        GraphClientConfig::default().with_base_url(graph_url),
    )?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Execute sign command
fn execute_sign_command(
    body: &Path,
    secret: Option<String>,
    algorithm: AlgorithmArg,
    settings: &LeadSettings,
) -> Result<(), CliError> {
    let secret = resolve_secret(secret, &settings.app_secret, "app_secret")?;
    let body = read_input(body)?;
    if body.is_empty() {
        return Err(CliError::InvalidArgument {
            arg: "body".to_string(),
            message: "body is empty".to_string(),
        });
    }

    println!(
        "{}",
        sign(&body, secret.expose_secret().as_bytes(), algorithm.into())
    );
    Ok(())
}

/// Execute verify command
fn execute_verify_command(
    body: &Path,
    signature: &str,
    secret: Option<String>,
    settings: &LeadSettings,
) -> Result<(), CliError> {
    let secret = resolve_secret(secret, &settings.app_secret, "app_secret")?;
    let body = read_input(body)?;

    let algorithm = check_signature(&body, Some(signature), secret.expose_secret().as_bytes())
        .map_err(CliError::SignatureRejected)?;

    println!("Signature valid ({})", algorithm.prefix());
    Ok(())
}

/// Execute preview command
fn execute_preview_command(
    lead: &Path,
    format: OutputFormat,
    settings: &LeadSettings,
) -> Result<(), CliError> {
    let raw = RawLeadPayload::parse(&read_input(lead)?)?;

    let normalized = FieldNormalizer::new().normalize(&raw);
    let mapped = FieldMapper::new().map(&normalized, &settings.mapping);
    let preview = LeadPreview { normalized, mapped };

    match format {
        OutputFormat::Json => print_json(&preview),
        OutputFormat::Text => {
            println!("Contact fields:");
            for (field, value) in &preview.mapped.fields {
                println!("  {field}: {value}");
            }
            println!("Metadata:");
            for (key, value) in &preview.mapped.custom {
                println!("  {key}: {value}");
            }
            if !preview.mapped.has_identifier() {
                println!("Warning: no email or phone; this lead would be skipped");
            }
            Ok(())
        }
    }
}

/// Where `process` reads its lead from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadSource {
    File(PathBuf),
    Graph {
        leadgen_id: String,
        page_id: Option<String>,
    },
}

#[derive(Serialize)]
struct ProcessReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    leadgen_id: Option<&'a str>,
    #[serde(flatten)]
    outcome: &'a LeadOutcome,
}

/// Execute process command
async fn execute_process_command(
    source: LeadSource,
    store_path: &Path,
    graph_url: &str,
    settings: &LeadSettings,
) -> Result<(), CliError> {
    let store = Arc::new(FilesystemContactStore::open(store_path.to_path_buf()).await?);
    let fetcher = Arc::new(GraphLeadFetcher::new(graph_client(graph_url)?));
    let pipeline = LeadPipeline::new(
        store,
        fetcher.clone(),
        Arc::new(TracingDiagnosticLog::new()),
    );

    let (leadgen_id, outcome) = match &source {
        LeadSource::File(path) => {
            let raw = RawLeadPayload::parse(&read_input(path)?)?;
            (None, pipeline.process_lead(&raw, settings).await?)
        }
        LeadSource::Graph {
            leadgen_id,
            page_id,
        } => {
            let lead_id = LeadId::new(leadgen_id.as_str()).map_err(|e| {
                CliError::InvalidArgument {
                    arg: "leadgen-id".to_string(),
                    message: e.to_string(),
                }
            })?;
            let page_id = page_id
                .as_deref()
                .map(PageId::new)
                .transpose()
                .map_err(|e| CliError::InvalidArgument {
                    arg: "page-id".to_string(),
                    message: e.to_string(),
                })?;

            let outcome = match fetcher
                .fetch_lead(&lead_id, page_id.as_ref(), settings)
                .await?
            {
                Some(raw) => pipeline.process_lead(&raw, settings).await?,
                None => LeadOutcome::Skipped {
                    reason: lead_relay_core::SkipReason::MissingFieldData,
                },
            };
            (Some(leadgen_id.as_str()), outcome)
        }
    };

    info!(outcome = ?outcome, "Lead processed");
    print_json(&ProcessReport {
        leadgen_id,
        outcome: &outcome,
    })
}

/// Execute validate-settings command
fn execute_validate_settings_command(settings: &LeadSettings) -> Result<(), CliError> {
    let findings = check_settings(settings);

    for finding in &findings {
        let label = match finding.severity {
            FindingSeverity::Error => "error",
            FindingSeverity::Warning => "warning",
        };
        println!("{label}: {}", finding.message);
    }

    let errors = findings
        .iter()
        .filter(|f| f.severity == FindingSeverity::Error)
        .count();
    if errors > 0 {
        return Err(CliError::InvalidSettings { count: errors });
    }

    println!(
        "Settings OK ({} standard mappings, {} custom mappings, {} tags, {} lists)",
        settings.mapping.standard.len(),
        settings.mapping.custom.len(),
        settings.tag_ids.len(),
        settings.list_ids.len()
    );
    Ok(())
}

/// Execute exchange-token command
async fn execute_exchange_token_command(
    token: &str,
    graph_url: &str,
    settings: &LeadSettings,
) -> Result<(), CliError> {
    if settings.app_id.is_empty() {
        return Err(ConfigError::MissingRequired {
            key: "app_id".to_string(),
        }
        .into());
    }
    let app_secret = resolve_secret(None, &settings.app_secret, "app_secret")?;

    let credentials = AppCredentials {
        app_id: settings.app_id.clone(),
        app_secret: AccessToken::new(app_secret.expose_secret()),
    };
    let long_lived = graph_client(graph_url)?
        .exchange_token(&credentials, &AccessToken::new(token))
        .await?;

    println!("{}", long_lived.expose());
    Ok(())
}

#[derive(Serialize)]
struct PageView<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
}

/// Execute pages command
async fn execute_pages_command(
    token: Option<String>,
    show_tokens: bool,
    format: OutputFormat,
    graph_url: &str,
    settings: &LeadSettings,
) -> Result<(), CliError> {
    let token = resolve_secret(token, &settings.long_lived_token, "long_lived_token")?;
    let pages = graph_client(graph_url)?
        .list_pages(&AccessToken::new(token.expose_secret()))
        .await?;

    let views: Vec<PageView<'_>> = pages
        .iter()
        .map(|page| PageView {
            id: &page.id,
            name: &page.name,
            access_token: show_tokens.then_some(page.access_token.as_str()),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&views),
        OutputFormat::Text => {
            for view in &views {
                match view.access_token {
                    Some(token) => println!("{}\t{}\t{}", view.id, view.name, token),
                    None => println!("{}\t{}", view.id, view.name),
                }
            }
            Ok(())
        }
    }
}

/// Execute subscribe and unsubscribe commands
async fn execute_subscription_command(
    page_id: &str,
    token: Option<String>,
    subscribe: bool,
    graph_url: &str,
    settings: &LeadSettings,
) -> Result<(), CliError> {
    let page = PageId::new(page_id).map_err(|e| CliError::InvalidArgument {
        arg: "page_id".to_string(),
        message: e.to_string(),
    })?;
    let configured = settings
        .token_for_page(Some(&page))
        .cloned()
        .unwrap_or_default();
    let token = resolve_secret(token, &configured, "page_tokens")?;
    let token = AccessToken::new(token.expose_secret());

    let client = graph_client(graph_url)?;
    let success = if subscribe {
        client.subscribe_page(page_id, &token).await?
    } else {
        client.unsubscribe_page(page_id, &token).await?
    };

    let action = if subscribe { "subscribe" } else { "unsubscribe" };
    if success {
        println!("Page {page_id}: {action} succeeded");
        Ok(())
    } else {
        Err(CliError::Graph(ApiError::UnexpectedResponse {
            message: format!("Graph reported failure for {action} on page {page_id}"),
        }))
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
