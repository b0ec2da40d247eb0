//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use agencypulse_core::{
    HttpGenerationClient, OfferDraft, OfferRequest, Pipeline, ProgressReporter, ScoredLead,
    ScoringEngine,
};
use agencypulse_http::AppState;
use agencypulse_shared::{
    AgencyPulseError, AppConfig, ClientRecord, collections, init_config, load_config,
    load_config_from, resolve_api_key, validate_api_key,
};
use agencypulse_storage::{RecordStore, Storage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// AgencyPulse: business context in, grounded drafts out.
#[derive(Parser)]
#[command(
    name = "agencypulse",
    version,
    about = "Generate offers, daily briefs and lead scores from your agency's own data.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.agencypulse/agencypulse.toml).
    #[arg(long, global = true, env = "AGENCYPULSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Record store path (overrides `defaults.database_path`).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Serve the pipeline HTTP API.
    Serve {
        /// Listen address (overrides `defaults.bind_addr`).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Draft an offer for a client request.
    Offer {
        /// The client's request, in their words.
        request: String,

        /// Client company name.
        #[arg(long)]
        company: Option<String>,

        /// Scope client and offer history to this client id.
        #[arg(long)]
        client_id: Option<String>,

        /// Print the draft as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Write today's business brief.
    Pulse,

    /// Score and rank CRM leads.
    Score {
        /// Maximum number of clients to read.
        #[arg(long, default_value = "100")]
        limit: usize,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Import records from a JSON file shaped `{"<collection>": [ {...}, ... ]}`.
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "agencypulse=info",
        1 => "agencypulse=debug,tower_http=debug",
        _ => "agencypulse=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        config_path: cli.config,
        db: cli.db,
    };
    match cli.command {
        Command::Serve { bind } => cmd_serve(&ctx, bind.as_deref()).await,
        Command::Offer {
            request,
            company,
            client_id,
            json,
        } => {
            let request = OfferRequest {
                client_request: request,
                company_name: company,
                client_id,
            };
            cmd_offer(&ctx, &request, json).await
        }
        Command::Pulse => cmd_pulse(&ctx).await,
        Command::Score { limit, json } => cmd_score(&ctx, limit, json).await,
        Command::Import { file } => cmd_import(&ctx, &file).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(&ctx).await,
        },
    }
}

/// Global flags shared by every command.
struct Context {
    config_path: Option<PathBuf>,
    db: Option<PathBuf>,
}

impl Context {
    fn config(&self) -> Result<AppConfig> {
        let config = match &self.config_path {
            Some(path) => load_config_from(path)?,
            None => load_config()?,
        };
        Ok(config)
    }

    async fn storage(&self, config: &AppConfig) -> Result<Storage> {
        let path = match &self.db {
            Some(path) => path.clone(),
            None => config.defaults.database_path()?,
        };
        debug!(path = %path.display(), "opening record store");
        Ok(Storage::open(&path).await?)
    }

    /// Wire store, model client and pipeline from configuration.
    async fn pipeline(&self, config: &AppConfig) -> Result<Pipeline> {
        let api_key = resolve_api_key(config)?;
        let storage = self.storage(config).await?;
        let client = HttpGenerationClient::new(
            &config.model,
            api_key,
            config.pipeline.generation_timeout(),
        )?;
        let pipeline = Pipeline::new(
            Arc::new(storage),
            Arc::new(client),
            config.pipeline.clone(),
            config.model.clone(),
        )?;
        Ok(pipeline)
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(ctx: &Context, bind: Option<&str>) -> Result<()> {
    // Validate API key before binding anything
    let config = ctx.config()?;
    validate_api_key(&config)?;
    let bind = bind.unwrap_or(&config.defaults.bind_addr);
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| eyre!("invalid bind address '{bind}': {e}"))?;

    let pipeline = ctx.pipeline(&config).await?;
    info!(%addr, endpoint = %config.model.endpoint, "starting pipeline API");
    println!("AgencyPulse API listening on http://{addr}");
    agencypulse_http::serve(AppState::new(pipeline), addr).await?;
    Ok(())
}

async fn cmd_offer(ctx: &Context, request: &OfferRequest, json: bool) -> Result<()> {
    let config = ctx.config()?;
    let pipeline = ctx.pipeline(&config).await?;

    let reporter = CliProgress::new();
    let result = pipeline.generate_offer(request, &reporter).await;
    reporter.finish();
    let draft = result.map_err(|e| eyre!("{}: {e}", e.user_message()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
    } else {
        print_offer(&draft);
    }
    Ok(())
}

fn print_offer(draft: &OfferDraft) {
    println!();
    println!("  {}", draft.title);
    println!();
    for item in &draft.line_items {
        println!("  {:<32} {:>10.2}", item.name, item.price);
        println!("      {}", item.description);
    }
    println!("  {:<32} {:>10.2}", "Total", draft.total());
    println!();
    if !draft.notes.trim().is_empty() {
        println!("  Notes:    {}", draft.notes);
    }
    if !draft.internal_strategy.trim().is_empty() {
        println!("  Internal: {}", draft.internal_strategy);
    }
    println!();
}

async fn cmd_pulse(ctx: &Context) -> Result<()> {
    let config = ctx.config()?;
    let pipeline = ctx.pipeline(&config).await?;

    let reporter = CliProgress::new();
    let result = pipeline.smart_pulse(&reporter).await;
    reporter.finish();
    let report = result.map_err(|e| eyre!("{}: {e}", e.user_message()))?;

    println!("{}", report.to_report_text());
    Ok(())
}

async fn cmd_score(ctx: &Context, limit: usize, json: bool) -> Result<()> {
    let config = ctx.config()?;
    let storage = ctx.storage(&config).await?;

    let records = storage.query(collections::CLIENTS, &[], limit).await?;
    let mut leads = Vec::with_capacity(records.len());
    for record in records {
        match record.decode::<ClientRecord>() {
            Ok(mut lead) => {
                lead.id = record.id.clone();
                if lead.created_at.is_none() {
                    lead.created_at = Some(record.created_at);
                }
                leads.push(lead);
            }
            Err(e) => debug!(id = %record.id, error = %e, "skipping undecodable client"),
        }
    }

    let engine = ScoringEngine::new(config.scoring.clone());
    let ranked = engine.rank_leads(&leads, chrono::Utc::now());
    info!(leads = ranked.len(), "leads scored");

    if json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
    } else {
        print_ranking(&ranked);
    }
    Ok(())
}

fn print_ranking(ranked: &[ScoredLead]) {
    if ranked.is_empty() {
        println!("No clients in the record store.");
        return;
    }
    println!();
    println!(
        "  {:>5}  {:<5}  {:<28} {:>6} {:>7} {:>6} {:>4}",
        "SCORE", "TIER", "NAME", "status", "service", "source", "age"
    );
    for lead in ranked {
        let b = lead.score.breakdown;
        println!(
            "  {:>5}  {:<5}  {:<28} {:>6} {:>7} {:>6} {:>4}",
            lead.score.total,
            lead.score.tier.as_str(),
            lead.name, b.status, b.service, b.source, b.age
        );
    }
    println!();
}

async fn cmd_import(ctx: &Context, file: &Path) -> Result<()> {
    let config = ctx.config()?;
    let content = std::fs::read_to_string(file).map_err(|e| AgencyPulseError::io(file, e))?;
    let doc: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| eyre!("invalid JSON in '{}': {e}", file.display()))?;

    let storage = ctx.storage(&config).await?;
    let imported = storage.import_json(&doc).await?;
    info!(file = %file.display(), imported, "import complete");
    println!("Imported {imported} records from {}", file.display());

    if let Some(collections) = doc.as_object() {
        for collection in collections.keys() {
            let total = storage.count(collection).await?;
            println!("  {collection:<16} {total:>6} in store");
        }
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(ctx: &Context) -> Result<()> {
    let config = ctx.config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("valid template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }
}
