//! Application configuration for AgencyPulse.
//!
//! User config lives at `~/.agencypulse/agencypulse.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgencyPulseError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "agencypulse.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".agencypulse";

// ---------------------------------------------------------------------------
// Config structs (matching agencypulse.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Generative-model endpoint settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Timeouts and size bounds for the generation pipeline.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Lead scoring weights and thresholds.
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl AppConfig {
    /// Check every section for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.scoring.validate()?;
        self.model.validate()
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Record store database file. A leading `~/` expands to the home dir.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Address the HTTP surface binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl DefaultsConfig {
    /// Resolved database path with `~/` expanded.
    pub fn database_path(&self) -> Result<PathBuf> {
        expand_home(&self.database_path)
    }
}

fn default_database_path() -> String {
    "~/.agencypulse/agencypulse.db".into()
}
fn default_bind_addr() -> String {
    "127.0.0.1:8080".into()
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Generation endpoint accepting `{prompt, temperature, maxOutputTokens}`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier forwarded to the endpoint, when it serves several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature for offer drafts.
    #[serde(default = "default_offer_temperature")]
    pub offer_temperature: f32,

    /// Sampling temperature for the daily brief.
    #[serde(default = "default_brief_temperature")]
    pub brief_temperature: f32,

    /// Upper bound on generated tokens per call.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: None,
            api_key_env: default_api_key_env(),
            offer_temperature: default_offer_temperature(),
            brief_temperature: default_brief_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

impl ModelConfig {
    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.endpoint).map_err(|e| {
            AgencyPulseError::config(format!("invalid model endpoint '{}': {e}", self.endpoint))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AgencyPulseError::config(format!(
                "model endpoint must be http(s), got '{}'",
                url.scheme()
            )));
        }
        for (name, t) in [
            ("offer_temperature", self.offer_temperature),
            ("brief_temperature", self.brief_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(AgencyPulseError::config(format!(
                    "model.{name} must be within 0.0..=2.0, got {t}"
                )));
            }
        }
        if self.max_output_tokens == 0 {
            return Err(AgencyPulseError::config("model.max_output_tokens must be > 0"));
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8788/v1/generate".into()
}
fn default_api_key_env() -> String {
    "AGENCYPULSE_MODEL_API_KEY".into()
}
fn default_offer_temperature() -> f32 {
    0.7
}
fn default_brief_temperature() -> f32 {
    0.4
}
fn default_max_output_tokens() -> u32 {
    2048
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-collector timeout.
    #[serde(default = "default_collector_timeout_ms")]
    pub collector_timeout_ms: u64,

    /// Deadline for the whole collector fan-out.
    #[serde(default = "default_assembly_deadline_ms")]
    pub assembly_deadline_ms: u64,

    /// Timeout for the single generation call.
    #[serde(default = "default_generation_timeout_ms")]
    pub generation_timeout_ms: u64,

    /// Caller-facing deadline for one pipeline invocation.
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,

    /// Rendered text per context section is cut at this many characters.
    #[serde(default = "default_max_section_chars")]
    pub max_section_chars: usize,

    /// Look-back window for the daily brief's time-bounded sources.
    #[serde(default = "default_brief_window_hours")]
    pub brief_window_hours: u32,

    /// Maximum records fetched per source.
    #[serde(default)]
    pub limits: SourceLimits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collector_timeout_ms: default_collector_timeout_ms(),
            assembly_deadline_ms: default_assembly_deadline_ms(),
            generation_timeout_ms: default_generation_timeout_ms(),
            request_deadline_ms: default_request_deadline_ms(),
            max_section_chars: default_max_section_chars(),
            brief_window_hours: default_brief_window_hours(),
            limits: SourceLimits::default(),
        }
    }
}

impl PipelineConfig {
    pub fn collector_timeout(&self) -> Duration {
        Duration::from_millis(self.collector_timeout_ms)
    }

    pub fn assembly_deadline(&self) -> Duration {
        Duration::from_millis(self.assembly_deadline_ms)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_millis(self.request_deadline_ms)
    }

    /// Timeouts must nest: collector < assembly < request, generation < request.
    pub fn validate(&self) -> Result<()> {
        if self.collector_timeout_ms == 0 {
            return Err(AgencyPulseError::config("pipeline.collector_timeout_ms must be > 0"));
        }
        if self.collector_timeout_ms >= self.assembly_deadline_ms {
            return Err(AgencyPulseError::config(format!(
                "pipeline.collector_timeout_ms ({}) must be less than assembly_deadline_ms ({})",
                self.collector_timeout_ms, self.assembly_deadline_ms
            )));
        }
        if self.assembly_deadline_ms >= self.request_deadline_ms {
            return Err(AgencyPulseError::config(format!(
                "pipeline.assembly_deadline_ms ({}) must be less than request_deadline_ms ({})",
                self.assembly_deadline_ms, self.request_deadline_ms
            )));
        }
        if self.generation_timeout_ms >= self.request_deadline_ms {
            return Err(AgencyPulseError::config(format!(
                "pipeline.generation_timeout_ms ({}) must be less than request_deadline_ms ({})",
                self.generation_timeout_ms, self.request_deadline_ms
            )));
        }
        if self.max_section_chars == 0 {
            return Err(AgencyPulseError::config("pipeline.max_section_chars must be > 0"));
        }
        Ok(())
    }
}

fn default_collector_timeout_ms() -> u64 {
    3_000
}
fn default_assembly_deadline_ms() -> u64 {
    5_000
}
fn default_generation_timeout_ms() -> u64 {
    45_000
}
fn default_request_deadline_ms() -> u64 {
    60_000
}
fn default_max_section_chars() -> usize {
    4_000
}
fn default_brief_window_hours() -> u32 {
    24
}

/// `[pipeline.limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceLimits {
    #[serde(default = "default_clients_limit")]
    pub clients: usize,
    #[serde(default = "default_offers_limit")]
    pub offers: usize,
    #[serde(default = "default_campaigns_limit")]
    pub campaigns: usize,
    #[serde(default = "default_tasks_limit")]
    pub tasks: usize,
    #[serde(default = "default_meetings_limit")]
    pub meetings: usize,
    #[serde(default = "default_chat_logs_limit")]
    pub chat_logs: usize,
}

impl Default for SourceLimits {
    fn default() -> Self {
        Self {
            clients: default_clients_limit(),
            offers: default_offers_limit(),
            campaigns: default_campaigns_limit(),
            tasks: default_tasks_limit(),
            meetings: default_meetings_limit(),
            chat_logs: default_chat_logs_limit(),
        }
    }
}

fn default_clients_limit() -> usize {
    20
}
fn default_offers_limit() -> usize {
    5
}
fn default_campaigns_limit() -> usize {
    20
}
fn default_tasks_limit() -> usize {
    20
}
fn default_meetings_limit() -> usize {
    10
}
fn default_chat_logs_limit() -> usize {
    20
}

// ---------------------------------------------------------------------------
// Scoring config
// ---------------------------------------------------------------------------

/// `[scoring]` section. Business heuristics; change only with product sign-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Minimum total for the `hot` tier.
    #[serde(default = "default_hot_threshold")]
    pub hot_threshold: u32,

    /// Minimum total for the `warm` tier.
    #[serde(default = "default_warm_threshold")]
    pub warm_threshold: u32,

    #[serde(default)]
    pub status_weights: StatusWeights,

    #[serde(default = "default_high_value_services")]
    pub high_value_services: Vec<String>,

    #[serde(default = "default_medium_value_services")]
    pub medium_value_services: Vec<String>,

    #[serde(default = "default_high_value_weight")]
    pub high_value_weight: u32,

    #[serde(default = "default_medium_value_weight")]
    pub medium_value_weight: u32,

    /// Weight for a missing or unlisted service.
    #[serde(default = "default_other_service_weight")]
    pub other_service_weight: u32,

    /// Acquisition channel → weight. Matched case-insensitively.
    #[serde(default = "default_source_weights")]
    pub source_weights: BTreeMap<String, u32>,

    /// Weight for a missing or unlisted source.
    #[serde(default = "default_source_weight")]
    pub default_source_weight: u32,

    /// Recency buckets in ascending `max_age_days` order.
    #[serde(default = "default_recency")]
    pub recency: Vec<RecencyBucket>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hot_threshold: default_hot_threshold(),
            warm_threshold: default_warm_threshold(),
            status_weights: StatusWeights::default(),
            high_value_services: default_high_value_services(),
            medium_value_services: default_medium_value_services(),
            high_value_weight: default_high_value_weight(),
            medium_value_weight: default_medium_value_weight(),
            other_service_weight: default_other_service_weight(),
            source_weights: default_source_weights(),
            default_source_weight: default_source_weight(),
            recency: default_recency(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.warm_threshold >= self.hot_threshold {
            return Err(AgencyPulseError::config(format!(
                "scoring.warm_threshold ({}) must be below hot_threshold ({})",
                self.warm_threshold, self.hot_threshold
            )));
        }
        for pair in self.recency.windows(2) {
            if pair[0].max_age_days >= pair[1].max_age_days {
                return Err(AgencyPulseError::config(
                    "scoring.recency buckets must be in ascending max_age_days order",
                ));
            }
            if pair[0].weight < pair[1].weight {
                return Err(AgencyPulseError::config(
                    "scoring.recency weights must not increase with age",
                ));
            }
        }
        Ok(())
    }
}

/// `[scoring.status_weights]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusWeights {
    #[serde(default = "default_lead_weight")]
    pub lead: u32,
    #[serde(default = "default_prospect_weight")]
    pub prospect: u32,
    #[serde(default)]
    pub client: u32,
    #[serde(default)]
    pub vip: u32,
}

impl Default for StatusWeights {
    fn default() -> Self {
        Self {
            lead: default_lead_weight(),
            prospect: default_prospect_weight(),
            client: 0,
            vip: 0,
        }
    }
}

/// `[[scoring.recency]]` entry: leads no older than `max_age_days` get `weight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecencyBucket {
    pub max_age_days: u32,
    pub weight: u32,
}

fn default_hot_threshold() -> u32 {
    70
}
fn default_warm_threshold() -> u32 {
    40
}
fn default_lead_weight() -> u32 {
    40
}
fn default_prospect_weight() -> u32 {
    25
}
fn default_high_value_services() -> Vec<String> {
    [
        "Web Development",
        "E-commerce",
        "Full-Service Marketing",
        "Branding",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_medium_value_services() -> Vec<String> {
    [
        "SEO",
        "Social Media",
        "PPC",
        "Content Marketing",
        "Email Marketing",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_high_value_weight() -> u32 {
    30
}
fn default_medium_value_weight() -> u32 {
    15
}
fn default_other_service_weight() -> u32 {
    5
}
fn default_source_weights() -> BTreeMap<String, u32> {
    [
        ("Direct", 20),
        ("Referral", 18),
        ("Website", 15),
        ("LinkedIn", 12),
        ("Social", 10),
        ("Event", 10),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}
fn default_source_weight() -> u32 {
    5
}
fn default_recency() -> Vec<RecencyBucket> {
    vec![
        RecencyBucket { max_age_days: 1, weight: 15 },
        RecencyBucket { max_age_days: 7, weight: 12 },
        RecencyBucket { max_age_days: 30, weight: 8 },
        RecencyBucket { max_age_days: 90, weight: 4 },
    ]
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.agencypulse/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AgencyPulseError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.agencypulse/agencypulse.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AgencyPulseError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        AgencyPulseError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AgencyPulseError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AgencyPulseError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AgencyPulseError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the model API key from the env var named in config.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.model.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(AgencyPulseError::config(format!(
            "model API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Check that the model API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    resolve_api_key(config).map(|_| ())
}

fn expand_home(raw: &str) -> Result<PathBuf> {
    match raw.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| AgencyPulseError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(raw)),
    }
}
