//! Shared types, error model, and configuration for AgencyPulse.
//!
//! This crate is the foundation depended on by all other AgencyPulse crates.
//! It provides:
//! - [`AgencyPulseError`]: the unified error type
//! - Domain DTOs ([`ClientRecord`], [`OrgProfile`], …) decoded from store records
//! - Configuration ([`AppConfig`], [`PipelineConfig`], [`ScoringConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, ModelConfig, PipelineConfig, RecencyBucket, ScoringConfig,
    SourceLimits, StatusWeights, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_api_key, validate_api_key,
};
pub use error::{AgencyPulseError, ErrorKind, GENERATION_FAILED_MESSAGE, Result};
pub use types::{
    CampaignRecord, ChatLogRecord, ClientRecord, LeadStatus, MeetingRecord, OfferRecord,
    OrgProfile, TaskRecord, collections,
};
