//! Context aggregation and generation pipeline for AgencyPulse.
//!
//! Collectors read bounded slices of business state, the assembler merges
//! them into a deterministic [`ContextBundle`], the prompt builder renders a
//! [`GenerationRequest`], the generation client calls the model, and the
//! validator turns raw text into a typed [`OfferDraft`] or [`BriefReport`].
//! The [`ScoringEngine`] is a deterministic sibling that needs no model.

pub mod assembler;
pub mod collectors;
pub mod generation;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod scoring;
pub mod validator;

pub use assembler::{AssembleOptions, BundleCounters, ContextBundle, SourceRequest, assemble};
pub use collectors::{CollectConstraints, ContextSection, SectionStatus, SourceId, collect};
pub use generation::{GenerationClient, HttpGenerationClient, RawText};
pub use output::{BriefReport, BriefSection, LineItem, OfferDraft, StructuredOutput};
pub use pipeline::{OfferRequest, Pipeline, ProgressReporter, SilentProgress};
pub use prompt::{GenerationRequest, ModelParams, TaskKind};
pub use scoring::{Score, ScoreBreakdown, ScoredLead, ScoringEngine, Tier};
