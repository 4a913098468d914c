//! Lead Qualification Pipeline
//!
//! Discovers business leads through pluggable directory search adapters,
//! enriches them with contact data from paid sources, and decides which are
//! worth keeping -- all under a hard per-campaign cost budget. Every paid
//! call is gated by an atomic budget reservation and a per-source circuit
//! breaker, and every accept/reject decision is deterministic and
//! explainable from the stored score breakdown.
//!
//! # Modules
//!
//! - `campaign`: Campaign iteration controller and run context.
//! - `circuit_breaker`: Per-source failure tracking with open/half-open/closed states.
//! - `config`: Pipeline tunables and campaign specs.
//! - `email_discovery`: Multi-source email resolution with source-trust rules.
//! - `errors`: Error handling types.
//! - `ledger`: Budget ledger with reserve/commit/release accounting.
//! - `models`: Core data models (candidates, signals, leads, summaries).
//! - `orchestrator`: Per-candidate enrichment sequencing with guarded calls.
//! - `prevalidation`: Free heuristic scoring gate ahead of any paid call.
//! - `qualification`: Final gate and identity-based deduplication.
//! - `scoring`: Weighted confidence scoring over all signals.
//! - `sources`: Collaborator traits for search adapters, sources, and sinks.

pub mod campaign;
pub mod circuit_breaker;
pub mod config;
pub mod email_discovery;
pub mod errors;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod prevalidation;
pub mod qualification;
pub mod scoring;
pub mod sources;

pub use campaign::{CampaignOutcome, CampaignRunner};
pub use config::{CampaignSpec, PipelineConfig};
pub use errors::{PipelineError, SourceError};
pub use models::{
    CampaignSummary, Candidate, EnrichmentSignal, QualifiedLead, RequiredField, ScoreBreakdown,
    SignalSource, SignalType,
};
pub use orchestrator::EnrichmentStack;
pub use sources::{
    CostSink, DeliverabilityChecker, EnrichmentSource, LeadSink, SearchAdapter, WebsiteFetcher,
};
