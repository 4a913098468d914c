//! Collaborator interfaces implemented by surrounding, out-of-scope code:
//! directory search adapters, paid enrichment clients, and the cost and
//! persistence sinks. Clients are plain request/response implementations;
//! all retry, backoff, and circuit-breaking policy lives in the pipeline,
//! never inside a client.

use crate::errors::SourceError;
use crate::models::{Candidate, CampaignSummary, CostEvent, EnrichmentSignal, QualifiedLead};
use async_trait::async_trait;

/// Signals returned by one paid call, plus what the source actually billed
/// (which may differ from its nominal cost-per-call).
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub signals: Vec<EnrichmentSignal>,
    pub cost_cents: u64,
}

/// Business directory text search.
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn search(
        &self,
        query: &str,
        location: &str,
        max_results: u32,
    ) -> Result<Vec<Candidate>, SourceError>;
}

/// One paid enrichment source (registry enhancement, verified email lookup).
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Nominal cost used for budget reservation before dispatch.
    fn cost_per_call_cents(&self) -> u64;

    async fn call(&self, candidate: &Candidate) -> Result<SourceResult, SourceError>;
}

/// Website content fetch. Returns the page text used for reachability and
/// email scraping.
#[async_trait]
pub trait WebsiteFetcher: Send + Sync {
    fn name(&self) -> &str;

    fn cost_per_call_cents(&self) -> u64;

    async fn fetch(&self, url: &str) -> Result<String, SourceError>;
}

#[derive(Debug, Clone, Copy)]
pub struct DeliverabilityVerdict {
    pub deliverable: bool,
    /// Confidence 0-100 in the verdict itself.
    pub confidence: u8,
}

/// Paid contact deliverability check.
#[async_trait]
pub trait DeliverabilityChecker: Send + Sync {
    fn name(&self) -> &str;

    fn cost_per_call_cents(&self) -> u64;

    async fn check(&self, email: &str) -> Result<DeliverabilityVerdict, SourceError>;
}

/// Receives one event per committed spend, for external accounting.
pub trait CostSink: Send + Sync {
    fn record(&self, event: &CostEvent);
}

/// Default cost sink: just logs. External accounting hooks in here.
pub struct TracingCostSink;

impl CostSink for TracingCostSink {
    fn record(&self, event: &CostEvent) {
        tracing::info!(
            source = %event.source,
            amount_cents = event.amount_cents,
            "Cost committed"
        );
    }
}

/// Receives the final lead list and summary; storage and report generation
/// happen outside this subsystem.
#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn deliver(
        &self,
        leads: &[QualifiedLead],
        summary: &CampaignSummary,
    ) -> Result<(), SourceError>;
}
