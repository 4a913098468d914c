//! Campaign iteration controller: drives repeated searches across query
//! variants until the target qualified count is met, the budget is
//! exhausted, or the variants run out.
//!
//! All shared mutable state for one run lives in a single
//! `CampaignContext` (cost ledger, breaker registry, lead book,
//! cancellation token) passed explicitly to every component; there is no
//! package-level state.

use crate::circuit_breaker::{BreakerConfig, CircuitBreakerRegistry};
use crate::config::{CampaignSpec, PipelineConfig};
use crate::errors::PipelineError;
use crate::ledger::CostLedger;
use crate::models::{CampaignSummary, Candidate, QualifiedLead, SkipCounts};
use crate::orchestrator::{self, EnrichmentStack};
use crate::prevalidation::prevalidation_score;
use crate::qualification::{GateDecision, LeadBook, QualificationGate};
use crate::scoring::score_candidate;
use crate::sources::{CostSink, LeadSink, SearchAdapter, TracingCostSink};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Controller state machine. Idle is the initial state, Done terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignPhase {
    Idle,
    Searching,
    Enriching,
    Evaluating,
    Done,
}

/// Shared state for one campaign run.
pub struct CampaignContext {
    pub config: PipelineConfig,
    pub ledger: CostLedger,
    pub breakers: CircuitBreakerRegistry,
    pub leads: LeadBook,
    /// Trips the moment the budget hits zero; in-flight workers stop at
    /// their next step boundary and keep whatever signals they have.
    pub cancel: CancellationToken,
}

/// Everything a caller gets back from one campaign run.
#[derive(Debug, Clone)]
pub struct CampaignOutcome {
    pub leads: Vec<QualifiedLead>,
    pub summary: CampaignSummary,
}

pub struct CampaignRunner {
    config: PipelineConfig,
    search: Arc<dyn SearchAdapter>,
    stack: EnrichmentStack,
    cost_sink: Arc<dyn CostSink>,
    lead_sink: Option<Arc<dyn LeadSink>>,
}

impl CampaignRunner {
    pub fn new(
        config: PipelineConfig,
        search: Arc<dyn SearchAdapter>,
        stack: EnrichmentStack,
    ) -> Self {
        Self {
            config,
            search,
            stack,
            cost_sink: Arc::new(TracingCostSink),
            lead_sink: None,
        }
    }

    pub fn with_cost_sink(mut self, sink: Arc<dyn CostSink>) -> Self {
        self.cost_sink = sink;
        self
    }

    pub fn with_lead_sink(mut self, sink: Arc<dyn LeadSink>) -> Self {
        self.lead_sink = Some(sink);
        self
    }

    /// Run one campaign to completion. The only hard failure is an invalid
    /// spec; everything downstream (failed searches, failing sources,
    /// budget exhaustion) resolves into the summary instead.
    pub async fn run(&self, spec: CampaignSpec) -> Result<CampaignOutcome, PipelineError> {
        spec.validate()?;

        let started = Instant::now();
        let min_confidence = spec.min_confidence.unwrap_or(self.config.min_confidence);
        let gate = Arc::new(QualificationGate::new(
            min_confidence,
            spec.required_fields.clone(),
        ));
        let ctx = Arc::new(CampaignContext {
            ledger: CostLedger::new(spec.budget_cents, Some(self.cost_sink.clone())),
            breakers: CircuitBreakerRegistry::new(BreakerConfig {
                failure_threshold: self.config.breaker_failure_threshold,
                rate_limit_trip: self.config.breaker_rate_limit_trip,
                cooldown: self.config.breaker_cooldown,
                rate_limit_cooldown: self.config.breaker_rate_limit_cooldown,
            }),
            leads: LeadBook::new(self.config.phone_region),
            cancel: CancellationToken::new(),
            config: self.config.clone(),
        });

        let mut phase = CampaignPhase::Idle;
        let mut candidates_seen: u64 = 0;
        let mut skips = SkipCounts::default();
        let mut variants_used: u32 = 0;

        let variants = spec.variants();
        tracing::info!(
            query = %spec.query,
            location = %spec.location,
            variants = variants.len(),
            target = spec.target_count,
            budget_cents = spec.budget_cents,
            "Campaign starting"
        );

        for (i, variant) in variants.iter().enumerate() {
            transition(&mut phase, CampaignPhase::Searching);

            // Fixed inter-query delay to respect the search adapter's limits.
            if i > 0 {
                tokio::time::sleep(self.config.inter_query_delay).await;
            }

            variants_used += 1;
            let batch = match self
                .search
                .search(variant, &spec.location, self.config.search_batch_size)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    // A failed variant is zero candidates, not a fatal error.
                    tracing::warn!(variant = %variant, error = %e, "Search failed, skipping variant");
                    Vec::new()
                }
            };
            candidates_seen += batch.len() as u64;
            tracing::info!(variant = %variant, candidates = batch.len(), "Search batch received");

            transition(&mut phase, CampaignPhase::Enriching);
            let batch_skips = self.enrich_batch(&ctx, &gate, batch).await;
            skips.absorb(&batch_skips);

            transition(&mut phase, CampaignPhase::Evaluating);
            let qualified = ctx.leads.len() as u64;
            let remaining = ctx.ledger.remaining_cents();
            if qualified >= spec.target_count {
                tracing::info!(qualified, "Target reached");
                break;
            }
            if remaining < self.config.min_viable_step_cents {
                tracing::info!(remaining, "Budget below minimum viable step, stopping");
                break;
            }
        }

        transition(&mut phase, CampaignPhase::Done);

        let leads = ctx.leads.snapshot();
        let qualified_count = leads.len() as u64;
        let summary = CampaignSummary {
            total_cost_cents: ctx.ledger.spent_cents(),
            candidates_seen,
            qualified_count,
            qualification_rate: if candidates_seen > 0 {
                qualified_count as f64 / candidates_seen as f64
            } else {
                0.0
            },
            elapsed: started.elapsed(),
            variants_used,
            skips,
        };
        tracing::info!(
            qualified = summary.qualified_count,
            seen = summary.candidates_seen,
            cost_cents = summary.total_cost_cents,
            low_score = summary.skips.low_score,
            breaker_skips = summary.skips.breaker,
            budget_skips = summary.skips.budget,
            "Campaign finished"
        );

        if let Some(sink) = &self.lead_sink {
            if let Err(e) = sink.deliver(&leads, &summary).await {
                tracing::warn!(error = %e, "Lead sink delivery failed");
            }
        }

        Ok(CampaignOutcome { leads, summary })
    }

    /// Enrich one batch through a bounded worker pool. Workers share the
    /// run's ledger, breakers, and lead book; the cancellation token trips
    /// as soon as the budget is fully spent.
    async fn enrich_batch(
        &self,
        ctx: &Arc<CampaignContext>,
        gate: &Arc<QualificationGate>,
        batch: Vec<Candidate>,
    ) -> SkipCounts {
        let semaphore = Arc::new(Semaphore::new(self.config.enrichment_concurrency));
        let mut join_set = JoinSet::new();

        for candidate in batch {
            let ctx = ctx.clone();
            let gate = gate.clone();
            let stack = self.stack.clone();
            let semaphore = semaphore.clone();
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("worker semaphore closed");
                process_candidate(&ctx, &stack, &gate, candidate).await
            });
        }

        let mut skips = SkipCounts::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(report) => skips.absorb(&report),
                Err(e) => tracing::error!(error = %e, "Enrichment worker panicked"),
            }
            if ctx.ledger.is_exhausted() && !ctx.cancel.is_cancelled() {
                tracing::info!("Budget exhausted, cancelling in-flight enrichment");
                ctx.cancel.cancel();
            }
        }
        skips
    }
}

/// One worker's path for one candidate: pre-validate, enrich, score, gate,
/// dedup-insert. Returns the skip accounting for the summary.
async fn process_candidate(
    ctx: &CampaignContext,
    stack: &EnrichmentStack,
    gate: &QualificationGate,
    candidate: Candidate,
) -> SkipCounts {
    let mut skips = SkipCounts::default();

    let pre_score = prevalidation_score(&candidate, &ctx.config.prevalidation_points);
    if pre_score < ctx.config.prevalidation_threshold {
        tracing::debug!(
            candidate = %candidate.name,
            pre_score,
            threshold = ctx.config.prevalidation_threshold,
            "Discarded at pre-validation"
        );
        skips.low_score += 1;
        return skips;
    }

    let enriched = orchestrator::enrich_candidate(ctx, stack, candidate).await;
    skips.absorb(&enriched.skips);

    let breakdown = score_candidate(&enriched, &ctx.config.weights);
    match gate.evaluate(&enriched, breakdown) {
        GateDecision::Qualified(lead) => {
            let name = lead.candidate.name.clone();
            let confidence = lead.confidence;
            if ctx.leads.try_insert(*lead) {
                tracing::info!(candidate = %name, confidence, "Lead qualified");
            }
        }
        GateDecision::BelowThreshold {
            confidence,
            threshold,
        } => {
            tracing::debug!(
                candidate = %enriched.candidate.name,
                confidence,
                threshold,
                "Rejected below confidence threshold"
            );
        }
        GateDecision::MissingRequiredField(field) => {
            tracing::debug!(
                candidate = %enriched.candidate.name,
                ?field,
                "Rejected on required field"
            );
        }
    }
    skips
}

fn transition(phase: &mut CampaignPhase, next: CampaignPhase) {
    if *phase != next {
        tracing::debug!(from = ?phase, to = ?next, "Campaign phase transition");
        *phase = next;
    }
}
