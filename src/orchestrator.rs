//! Sequences paid enrichment steps for one candidate, with every external
//! call going through the same guarded protocol: breaker check -> budget
//! reservation -> timed call -> record result -> commit or release.
//!
//! Step order matters: later steps are more expensive and some depend on
//! earlier output (website content informs email patterns and scraping).

use crate::campaign::CampaignContext;
use crate::circuit_breaker::{FailureKind, Outcome};
use crate::email_discovery;
use crate::errors::SourceError;
use crate::models::{Candidate, EnrichmentSignal, SkipCounts};
use crate::sources::{DeliverabilityChecker, EnrichmentSource, WebsiteFetcher};
use std::future::Future;
use std::sync::Arc;

/// The configured enrichment sources for a campaign. Any slot may be empty;
/// a missing source just means that step is never attempted.
#[derive(Clone, Default)]
pub struct EnrichmentStack {
    /// Location/registry enhancement source.
    pub registry: Option<Arc<dyn EnrichmentSource>>,
    /// Website content fetcher.
    pub website: Option<Arc<dyn WebsiteFetcher>>,
    /// Verified email lookup sources; tried in ascending cost order.
    pub email_lookups: Vec<Arc<dyn EnrichmentSource>>,
    /// Contact deliverability checker.
    pub deliverability: Option<Arc<dyn DeliverabilityChecker>>,
}

/// A candidate with whatever evidence enrichment managed to attach before
/// it finished, was skipped along the way, or was cut off by exhaustion.
#[derive(Debug, Clone)]
pub struct EnrichedCandidate {
    pub candidate: Candidate,
    pub signals: Vec<EnrichmentSignal>,
    /// True once the website fetch succeeded.
    pub website_reachable: bool,
    /// Spend committed for this candidate, in cents.
    pub cost_cents: u64,
    pub skips: SkipCounts,
}

/// How one guarded step ended.
enum StepOutcome<T> {
    /// The call ran and succeeded; `cost_cents` was committed.
    Done { value: T, cost_cents: u64 },
    /// Open breaker; zero cost, zero latency, no attempt recorded.
    SkippedBreaker,
    /// The remaining budget could not cover the estimate.
    SkippedBudget,
    /// The call was attempted and failed; reservation released.
    Failed,
    /// The batch was cancelled before the step could start.
    Cancelled,
}

/// Run one external call under the full guard protocol. The future must
/// resolve to the step value plus the actual billed cost.
async fn guarded_step<T, F>(
    ctx: &CampaignContext,
    source: &str,
    estimate_cents: u64,
    call: F,
) -> StepOutcome<T>
where
    F: Future<Output = Result<(T, u64), SourceError>>,
{
    if ctx.cancel.is_cancelled() {
        return StepOutcome::Cancelled;
    }

    // Breaker first: an open breaker must prevent even the Reserve step so a
    // failing source never holds budget back from working ones.
    if !ctx.breakers.allow(source) {
        tracing::debug!(source, "Step skipped: breaker open");
        return StepOutcome::SkippedBreaker;
    }

    let reservation = match ctx.ledger.reserve(source, estimate_cents) {
        Ok(r) => r,
        Err(_) => {
            tracing::debug!(source, estimate_cents, "Step skipped: budget");
            ctx.breakers.yield_probe(source);
            return StepOutcome::SkippedBudget;
        }
    };

    let result = match tokio::time::timeout(ctx.config.call_timeout, call).await {
        Ok(inner) => inner,
        Err(_) => Err(SourceError::Timeout),
    };

    match result {
        Ok((value, actual_cents)) => {
            ctx.breakers.record(source, Outcome::Success);
            if let Err(e) = ctx.ledger.commit(reservation, actual_cents) {
                tracing::error!(source, error = %e, "Failed to commit reservation");
            }
            StepOutcome::Done {
                value,
                cost_cents: actual_cents,
            }
        }
        Err(e) => {
            let kind = if e.is_rate_limited() {
                FailureKind::RateLimited
            } else {
                FailureKind::Transient
            };
            ctx.breakers.record(source, Outcome::Failure(kind));
            if let Err(e) = ctx.ledger.release(reservation) {
                tracing::error!(source, error = %e, "Failed to release reservation");
            }
            tracing::warn!(source, error = %e, "Enrichment call failed");
            StepOutcome::Failed
        }
    }
}

/// Enrich a single candidate. Skipped steps lower the eventual confidence
/// but never abort the candidate; only full campaign-budget exhaustion (or
/// batch cancellation) cuts enrichment short, and even then the partial
/// signals are kept for scoring.
pub async fn enrich_candidate(
    ctx: &CampaignContext,
    stack: &EnrichmentStack,
    candidate: Candidate,
) -> EnrichedCandidate {
    let mut enriched = EnrichedCandidate {
        candidate,
        signals: Vec::new(),
        website_reachable: false,
        cost_cents: 0,
        skips: SkipCounts::default(),
    };

    // Step 1: location/registry enhancement.
    if let Some(registry) = &stack.registry {
        run_source_step(ctx, registry.as_ref(), &mut enriched).await;
    }
    if aborted(ctx) {
        return enriched;
    }

    // Step 2: website content fetch. Feeds reachability plus scraped
    // addresses into email discovery.
    if let (Some(fetcher), Some(url)) = (&stack.website, enriched.candidate.website.clone()) {
        let outcome = guarded_step(ctx, fetcher.name(), fetcher.cost_per_call_cents(), async {
            let content = fetcher.fetch(&url).await?;
            Ok((content, fetcher.cost_per_call_cents()))
        })
        .await;
        match outcome {
            StepOutcome::Done { value, cost_cents } => {
                enriched.website_reachable = true;
                enriched.cost_cents += cost_cents;
                enriched
                    .signals
                    .extend(email_discovery::scrape_emails_from_content(&value));
            }
            StepOutcome::SkippedBreaker => enriched.skips.breaker += 1,
            StepOutcome::SkippedBudget => enriched.skips.budget += 1,
            StepOutcome::Failed | StepOutcome::Cancelled => {}
        }
    }
    if aborted(ctx) {
        return enriched;
    }

    // Step 3: email discovery. Free patterns first, then paid lookups in
    // ascending cost order.
    enriched
        .signals
        .extend(email_discovery::generate_pattern_emails(&enriched.candidate));

    let mut lookups = stack.email_lookups.clone();
    lookups.sort_by_key(|s| s.cost_per_call_cents());
    for lookup in &lookups {
        run_source_step(ctx, lookup.as_ref(), &mut enriched).await;
        if aborted(ctx) {
            return enriched;
        }
    }

    enriched.signals = email_discovery::dedup_email_signals(std::mem::take(&mut enriched.signals));

    // Step 4: deliverability check on the current best address.
    if let Some(checker) = &stack.deliverability {
        let best = email_discovery::best_email(&enriched.signals).map(|s| s.value.clone());
        if let Some(email) = best {
            let outcome =
                guarded_step(ctx, checker.name(), checker.cost_per_call_cents(), async {
                    let verdict = checker.check(&email).await?;
                    Ok((verdict, checker.cost_per_call_cents()))
                })
                .await;
            match outcome {
                StepOutcome::Done { value, cost_cents } => {
                    enriched.cost_cents += cost_cents;
                    email_discovery::apply_deliverability(&mut enriched.signals, &email, value);
                }
                StepOutcome::SkippedBreaker => enriched.skips.breaker += 1,
                StepOutcome::SkippedBudget => enriched.skips.budget += 1,
                StepOutcome::Failed | StepOutcome::Cancelled => {}
            }
        }
    }

    enriched
}

/// Abort mid-candidate only when the campaign budget is fully exhausted or
/// the batch was cancelled; partial results still get scored.
fn aborted(ctx: &CampaignContext) -> bool {
    ctx.cancel.is_cancelled() || ctx.ledger.is_exhausted()
}

async fn run_source_step(
    ctx: &CampaignContext,
    source: &dyn EnrichmentSource,
    enriched: &mut EnrichedCandidate,
) {
    let candidate = &enriched.candidate;
    let outcome = guarded_step(ctx, source.name(), source.cost_per_call_cents(), async {
        let result = source.call(candidate).await?;
        Ok((result.signals, result.cost_cents))
    })
    .await;

    match outcome {
        StepOutcome::Done { value, cost_cents } => {
            enriched.cost_cents += cost_cents;
            enriched.signals.extend(value);
        }
        StepOutcome::SkippedBreaker => enriched.skips.breaker += 1,
        StepOutcome::SkippedBudget => enriched.skips.budget += 1,
        StepOutcome::Failed | StepOutcome::Cancelled => {}
    }
}
