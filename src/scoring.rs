//! Final confidence scoring: weighted aggregation of every validated signal
//! into one 0-100 score, recomputed after enrichment (unlike pre-validation,
//! this sees the full signal set).
//!
//! Weights are renormalized over the metrics that actually scored, so a
//! missing signal contributes zero weight instead of dragging the mean down
//! by its full nominal weight. The numeric weights are tuned defaults, not
//! load-bearing constants.

use crate::config::ScoringWeights;
use crate::models::{
    EnrichmentSignal, ScoreBreakdown, ScoreComponent, ScoreMetric, SignalSource, SignalType,
};
use crate::orchestrator::EnrichedCandidate;
use crate::prevalidation::{is_plausible_phone, is_specific_name};
use std::collections::HashSet;

fn name_score(enriched: &EnrichedCandidate) -> u8 {
    if is_specific_name(&enriched.candidate.name) {
        100
    } else {
        0
    }
}

fn address_score(enriched: &EnrichedCandidate) -> u8 {
    let c = &enriched.candidate;
    let mut score = 0;
    if c.address.as_deref().map(|a| !a.trim().is_empty()).unwrap_or(false) {
        score += 60;
    }
    if c.latitude.is_some() && c.longitude.is_some() {
        score += 40;
    }
    score
}

fn phone_score(enriched: &EnrichedCandidate) -> u8 {
    match enriched.candidate.phone.as_deref() {
        Some(p) if is_plausible_phone(p) => 100,
        Some(_) => 30,
        None => 0,
    }
}

fn website_score(enriched: &EnrichedCandidate) -> u8 {
    if enriched.website_reachable {
        100
    } else if enriched.candidate.website.is_some() {
        50
    } else {
        0
    }
}

fn email_score(signals: &[EnrichmentSignal]) -> u8 {
    signals
        .iter()
        .filter(|s| s.signal_type == SignalType::Email)
        .map(|s| s.confidence)
        .max()
        .unwrap_or(0)
}

fn registry_score(signals: &[EnrichmentSignal]) -> u8 {
    signals
        .iter()
        .filter(|s| s.signal_type == SignalType::Registry)
        .map(|s| s.confidence)
        .max()
        .unwrap_or(0)
}

fn directory_boost_score(enriched: &EnrichedCandidate) -> u8 {
    if enriched.candidate.directory_match.is_some() {
        100
    } else {
        0
    }
}

/// Corroboration grows with the number of distinct signal origins; one
/// origin is weak, four or more max it out.
fn corroboration_score(signals: &[EnrichmentSignal]) -> u8 {
    let distinct: HashSet<SignalSource> = signals.iter().map(|s| s.source).collect();
    (distinct.len() as u32 * 25).min(100) as u8
}

/// Produce a fresh breakdown for an enriched candidate. Deterministic given
/// the same inputs; the final score is recoverable from the breakdown alone
/// via `ScoreBreakdown::final_score`.
pub fn score_candidate(enriched: &EnrichedCandidate, weights: &ScoringWeights) -> ScoreBreakdown {
    let signals = &enriched.signals;
    let components = vec![
        ScoreComponent {
            metric: ScoreMetric::Name,
            score: name_score(enriched),
            weight: weights.name,
        },
        ScoreComponent {
            metric: ScoreMetric::Address,
            score: address_score(enriched),
            weight: weights.address,
        },
        ScoreComponent {
            metric: ScoreMetric::Phone,
            score: phone_score(enriched),
            weight: weights.phone,
        },
        ScoreComponent {
            metric: ScoreMetric::Website,
            score: website_score(enriched),
            weight: weights.website,
        },
        ScoreComponent {
            metric: ScoreMetric::Email,
            score: email_score(signals),
            weight: weights.email,
        },
        ScoreComponent {
            metric: ScoreMetric::Registry,
            score: registry_score(signals),
            weight: weights.registry,
        },
        ScoreComponent {
            metric: ScoreMetric::DirectoryBoost,
            score: directory_boost_score(enriched),
            weight: weights.directory_boost,
        },
        ScoreComponent {
            metric: ScoreMetric::Corroboration,
            score: corroboration_score(signals),
            weight: weights.corroboration,
        },
    ];
    ScoreBreakdown::new(components)
}
