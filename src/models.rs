use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

// ============ Candidate ============

/// A raw business record discovered by a search adapter.
///
/// Immutable once created; enrichment attaches `EnrichmentSignal`s alongside
/// it rather than mutating fields in place, so the provenance of every value
/// stays queryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// Unique identifier for this discovery (per campaign run).
    pub id: Uuid,
    /// Business name as reported by the directory.
    pub name: String,
    /// Street address, if the directory provided one.
    pub address: Option<String>,
    /// Raw phone number string, unnormalized.
    pub phone: Option<String>,
    /// Website URL, if listed.
    pub website: Option<String>,
    /// Geocoded latitude.
    pub latitude: Option<f64>,
    /// Geocoded longitude.
    pub longitude: Option<f64>,
    /// Directory-provided rating (e.g. 0.0-5.0).
    pub rating: Option<f64>,
    /// Directory-provided review count.
    pub review_count: Option<u32>,
    /// Name of a secondary directory that cross-matched this listing, if any.
    pub directory_match: Option<String>,
    /// Which search adapter produced this candidate.
    pub provenance: String,
}

impl Candidate {
    pub fn new(name: impl Into<String>, provenance: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: None,
            phone: None,
            website: None,
            latitude: None,
            longitude: None,
            rating: None,
            review_count: None,
            directory_match: None,
            provenance: provenance.into(),
        }
    }

    /// Domain portion of the website URL, lowercased, without a `www.` prefix.
    pub fn website_domain(&self) -> Option<String> {
        let raw = self.website.as_deref()?;
        let parsed = url::Url::parse(raw)
            .or_else(|_| url::Url::parse(&format!("https://{}", raw)))
            .ok()?;
        let host = parsed.host_str()?.to_lowercase();
        Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
    }
}

// ============ Enrichment signals ============

/// What kind of evidence a signal carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Email,
    Registry,
    WebsiteContent,
    SocialProfile,
}

/// Which origin produced a signal. Pattern generation is the only origin
/// that is never, by itself, considered verified contact evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    PatternGenerated,
    VerifiedLookupA,
    VerifiedLookupB,
    WebsiteScrape,
    DeliverabilityCheck,
}

/// One typed, sourced, confidence-scored piece of evidence about a candidate.
///
/// Multiple signals of the same type may coexist (several email candidates,
/// say); the pipeline keeps all of them and picks a best-per-type only when
/// a lead is finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentSignal {
    pub signal_type: SignalType,
    pub value: String,
    /// Confidence 0-100.
    pub confidence: u8,
    pub source: SignalSource,
    /// Cost incurred to obtain this signal, in cents.
    pub cost_cents: u64,
    /// True when the signal origin satisfies the verified-source rule:
    /// anything other than uncorroborated pattern generation.
    pub verified: bool,
}

impl EnrichmentSignal {
    pub fn new(
        signal_type: SignalType,
        value: impl Into<String>,
        confidence: u8,
        source: SignalSource,
        cost_cents: u64,
    ) -> Self {
        Self {
            signal_type,
            value: value.into(),
            confidence: confidence.min(100),
            source,
            cost_cents,
            verified: source != SignalSource::PatternGenerated,
        }
    }
}

// ============ Scoring ============

/// Named sub-score dimensions of the final confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMetric {
    Name,
    Address,
    Phone,
    Website,
    Email,
    Registry,
    DirectoryBoost,
    Corroboration,
}

/// One scored metric with the weight that was in force when it was scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub metric: ScoreMetric,
    /// Sub-score 0-100.
    pub score: u8,
    /// Nominal weight before renormalization.
    pub weight: f64,
}

/// A full set of sub-scores produced at scoring time.
///
/// Never mutated after creation; re-scoring a candidate produces a fresh
/// breakdown. The final score is fully determined by the breakdown, so it
/// can be recomputed and audited later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub components: Vec<ScoreComponent>,
    pub scored_at: DateTime<Utc>,
}

impl ScoreBreakdown {
    pub fn new(components: Vec<ScoreComponent>) -> Self {
        Self {
            components,
            scored_at: Utc::now(),
        }
    }

    /// Weighted mean over the metrics that actually have a score, rounded to
    /// the nearest integer. A missing signal contributes zero weight rather
    /// than dragging the average down by its full nominal weight.
    pub fn final_score(&self) -> u8 {
        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for c in &self.components {
            if c.score > 0 {
                weighted_sum += f64::from(c.score) * c.weight;
                weight_sum += c.weight;
            }
        }
        if weight_sum <= 0.0 {
            return 0;
        }
        (weighted_sum / weight_sum).round().clamp(0.0, 100.0) as u8
    }
}

// ============ Qualified leads ============

/// A candidate that passed the qualification gate, frozen with the evidence
/// that qualified it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualifiedLead {
    pub candidate: Candidate,
    /// Best signal per type at qualification time.
    pub best_signals: HashMap<SignalType, EnrichmentSignal>,
    pub breakdown: ScoreBreakdown,
    /// Final confidence 0-100, equal to `breakdown.final_score()`.
    pub confidence: u8,
    /// Total enrichment spend attributed to this lead, in cents.
    pub cost_cents: u64,
    pub qualified_at: DateTime<Utc>,
}

// Identity comparison only; two leads are the same lead iff they came from
// the same discovery.
impl PartialEq for QualifiedLead {
    fn eq(&self, other: &Self) -> bool {
        self.candidate.id == other.candidate.id
    }
}

impl Eq for QualifiedLead {}

/// Fields a caller can require on every qualified lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    Phone,
    Website,
    Email,
}

// ============ Campaign summary ============

/// Per-run skip accounting so a caller can tell "ran out of money" from
/// "ran out of good candidates" from "sources are down".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkipCounts {
    /// Enrichment steps short-circuited by an open breaker.
    pub breaker: u64,
    /// Enrichment steps skipped because the budget could not cover them.
    pub budget: u64,
    /// Candidates discarded below the pre-validation threshold.
    pub low_score: u64,
}

impl SkipCounts {
    pub fn absorb(&mut self, other: &SkipCounts) {
        self.breaker += other.breaker;
        self.budget += other.budget;
        self.low_score += other.low_score;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub total_cost_cents: u64,
    pub candidates_seen: u64,
    pub qualified_count: u64,
    /// qualified / seen, 0.0 when nothing was seen.
    pub qualification_rate: f64,
    pub elapsed: Duration,
    pub variants_used: u32,
    pub skips: SkipCounts,
}

impl CampaignSummary {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "total_cost_cents": self.total_cost_cents,
            "candidates_seen": self.candidates_seen,
            "qualified_count": self.qualified_count,
            "qualification_rate": self.qualification_rate,
            "elapsed_ms": self.elapsed.as_millis() as u64,
            "variants_used": self.variants_used,
            "skipped_open_breaker": self.skips.breaker,
            "skipped_budget": self.skips.budget,
            "skipped_low_score": self.skips.low_score,
        })
    }
}

/// A cost-commit event emitted to the external accounting sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEvent {
    /// Source name the spend went to.
    pub source: String,
    pub amount_cents: u64,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_score_renormalizes_over_present_metrics() {
        let breakdown = ScoreBreakdown::new(vec![
            ScoreComponent {
                metric: ScoreMetric::Name,
                score: 100,
                weight: 0.12,
            },
            ScoreComponent {
                metric: ScoreMetric::Phone,
                score: 100,
                weight: 0.15,
            },
            ScoreComponent {
                metric: ScoreMetric::Email,
                score: 0,
                weight: 0.15,
            },
        ]);
        // Email is absent so it carries zero weight, not a zero score.
        assert_eq!(breakdown.final_score(), 100);
    }

    #[test]
    fn final_score_empty_breakdown_is_zero() {
        let breakdown = ScoreBreakdown::new(vec![]);
        assert_eq!(breakdown.final_score(), 0);
    }

    #[test]
    fn pattern_generated_signals_start_unverified() {
        let s = EnrichmentSignal::new(
            SignalType::Email,
            "info@example.com",
            65,
            SignalSource::PatternGenerated,
            0,
        );
        assert!(!s.verified);

        let s = EnrichmentSignal::new(
            SignalType::Email,
            "info@example.com",
            90,
            SignalSource::VerifiedLookupA,
            25,
        );
        assert!(s.verified);
    }

    #[test]
    fn website_domain_strips_scheme_and_www() {
        let mut c = Candidate::new("Joe's Plumbing", "directory");
        c.website = Some("https://www.JoesPlumbing.com/contact".to_string());
        assert_eq!(c.website_domain().as_deref(), Some("joesplumbing.com"));

        c.website = Some("joesplumbing.com".to_string());
        assert_eq!(c.website_domain().as_deref(), Some("joesplumbing.com"));
    }
}
