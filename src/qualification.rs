//! The final accept/reject decision plus identity-based dedup.
//!
//! A candidate qualifies iff its final confidence clears the threshold AND
//! every caller-required field is present with verified evidence. The email
//! rule is the strict one: a pattern-generated address with no corroboration
//! is never sufficient contact evidence.

use crate::models::{
    EnrichmentSignal, QualifiedLead, RequiredField, ScoreBreakdown, SignalType,
};
use crate::orchestrator::EnrichedCandidate;
use crate::prevalidation::{has_plausible_website, is_plausible_phone, normalize_phone};
use chrono::Utc;
use phonenumber::country::Id as CountryId;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Why a candidate was rejected, for logging and summary accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Qualified(Box<QualifiedLead>),
    BelowThreshold { confidence: u8, threshold: u8 },
    MissingRequiredField(RequiredField),
}

pub struct QualificationGate {
    pub min_confidence: u8,
    pub required_fields: HashSet<RequiredField>,
}

impl QualificationGate {
    pub fn new(min_confidence: u8, required_fields: HashSet<RequiredField>) -> Self {
        Self {
            min_confidence,
            required_fields,
        }
    }

    fn field_satisfied(&self, field: RequiredField, enriched: &EnrichedCandidate) -> bool {
        match field {
            RequiredField::Phone => enriched
                .candidate
                .phone
                .as_deref()
                .map(is_plausible_phone)
                .unwrap_or(false),
            RequiredField::Website => has_plausible_website(&enriched.candidate),
            // Verified-source rule: at least one email signal corroborated by
            // a paid lookup, scraped content, or a deliverability check.
            RequiredField::Email => enriched
                .signals
                .iter()
                .any(|s| s.signal_type == SignalType::Email && s.verified),
        }
    }

    pub fn evaluate(&self, enriched: &EnrichedCandidate, breakdown: ScoreBreakdown) -> GateDecision {
        let confidence = breakdown.final_score();
        if confidence < self.min_confidence {
            return GateDecision::BelowThreshold {
                confidence,
                threshold: self.min_confidence,
            };
        }

        for field in &self.required_fields {
            if !self.field_satisfied(*field, enriched) {
                tracing::debug!(
                    candidate = %enriched.candidate.name,
                    ?field,
                    "Rejected: missing required field"
                );
                return GateDecision::MissingRequiredField(*field);
            }
        }

        GateDecision::Qualified(Box::new(QualifiedLead {
            candidate: enriched.candidate.clone(),
            best_signals: best_signals_per_type(&enriched.signals),
            confidence,
            cost_cents: enriched.cost_cents,
            breakdown,
            qualified_at: Utc::now(),
        }))
    }
}

/// Best signal per type: most verified, then most confident.
fn best_signals_per_type(
    signals: &[EnrichmentSignal],
) -> HashMap<SignalType, EnrichmentSignal> {
    let mut best: HashMap<SignalType, EnrichmentSignal> = HashMap::new();
    for signal in signals {
        match best.get(&signal.signal_type) {
            Some(existing)
                if (existing.verified, existing.confidence)
                    >= (signal.verified, signal.confidence) => {}
            _ => {
                best.insert(signal.signal_type, signal.clone());
            }
        }
    }
    best
}

/// Lowercased alphanumerics only, so "Joe's Plumbing" and "JOES PLUMBING"
/// collide.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[derive(Default)]
struct LeadBookInner {
    leads: Vec<QualifiedLead>,
    names: HashSet<String>,
    phones: HashSet<String>,
}

/// The accumulated qualified-lead set for one campaign run.
///
/// `try_insert` is an atomic check-then-insert: the identity check (by
/// normalized name or normalized phone) and the append happen under one
/// lock, so concurrent workers finishing at the same moment cannot slip a
/// duplicate past each other.
pub struct LeadBook {
    phone_region: CountryId,
    inner: Mutex<LeadBookInner>,
}

impl LeadBook {
    pub fn new(phone_region: CountryId) -> Self {
        Self {
            phone_region,
            inner: Mutex::new(LeadBookInner::default()),
        }
    }

    /// Append unless an existing lead shares a normalized name or phone.
    /// Returns false when the lead was discarded as a duplicate.
    pub fn try_insert(&self, lead: QualifiedLead) -> bool {
        let name_key = normalize_name(&lead.candidate.name);
        let phone_key = lead
            .candidate
            .phone
            .as_deref()
            .map(|p| normalize_phone(p, self.phone_region))
            .filter(|p| !p.is_empty());

        let mut inner = self.inner.lock().expect("lead book lock poisoned");
        if !name_key.is_empty() && inner.names.contains(&name_key) {
            tracing::debug!(name = %lead.candidate.name, "Duplicate lead by name, discarded");
            return false;
        }
        if let Some(ref p) = phone_key {
            if inner.phones.contains(p) {
                tracing::debug!(name = %lead.candidate.name, "Duplicate lead by phone, discarded");
                return false;
            }
        }

        if !name_key.is_empty() {
            inner.names.insert(name_key);
        }
        if let Some(p) = phone_key {
            inner.phones.insert(p);
        }
        inner.leads.push(lead);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lead book lock poisoned").leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<QualifiedLead> {
        self.inner
            .lock()
            .expect("lead book lock poisoned")
            .leads
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, ScoreComponent, ScoreMetric, SignalSource, SkipCounts};

    fn lead_named(name: &str, phone: Option<&str>) -> QualifiedLead {
        let mut c = Candidate::new(name, "directory");
        c.phone = phone.map(|p| p.to_string());
        QualifiedLead {
            candidate: c,
            best_signals: HashMap::new(),
            breakdown: ScoreBreakdown::new(vec![]),
            confidence: 85,
            cost_cents: 40,
            qualified_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_name_discarded() {
        let book = LeadBook::new(CountryId::US);
        assert!(book.try_insert(lead_named("Joe's Plumbing", Some("619-555-0100"))));
        assert!(!book.try_insert(lead_named("JOES PLUMBING", Some("619-555-0199"))));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn duplicate_phone_discarded() {
        let book = LeadBook::new(CountryId::US);
        assert!(book.try_insert(lead_named("Joe's Plumbing", Some("(619) 555-0100"))));
        assert!(!book.try_insert(lead_named("Harbor Plumbing", Some("619-555-0100"))));
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn distinct_leads_kept() {
        let book = LeadBook::new(CountryId::US);
        assert!(book.try_insert(lead_named("Joe's Plumbing", Some("619-555-0100"))));
        assert!(book.try_insert(lead_named("Harbor Electric", Some("619-555-0142"))));
        assert_eq!(book.len(), 2);
    }

    fn gate_fixture(min_confidence: u8, fields: &[RequiredField]) -> QualificationGate {
        QualificationGate::new(min_confidence, fields.iter().copied().collect())
    }

    fn enriched_with_email(verified: bool) -> EnrichedCandidate {
        let mut c = Candidate::new("Joe's Plumbing", "directory");
        c.address = Some("123 Harbor Dr".to_string());
        c.latitude = Some(32.7);
        c.longitude = Some(-117.1);
        c.phone = Some("619-555-0100".to_string());
        c.website = Some("https://joesplumbing.com".to_string());
        let source = if verified {
            SignalSource::VerifiedLookupA
        } else {
            SignalSource::PatternGenerated
        };
        EnrichedCandidate {
            candidate: c,
            signals: vec![EnrichmentSignal::new(
                SignalType::Email,
                "joe@joesplumbing.com",
                90,
                source,
                0,
            )],
            website_reachable: true,
            cost_cents: 40,
            skips: SkipCounts::default(),
        }
    }

    fn breakdown_scoring(score: u8) -> ScoreBreakdown {
        ScoreBreakdown::new(vec![ScoreComponent {
            metric: ScoreMetric::Name,
            score,
            weight: 1.0,
        }])
    }

    #[test]
    fn verified_email_qualifies() {
        let gate = gate_fixture(
            80,
            &[
                RequiredField::Email,
                RequiredField::Phone,
                RequiredField::Website,
            ],
        );
        let decision = gate.evaluate(&enriched_with_email(true), breakdown_scoring(85));
        assert!(matches!(decision, GateDecision::Qualified(_)));
    }

    #[test]
    fn pattern_only_email_never_qualifies_email_requirement() {
        let gate = gate_fixture(80, &[RequiredField::Email]);
        // Identical candidate and confidence, but the only email signal is
        // pattern-generated with no corroboration.
        let decision = gate.evaluate(&enriched_with_email(false), breakdown_scoring(85));
        assert_eq!(
            decision,
            GateDecision::MissingRequiredField(RequiredField::Email)
        );
    }

    #[test]
    fn below_threshold_rejected() {
        let gate = gate_fixture(80, &[]);
        let decision = gate.evaluate(&enriched_with_email(true), breakdown_scoring(79));
        assert!(matches!(decision, GateDecision::BelowThreshold { .. }));
    }
}
