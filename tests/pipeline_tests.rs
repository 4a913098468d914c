//! Unit-level tests for the qualification pipeline pieces: pre-validation
//! scenarios, the verified-email gate rule, and score reproducibility.

use leadqual::config::{PrevalidationPoints, ScoringWeights};
use leadqual::models::{
    Candidate, EnrichmentSignal, RequiredField, SignalSource, SignalType, SkipCounts,
};
use leadqual::orchestrator::EnrichedCandidate;
use leadqual::prevalidation::prevalidation_score;
use leadqual::qualification::{GateDecision, QualificationGate};
use leadqual::scoring::score_candidate;

fn complete_candidate() -> Candidate {
    let mut c = Candidate::new("Joe's Plumbing", "directory");
    c.address = Some("123 Harbor Dr, San Diego, CA 92101".to_string());
    c.latitude = Some(32.7157);
    c.longitude = Some(-117.1611);
    c.phone = Some("619-555-0100".to_string());
    c.website = Some("https://joesplumbing.com".to_string());
    c
}

fn enriched(candidate: Candidate, signals: Vec<EnrichmentSignal>) -> EnrichedCandidate {
    EnrichedCandidate {
        candidate,
        signals,
        website_reachable: true,
        cost_cents: 40,
        skips: SkipCounts::default(),
    }
}

mod prevalidation_scenarios {
    use super::*;

    #[test]
    fn complete_candidate_proceeds_to_enrichment() {
        // Valid phone format, complete address with coordinates, website.
        let score = prevalidation_score(&complete_candidate(), &PrevalidationPoints::default());
        assert!(score >= 70, "expected >= 70, got {}", score);
    }

    #[test]
    fn placeholder_candidate_discarded_for_free() {
        let mut c = Candidate::new("Business", "directory");
        c.phone = Some("000-000-0000".to_string());
        let score = prevalidation_score(&c, &PrevalidationPoints::default());
        assert!(score < 70, "expected below threshold, got {}", score);
    }

    #[test]
    fn prevalidation_is_reproducible() {
        let c = complete_candidate();
        let points = PrevalidationPoints::default();
        assert_eq!(
            prevalidation_score(&c, &points),
            prevalidation_score(&c, &points)
        );
    }
}

mod gate_scenarios {
    use super::*;

    fn required_all() -> QualificationGate {
        QualificationGate::new(
            80,
            [
                RequiredField::Email,
                RequiredField::Phone,
                RequiredField::Website,
            ]
            .into_iter()
            .collect(),
        )
    }

    #[test]
    fn verified_email_candidate_qualifies() {
        let e = enriched(
            complete_candidate(),
            vec![EnrichmentSignal::new(
                SignalType::Email,
                "joe@joesplumbing.com",
                90,
                SignalSource::VerifiedLookupA,
                25,
            )],
        );
        let breakdown = score_candidate(&e, &ScoringWeights::default());
        assert!(breakdown.final_score() >= 80);
        let decision = required_all().evaluate(&e, breakdown);
        assert!(matches!(decision, GateDecision::Qualified(_)));
    }

    #[test]
    fn pattern_only_email_rejected_at_any_confidence() {
        // Identical candidate, same confidence range, but the only email is
        // pattern-generated with no corroboration.
        let e = enriched(
            complete_candidate(),
            vec![EnrichmentSignal::new(
                SignalType::Email,
                "joe@joesplumbing.com",
                65,
                SignalSource::PatternGenerated,
                0,
            )],
        );
        // Drop the threshold so confidence is not the reason for rejection.
        let gate = QualificationGate::new(10, [RequiredField::Email].into_iter().collect());
        let breakdown = score_candidate(&e, &ScoringWeights::default());
        let decision = gate.evaluate(&e, breakdown);
        assert_eq!(
            decision,
            GateDecision::MissingRequiredField(RequiredField::Email)
        );
    }

    #[test]
    fn deliverability_corroborated_pattern_email_counts() {
        let mut signal = EnrichmentSignal::new(
            SignalType::Email,
            "joe@joesplumbing.com",
            65,
            SignalSource::PatternGenerated,
            0,
        );
        leadqual::email_discovery::apply_deliverability(
            std::slice::from_mut(&mut signal),
            "joe@joesplumbing.com",
            leadqual::sources::DeliverabilityVerdict {
                deliverable: true,
                confidence: 92,
            },
        );
        let e = enriched(complete_candidate(), vec![signal]);
        let breakdown = score_candidate(&e, &ScoringWeights::default());
        let decision = required_all().evaluate(&e, breakdown);
        assert!(matches!(decision, GateDecision::Qualified(_)));
    }

    #[test]
    fn qualified_lead_confidence_matches_breakdown() {
        let e = enriched(
            complete_candidate(),
            vec![EnrichmentSignal::new(
                SignalType::Email,
                "joe@joesplumbing.com",
                90,
                SignalSource::VerifiedLookupA,
                25,
            )],
        );
        let breakdown = score_candidate(&e, &ScoringWeights::default());
        let expected = breakdown.final_score();
        match required_all().evaluate(&e, breakdown) {
            GateDecision::Qualified(lead) => {
                assert_eq!(lead.confidence, expected);
                assert_eq!(lead.breakdown.final_score(), expected);
                assert_eq!(lead.cost_cents, 40);
            }
            other => panic!("expected qualification, got {:?}", other),
        }
    }
}
