//! Multi-source email resolution, cheapest first: free pattern generation,
//! then paid verified lookups in ascending cost order, then a paid
//! deliverability check on the best address found.
//!
//! The one rule that matters downstream: a pattern-generated address with no
//! corroboration is a candidate value, never verified contact evidence.

use crate::models::{Candidate, EnrichmentSignal, SignalSource, SignalType};
use crate::sources::DeliverabilityVerdict;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Pattern-generated addresses are never trusted past this confidence.
pub const PATTERN_CONFIDENCE_CAP: u8 = 65;

/// Confidence assigned to addresses scraped out of website content.
pub const WEBSITE_SCRAPE_CONFIDENCE: u8 = 80;

/// Confidence floor applied to an address a deliverability check bounced.
const UNDELIVERABLE_CONFIDENCE_CAP: u8 = 20;

/// Generic mailbox local parts most small businesses use.
const COMMON_MAILBOXES: &[&str] = &["info", "contact", "hello", "office"];

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // RFC 5322 simplified, same shape the scraper uses.
    RE.get_or_init(|| {
        Regex::new(
            r"[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+",
        )
        .expect("static regex")
    })
}

/// Validate an email address.
///
/// Checks for:
/// - Basic format (via the RFC 5322 simplified regex)
/// - Fake/placeholder patterns (repeated digits like 9999, 1111)
/// - Minimum length
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    let fake_patterns = ["999999", "111111", "000000", "123456789"];
    for pattern in &fake_patterns {
        if email.contains(pattern) {
            tracing::debug!(email, pattern, "Rejected fake-pattern email");
            return false;
        }
    }

    match email_regex().find(email) {
        Some(m) => m.start() == 0 && m.end() == email.len(),
        None => false,
    }
}

/// Lowercased, trimmed form used for dedup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Derive plausible addresses from the candidate's domain and name using
/// common corporate conventions. Free, so it always runs first; every
/// result is tagged pattern-generated and capped at 65 confidence.
pub fn generate_pattern_emails(candidate: &Candidate) -> Vec<EnrichmentSignal> {
    let Some(domain) = candidate.website_domain() else {
        return Vec::new();
    };

    let mut locals: Vec<String> = COMMON_MAILBOXES.iter().map(|s| s.to_string()).collect();

    // First word of the business name doubles as an owner/contact guess for
    // sole-proprietor style listings ("Joe's Plumbing" -> joe@).
    if let Some(first_word) = candidate.name.split_whitespace().next() {
        let cleaned: String = first_word
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        let cleaned = cleaned.trim_end_matches('s').to_string();
        if cleaned.len() >= 3 && !locals.contains(&cleaned) {
            locals.push(cleaned);
        }
    }

    locals
        .into_iter()
        .map(|local| format!("{}@{}", local, domain))
        .filter(|addr| is_valid_email(addr))
        .map(|addr| {
            EnrichmentSignal::new(
                SignalType::Email,
                addr,
                PATTERN_CONFIDENCE_CAP,
                SignalSource::PatternGenerated,
                0,
            )
        })
        .collect()
}

/// Pull addresses out of fetched website content. These count as verified:
/// the business published them itself.
pub fn scrape_emails_from_content(content: &str) -> Vec<EnrichmentSignal> {
    let mut seen = std::collections::HashSet::new();
    email_regex()
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .filter(|addr| is_valid_email(addr))
        .filter(|addr| seen.insert(normalize_email(addr)))
        .take(5)
        .map(|addr| {
            EnrichmentSignal::new(
                SignalType::Email,
                addr,
                WEBSITE_SCRAPE_CONFIDENCE,
                SignalSource::WebsiteScrape,
                0,
            )
        })
        .collect()
}

/// Deduplicate email signals by normalized address, keeping the most
/// verified, highest-confidence signal per address. Non-email signals pass
/// through untouched. Output order is fixed (best first, ties by address)
/// so downstream choices are reproducible across runs.
pub fn dedup_email_signals(signals: Vec<EnrichmentSignal>) -> Vec<EnrichmentSignal> {
    let mut best: HashMap<String, EnrichmentSignal> = HashMap::new();
    let mut out = Vec::new();

    for signal in signals {
        if signal.signal_type != SignalType::Email {
            out.push(signal);
            continue;
        }
        let key = normalize_email(&signal.value);
        match best.get(&key) {
            Some(existing)
                if (existing.verified, existing.confidence)
                    >= (signal.verified, signal.confidence) => {}
            _ => {
                best.insert(key, signal);
            }
        }
    }

    let mut emails: Vec<EnrichmentSignal> = best.into_values().collect();
    emails.sort_by(|a, b| {
        (b.verified, b.confidence)
            .cmp(&(a.verified, a.confidence))
            .then_with(|| normalize_email(&a.value).cmp(&normalize_email(&b.value)))
    });
    out.extend(emails);
    out
}

/// The email the deliverability check should spend money on: most verified,
/// then most confident, with remaining ties broken by address so the same
/// inputs always pick the same target.
pub fn best_email(signals: &[EnrichmentSignal]) -> Option<&EnrichmentSignal> {
    signals
        .iter()
        .filter(|s| s.signal_type == SignalType::Email)
        .max_by(|a, b| {
            (a.verified, a.confidence)
                .cmp(&(b.verified, b.confidence))
                .then_with(|| normalize_email(&b.value).cmp(&normalize_email(&a.value)))
        })
}

/// Fold a deliverability verdict back into the matching email signal.
///
/// Deliverable: confidence is raised to at least the verdict confidence and
/// the signal becomes verified regardless of origin. Undeliverable: the
/// address is kept as a record but capped low and stripped of verified
/// status, so it can never satisfy an email-required gate.
pub fn apply_deliverability(
    signals: &mut [EnrichmentSignal],
    email: &str,
    verdict: DeliverabilityVerdict,
) {
    let key = normalize_email(email);
    for signal in signals.iter_mut() {
        if signal.signal_type != SignalType::Email || normalize_email(&signal.value) != key {
            continue;
        }
        if verdict.deliverable {
            signal.confidence = signal.confidence.max(verdict.confidence);
            signal.verified = true;
            signal.source = SignalSource::DeliverabilityCheck;
        } else {
            signal.confidence = signal.confidence.min(UNDELIVERABLE_CONFIDENCE_CAP);
            signal.verified = false;
        }
    }
}
