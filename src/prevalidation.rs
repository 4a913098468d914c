//! Free, enrichment-free candidate scoring: the primary cost-control gate.
//!
//! Everything here is computed from fields already on the candidate; no
//! network calls, fully deterministic. Candidates below the caller's
//! threshold never reach a paid source.

use crate::config::PrevalidationPoints;
use crate::models::Candidate;
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use std::sync::OnceLock;

/// Placeholder business names directories hand back for unclaimed or junk
/// listings.
const GENERIC_NAMES: &[&str] = &[
    "business",
    "company",
    "store",
    "shop",
    "services",
    "service",
    "local business",
    "my business",
    "n/a",
    "none",
    "unknown",
    "test",
    "example",
];

fn repeated_digit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The `regex` crate does not support backreferences (`(\d)\1{5,}`), so
    // spell out the equivalent alternation: any digit repeated six or more
    // times in a row.
    RE.get_or_init(|| {
        Regex::new(r"0{6,}|1{6,}|2{6,}|3{6,}|4{6,}|5{6,}|6{6,}|7{6,}|8{6,}|9{6,}")
            .expect("static regex")
    })
}

/// Does the name look like a real, specific business rather than a
/// placeholder? Empty, too-short, and known-generic names fail.
pub fn is_specific_name(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.len() < 3 {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    !GENERIC_NAMES.contains(&lowered.as_str())
}

/// Heuristic phone plausibility: enough digits, not an obvious placeholder.
///
/// Checks for:
/// - 10-15 digit length after stripping formatting
/// - All-same-digit fakes (000-000-0000 and friends)
/// - Runs of six or more repeated digits
/// - Sequential fakes (1234567890)
pub fn is_plausible_phone(raw: &str) -> bool {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 10 || digits.len() > 15 {
        return false;
    }

    let first = digits.chars().next().unwrap_or('0');
    if digits.chars().all(|c| c == first) {
        return false;
    }
    if repeated_digit_regex().is_match(&digits) {
        return false;
    }
    if digits.contains("1234567890") {
        return false;
    }
    // NANP-style numbers never start a 10-digit local part with 0 or 1.
    if digits.len() == 10 && (digits.starts_with('0') || digits.starts_with('1')) {
        return false;
    }
    true
}

/// Normalize to E.164 when the phonenumber library can parse the value for
/// the configured region; otherwise fall back to the bare digit string so a
/// plausible-but-unparseable number still dedups consistently.
pub fn normalize_phone(raw: &str, region: CountryId) -> String {
    match phonenumber::parse(Some(region), raw) {
        Ok(number) if phonenumber::is_valid(&number) => {
            number.format().mode(Mode::E164).to_string()
        }
        _ => raw.chars().filter(|c| c.is_ascii_digit()).collect(),
    }
}

/// Does the website field hold something that parses as an http(s) URL?
pub fn has_plausible_website(candidate: &Candidate) -> bool {
    candidate.website_domain().is_some()
}

/// Pure pre-validation score, 0-100.
///
/// Each present-and-plausible field earns its fixed point allocation; a
/// candidate with no usable name scores 0 outright (invalid data is a
/// discard, not an error).
pub fn prevalidation_score(candidate: &Candidate, points: &PrevalidationPoints) -> u8 {
    if candidate.name.trim().is_empty() {
        return 0;
    }

    let mut score: u32 = 0;

    if is_specific_name(&candidate.name) {
        score += u32::from(points.name);
    }
    if candidate
        .address
        .as_deref()
        .map(|a| !a.trim().is_empty())
        .unwrap_or(false)
    {
        score += u32::from(points.address);
    }
    if candidate.latitude.is_some() && candidate.longitude.is_some() {
        score += u32::from(points.coordinates);
    }
    if candidate
        .phone
        .as_deref()
        .map(is_plausible_phone)
        .unwrap_or(false)
    {
        score += u32::from(points.phone);
    }
    if has_plausible_website(candidate) {
        score += u32::from(points.website);
    }
    if candidate.directory_match.is_some() {
        score += u32::from(points.directory_match);
    }

    score.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_candidate() -> Candidate {
        let mut c = Candidate::new("Joe's Plumbing", "directory");
        c.address = Some("123 Harbor Dr, San Diego, CA 92101".to_string());
        c.latitude = Some(32.7157);
        c.longitude = Some(-117.1611);
        c.phone = Some("619-555-0100".to_string());
        c.website = Some("https://joesplumbing.com".to_string());
        c
    }

    #[test]
    fn complete_candidate_clears_default_threshold() {
        let points = PrevalidationPoints::default();
        let score = prevalidation_score(&full_candidate(), &points);
        assert!(score >= 70, "expected >= 70, got {}", score);
    }

    #[test]
    fn placeholder_candidate_scores_near_zero() {
        let points = PrevalidationPoints::default();
        let mut c = Candidate::new("Business", "directory");
        c.phone = Some("000-000-0000".to_string());
        let score = prevalidation_score(&c, &points);
        assert!(score < 70, "expected well below 70, got {}", score);
        assert_eq!(score, 0);
    }

    #[test]
    fn missing_name_scores_zero() {
        let points = PrevalidationPoints::default();
        let mut c = full_candidate();
        c.name = "  ".to_string();
        assert_eq!(prevalidation_score(&c, &points), 0);
    }

    #[test]
    fn plausible_phone_accepts_real_formats() {
        assert!(is_plausible_phone("619-555-0100"));
        assert!(is_plausible_phone("(619) 555-0100"));
        assert!(is_plausible_phone("+1 619 555 0100"));
    }

    #[test]
    fn plausible_phone_rejects_placeholders() {
        assert!(!is_plausible_phone("000-000-0000"));
        assert!(!is_plausible_phone("111-111-1111"));
        assert!(!is_plausible_phone("123-456-7890"));
        assert!(!is_plausible_phone("555"));
        assert!(!is_plausible_phone(""));
        assert!(!is_plausible_phone("999999999999"));
    }

    #[test]
    fn generic_names_rejected() {
        assert!(!is_specific_name("Business"));
        assert!(!is_specific_name("test"));
        assert!(!is_specific_name("ab"));
        assert!(is_specific_name("Joe's Plumbing"));
        assert!(is_specific_name("Harbor Electric LLC"));
    }

    #[test]
    fn normalize_phone_prefers_e164() {
        let normalized = normalize_phone("(619) 555-0100", CountryId::US);
        // Whether or not the library validates the fictional 555 exchange,
        // both branches must produce the same digits for dedup.
        let digits: String = normalized.chars().filter(|c| c.is_ascii_digit()).collect();
        assert!(digits.ends_with("6195550100"));
    }
}
