use crate::errors::PipelineError;
use crate::models::RequiredField;
use phonenumber::country::Id as CountryId;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// Nominal weights for the final confidence score (spec-structured, values
/// are tuned defaults, not load-bearing constants).
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringWeights {
    pub name: f64,
    pub address: f64,
    pub phone: f64,
    pub website: f64,
    pub email: f64,
    pub registry: f64,
    pub directory_boost: f64,
    pub corroboration: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            name: 0.12,
            address: 0.12,
            phone: 0.15,
            website: 0.12,
            email: 0.15,
            registry: 0.12,
            directory_boost: 0.10,
            corroboration: 0.07,
        }
    }
}

/// Point allocation for the free pre-validation gate. Sums to 100.
#[derive(Debug, Clone, Deserialize)]
pub struct PrevalidationPoints {
    pub name: u8,
    pub address: u8,
    pub coordinates: u8,
    pub phone: u8,
    pub website: u8,
    pub directory_match: u8,
}

impl Default for PrevalidationPoints {
    fn default() -> Self {
        Self {
            name: 25,
            address: 15,
            coordinates: 10,
            phone: 25,
            website: 15,
            directory_match: 10,
        }
    }
}

/// Pipeline tunables. Everything has a sensible default; `from_env` only
/// overrides what the environment provides.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Candidates below this pre-validation score are discarded before any
    /// paid call.
    pub prevalidation_threshold: u8,
    /// Minimum final confidence for qualification.
    pub min_confidence: u8,
    /// Bounded worker pool size for per-batch enrichment.
    pub enrichment_concurrency: usize,
    /// Fixed delay between search-adapter queries.
    pub inter_query_delay: Duration,
    /// Timeout applied to every external call.
    pub call_timeout: Duration,
    /// Consecutive transient failures before a breaker opens.
    pub breaker_failure_threshold: u32,
    /// Rate-limit failures before a breaker opens (opens faster).
    pub breaker_rate_limit_trip: u32,
    /// Cool-down after a breaker opens on generic failures.
    pub breaker_cooldown: Duration,
    /// Longer cool-down after a breaker opens on rate limiting.
    pub breaker_rate_limit_cooldown: Duration,
    /// Cheapest enrichment step worth continuing a campaign for, in cents.
    pub min_viable_step_cents: u64,
    /// Max candidates requested per search query.
    pub search_batch_size: u32,
    /// Region used for phone normalization.
    pub phone_region: CountryId,
    pub weights: ScoringWeights,
    pub prevalidation_points: PrevalidationPoints,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prevalidation_threshold: 70,
            min_confidence: 80,
            enrichment_concurrency: 4,
            inter_query_delay: Duration::from_secs(2),
            call_timeout: Duration::from_secs(15),
            breaker_failure_threshold: 3,
            breaker_rate_limit_trip: 1,
            breaker_cooldown: Duration::from_secs(30),
            breaker_rate_limit_cooldown: Duration::from_secs(120),
            min_viable_step_cents: 5,
            search_batch_size: 20,
            phone_region: CountryId::US,
            weights: ScoringWeights::default(),
            prevalidation_points: PrevalidationPoints::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(v) = std::env::var("LEADQUAL_PREVALIDATION_THRESHOLD") {
            config.prevalidation_threshold = v
                .parse()
                .map_err(|_| anyhow::anyhow!("LEADQUAL_PREVALIDATION_THRESHOLD must be 0-100"))?;
        }
        if let Ok(v) = std::env::var("LEADQUAL_MIN_CONFIDENCE") {
            config.min_confidence = v
                .parse()
                .map_err(|_| anyhow::anyhow!("LEADQUAL_MIN_CONFIDENCE must be 0-100"))?;
        }
        if let Ok(v) = std::env::var("LEADQUAL_CONCURRENCY") {
            config.enrichment_concurrency = v
                .parse::<usize>()
                .ok()
                .filter(|&n| n >= 1)
                .ok_or_else(|| anyhow::anyhow!("LEADQUAL_CONCURRENCY must be >= 1"))?;
        }
        if let Ok(v) = std::env::var("LEADQUAL_INTER_QUERY_DELAY_MS") {
            let ms: u64 = v
                .parse()
                .map_err(|_| anyhow::anyhow!("LEADQUAL_INTER_QUERY_DELAY_MS must be a number"))?;
            config.inter_query_delay = Duration::from_millis(ms);
        }
        if let Ok(v) = std::env::var("LEADQUAL_CALL_TIMEOUT_MS") {
            let ms: u64 = v
                .parse()
                .map_err(|_| anyhow::anyhow!("LEADQUAL_CALL_TIMEOUT_MS must be a number"))?;
            config.call_timeout = Duration::from_millis(ms);
        }
        if let Ok(v) = std::env::var("LEADQUAL_BREAKER_THRESHOLD") {
            config.breaker_failure_threshold = v
                .parse::<u32>()
                .ok()
                .filter(|&n| n >= 1)
                .ok_or_else(|| anyhow::anyhow!("LEADQUAL_BREAKER_THRESHOLD must be >= 1"))?;
        }
        if let Ok(v) = std::env::var("LEADQUAL_SEARCH_BATCH_SIZE") {
            config.search_batch_size = v
                .parse::<u32>()
                .ok()
                .filter(|&n| n >= 1)
                .ok_or_else(|| anyhow::anyhow!("LEADQUAL_SEARCH_BATCH_SIZE must be >= 1"))?;
        }

        if config.prevalidation_threshold > 100 {
            anyhow::bail!("LEADQUAL_PREVALIDATION_THRESHOLD must be 0-100");
        }
        if config.min_confidence > 100 {
            anyhow::bail!("LEADQUAL_MIN_CONFIDENCE must be 0-100");
        }

        tracing::info!("Pipeline configuration loaded");
        tracing::debug!(
            "prevalidation_threshold={} min_confidence={} concurrency={}",
            config.prevalidation_threshold,
            config.min_confidence,
            config.enrichment_concurrency
        );

        Ok(config)
    }
}

/// One campaign-run invocation: what to search for and when to stop.
#[derive(Debug, Clone)]
pub struct CampaignSpec {
    /// Business type / primary query string.
    pub query: String,
    /// Location string passed to the search adapter.
    pub location: String,
    /// Caller-supplied additional query variants, tried in order after the
    /// primary query.
    pub extra_queries: Vec<String>,
    /// Stop once this many leads qualify.
    pub target_count: u64,
    /// Total campaign budget in cents. Never exceeded.
    pub budget_cents: u64,
    /// Override for the configured minimum confidence, if set.
    pub min_confidence: Option<u8>,
    /// Fields every qualified lead must carry with verified evidence.
    pub required_fields: HashSet<RequiredField>,
}

impl CampaignSpec {
    pub fn new(query: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            location: location.into(),
            extra_queries: Vec::new(),
            target_count: 10,
            budget_cents: 0,
            min_confidence: None,
            required_fields: HashSet::new(),
        }
    }

    /// Fatal configuration check. Runs before the pipeline starts; this is
    /// the only error class that surfaces to the caller as a hard failure.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.query.trim().is_empty() {
            return Err(PipelineError::InvalidCampaign(
                "query must not be empty".to_string(),
            ));
        }
        if self.budget_cents == 0 {
            return Err(PipelineError::InvalidCampaign(
                "budget must be greater than zero".to_string(),
            ));
        }
        if self.target_count == 0 {
            return Err(PipelineError::InvalidCampaign(
                "target count must be greater than zero".to_string(),
            ));
        }
        if let Some(c) = self.min_confidence {
            if c > 100 {
                return Err(PipelineError::InvalidCampaign(
                    "min confidence must be 0-100".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// All query variants in trial order: the primary query first, then the
    /// caller-supplied extras.
    pub fn variants(&self) -> Vec<String> {
        let mut v = Vec::with_capacity(1 + self.extra_queries.len());
        v.push(self.query.clone());
        v.extend(
            self.extra_queries
                .iter()
                .filter(|q| !q.trim().is_empty())
                .cloned(),
        );
        v
    }
}
