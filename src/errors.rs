use std::fmt;
use uuid::Uuid;

/// Errors surfaced by external enrichment and search sources.
///
/// These are inspected by the circuit breaker registry: rate-limit errors
/// trip a breaker faster and keep it open longer than generic failures.
#[derive(Debug, Clone)]
pub enum SourceError {
    /// The call exceeded its timeout.
    Timeout,
    /// The source rejected the call for quota/rate reasons.
    RateLimited,
    /// Non-2xx HTTP status from the source.
    Status(u16),
    /// The source responded but the payload could not be parsed.
    Malformed(String),
    /// Transport-level failure (DNS, connect, etc.).
    Unavailable(String),
}

impl SourceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited)
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Timeout => write!(f, "source call timed out"),
            SourceError::RateLimited => write!(f, "source rate-limited the call"),
            SourceError::Status(code) => write!(f, "source returned status {}", code),
            SourceError::Malformed(msg) => write!(f, "malformed source payload: {}", msg),
            SourceError::Unavailable(msg) => write!(f, "source unavailable: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// Pipeline-level error types.
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Fatal campaign configuration error (no budget, no query). The only
    /// error class that aborts a run before it starts.
    InvalidCampaign(String),
    /// A budget reservation could not be made. A terminal condition for the
    /// caller, not an exception mid-run.
    BudgetExceeded {
        requested_cents: u64,
        available_cents: u64,
    },
    /// Commit/release referenced a reservation that does not exist.
    ReservationNotFound(Uuid),
    /// Error from an external source, recovered locally by the orchestrator.
    Source(SourceError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidCampaign(msg) => write!(f, "Invalid campaign: {}", msg),
            PipelineError::BudgetExceeded {
                requested_cents,
                available_cents,
            } => write!(
                f,
                "Budget exceeded: requested {}c, available {}c",
                requested_cents, available_cents
            ),
            PipelineError::ReservationNotFound(id) => {
                write!(f, "Reservation not found: {}", id)
            }
            PipelineError::Source(e) => write!(f, "Source error: {}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<SourceError> for PipelineError {
    fn from(err: SourceError) -> Self {
        PipelineError::Source(err)
    }
}
