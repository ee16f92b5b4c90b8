//! Per-venue, per-cycle run results reported to the observability sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Partial,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error classification carried on a [`RunOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Browser could not launch, connect, or load the venue.
    Session,
    /// An expected element never appeared, even after the retry.
    Timeout,
    /// A selector set was exhausted without a match.
    NotFound,
    /// The router could not map the venue to a flow or selector profile.
    UnsupportedVenue,
    /// An anti-automation page was detected.
    Blocked,
    /// The scheduler was stopped while the run was in flight.
    Cancelled,
    /// The per-venue wall-clock ceiling was exceeded.
    RunTimeout,
    /// The persistence collaborator rejected or failed a batch.
    Persistence,
    /// Unexpected browser protocol response.
    Protocol,
    /// The venue task panicked.
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Session => "session",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UnsupportedVenue => "unsupported_venue",
            ErrorKind::Blocked => "blocked",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::RunTimeout => "run_timeout",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one venue run within one scheduler cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub venue_id: String,
    pub status: RunStatus,
    /// Records accepted by the persistence sink.
    pub record_count: u64,
    /// Candidates dropped by classification.
    pub rejected_count: u64,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    /// A failed outcome with no records, finishing now.
    #[must_use]
    pub fn failed(
        venue_id: impl Into<String>,
        started_at: DateTime<Utc>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            venue_id: venue_id.into(),
            status: RunStatus::Failed,
            record_count: 0,
            rejected_count: 0,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            started_at,
            finished_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == RunStatus::Failed
    }
}
