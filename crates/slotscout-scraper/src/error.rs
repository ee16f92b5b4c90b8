use slotscout_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("browser session error: {reason}")]
    Session { reason: String },

    #[error("DevTools endpoint {endpoint} not ready")]
    DevToolsNotReady { endpoint: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CDP {method} failed: {reason}")]
    Protocol { method: String, reason: String },

    #[error("timed out after {waited_ms}ms waiting for [{selectors}]")]
    Timeout { selectors: String, waited_ms: u64 },

    #[error("no element matched [{selectors}]")]
    NotFound { selectors: String },

    #[error("element {selector}[{index}] is no longer attached")]
    StaleElement { selector: String, index: usize },

    #[error("venue {venue_id} is not supported: {reason}")]
    UnsupportedVenue { venue_id: String, reason: String },

    #[error("invalid selector profile \"{profile_id}\": {reason}")]
    InvalidProfile { profile_id: String, reason: String },

    #[error("anti-automation page detected at {url} (matched {marker})")]
    Blocked { url: String, marker: String },

    #[error("run cancelled")]
    Cancelled,

    #[error("venue run exceeded {secs}s ceiling")]
    RunTimeout { secs: u64 },

    #[error("slot sink error: {0}")]
    Sink(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("flow failed in state {state}: {source}")]
    Flow {
        state: String,
        #[source]
        source: Box<ScraperError>,
    },
}

impl ScraperError {
    /// Wraps `self` with the flow state it occurred in. Already-wrapped
    /// errors keep their innermost state.
    #[must_use]
    pub fn in_state(self, state: impl std::fmt::Display) -> Self {
        match self {
            ScraperError::Flow { .. } | ScraperError::Cancelled => self,
            other => ScraperError::Flow {
                state: state.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Maps the error onto the coarse taxonomy stored in a `RunOutcome`.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScraperError::Session { .. }
            | ScraperError::DevToolsNotReady { .. }
            | ScraperError::Http(_) => ErrorKind::Session,
            ScraperError::Protocol { .. } => ErrorKind::Protocol,
            ScraperError::Timeout { .. } => ErrorKind::Timeout,
            ScraperError::NotFound { .. } | ScraperError::StaleElement { .. } => {
                ErrorKind::NotFound
            }
            ScraperError::UnsupportedVenue { .. } | ScraperError::InvalidProfile { .. } => {
                ErrorKind::UnsupportedVenue
            }
            ScraperError::Blocked { .. } => ErrorKind::Blocked,
            ScraperError::Cancelled => ErrorKind::Cancelled,
            ScraperError::RunTimeout { .. } => ErrorKind::RunTimeout,
            ScraperError::Sink(_) => ErrorKind::Persistence,
            ScraperError::Io(_) => ErrorKind::Internal,
            ScraperError::Flow { source, .. } => source.kind(),
        }
    }
}
