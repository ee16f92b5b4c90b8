pub mod app_config;
pub mod config;
pub mod outcome;
pub mod slots;
pub mod venues;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use outcome::{ErrorKind, RunOutcome, RunStatus};
pub use slots::{
    BookingSlotCandidate, BookingSlotRecord, Price, PriceField, ProviderName, RecordError,
    SlotKey, SlotRecordParts, MAX_DURATION_MINUTES, PRICE_SCALE,
};
pub use venues::{
    load_venues, parse_venues, FlowKind, ProfileOverrides, VenueCatalog, VenueConfig,
    DEFAULT_PROFILE_ID,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read venues file {path}: {source}")]
    VenuesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse venues file: {0}")]
    VenuesFileParse(#[from] serde_yaml::Error),

    #[error("venue configuration invalid: {0}")]
    Validation(String),
}
