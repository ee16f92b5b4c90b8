use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Optional so that `--dry-run` and `check-config` work without a database.
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub venues_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub schedule_interval_secs: u64,
    pub scheduler_backoff_secs: u64,
    pub venue_run_timeout_secs: u64,
    pub max_concurrent_venues: usize,
    pub wait_timeout_ms: u64,
    pub wait_retry_multiplier: u32,
    pub poll_interval_ms: u64,
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
    pub days_ahead: u32,
    pub browser_path: Option<PathBuf>,
    pub browser_headless: bool,
    pub browser_user_agent: Option<String>,
    pub browser_launch_timeout_secs: u64,
    pub screenshot_dir: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("venues_path", &self.venues_path)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("schedule_interval_secs", &self.schedule_interval_secs)
            .field("scheduler_backoff_secs", &self.scheduler_backoff_secs)
            .field("venue_run_timeout_secs", &self.venue_run_timeout_secs)
            .field("max_concurrent_venues", &self.max_concurrent_venues)
            .field("wait_timeout_ms", &self.wait_timeout_ms)
            .field("wait_retry_multiplier", &self.wait_retry_multiplier)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("pacing_min_ms", &self.pacing_min_ms)
            .field("pacing_max_ms", &self.pacing_max_ms)
            .field("days_ahead", &self.days_ahead)
            .field("browser_path", &self.browser_path)
            .field("browser_headless", &self.browser_headless)
            .field("browser_user_agent", &self.browser_user_agent)
            .field(
                "browser_launch_timeout_secs",
                &self.browser_launch_timeout_secs,
            )
            .field("screenshot_dir", &self.screenshot_dir)
            .finish()
    }
}
