use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can pass a `HashMap` lookup
/// instead of calling `set_var`/`remove_var`.
#[allow(clippy::too_many_lines)]
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
            },
        }
    };

    let database_url = optional("DATABASE_URL");
    let env = parse_environment(&or_default("SLOTSCOUT_ENV", "development"))?;
    let log_level = or_default("SLOTSCOUT_LOG_LEVEL", "info");
    let venues_path = PathBuf::from(or_default(
        "SLOTSCOUT_VENUES_PATH",
        "./config/venues.yaml",
    ));

    let db_max_connections = parse_u32("SLOTSCOUT_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SLOTSCOUT_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SLOTSCOUT_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let schedule_interval_secs = parse_u64("SLOTSCOUT_SCHEDULE_INTERVAL_SECS", "600")?;
    if schedule_interval_secs == 0 {
        return Err(invalid(
            "SLOTSCOUT_SCHEDULE_INTERVAL_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    let scheduler_backoff_secs = parse_u64("SLOTSCOUT_SCHEDULER_BACKOFF_SECS", "60")?;
    let venue_run_timeout_secs = parse_u64("SLOTSCOUT_VENUE_RUN_TIMEOUT_SECS", "60")?;
    if venue_run_timeout_secs == 0 {
        return Err(invalid(
            "SLOTSCOUT_VENUE_RUN_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }

    let max_concurrent_venues = parse_usize("SLOTSCOUT_MAX_CONCURRENT_VENUES", "1")?;
    if max_concurrent_venues == 0 {
        return Err(invalid(
            "SLOTSCOUT_MAX_CONCURRENT_VENUES",
            "must be at least 1".to_string(),
        ));
    }

    let wait_timeout_ms = parse_u64("SLOTSCOUT_WAIT_TIMEOUT_MS", "10000")?;
    let wait_retry_multiplier = parse_u32("SLOTSCOUT_WAIT_RETRY_MULTIPLIER", "2")?;
    if wait_retry_multiplier == 0 {
        return Err(invalid(
            "SLOTSCOUT_WAIT_RETRY_MULTIPLIER",
            "must be at least 1".to_string(),
        ));
    }
    let poll_interval_ms = parse_u64("SLOTSCOUT_POLL_INTERVAL_MS", "250")?;

    let pacing_min_ms = parse_u64("SLOTSCOUT_PACING_MIN_MS", "400")?;
    let pacing_max_ms = parse_u64("SLOTSCOUT_PACING_MAX_MS", "1500")?;
    if pacing_min_ms > pacing_max_ms {
        return Err(invalid(
            "SLOTSCOUT_PACING_MIN_MS",
            format!("{pacing_min_ms} exceeds SLOTSCOUT_PACING_MAX_MS ({pacing_max_ms})"),
        ));
    }

    let days_ahead = parse_u32("SLOTSCOUT_DAYS_AHEAD", "1")?;
    if days_ahead == 0 {
        return Err(invalid(
            "SLOTSCOUT_DAYS_AHEAD",
            "must be at least 1".to_string(),
        ));
    }

    let browser_path = optional("SLOTSCOUT_BROWSER_PATH").map(PathBuf::from);
    let browser_headless = parse_bool("SLOTSCOUT_BROWSER_HEADLESS", true)?;
    let browser_user_agent = optional("SLOTSCOUT_BROWSER_USER_AGENT");
    let browser_launch_timeout_secs = parse_u64("SLOTSCOUT_BROWSER_LAUNCH_TIMEOUT_SECS", "15")?;
    let screenshot_dir = optional("SLOTSCOUT_SCREENSHOT_DIR").map(PathBuf::from);

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        venues_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        schedule_interval_secs,
        scheduler_backoff_secs,
        venue_run_timeout_secs,
        max_concurrent_venues,
        wait_timeout_ms,
        wait_retry_multiplier,
        poll_interval_ms,
        pacing_min_ms,
        pacing_max_ms,
        days_ahead,
        browser_path,
        browser_headless,
        browser_user_agent,
        browser_launch_timeout_secs,
        screenshot_dir,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s.trim() {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SLOTSCOUT_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
