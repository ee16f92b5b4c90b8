//! Database operations for `run_outcomes`.

use chrono::{DateTime, Utc};
use slotscout_core::RunOutcome;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `run_outcomes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RunOutcomeRow {
    pub id: i64,
    pub public_id: Uuid,
    pub venue_id: String,
    pub status: String,
    pub record_count: i64,
    pub rejected_count: i64,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

const COLUMNS: &str = "id, public_id, venue_id, status, record_count, rejected_count, \
                       error_kind, error_message, started_at, finished_at, created_at";

/// Stores one venue run result. Generates the `public_id` in Rust.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_run_outcome(
    pool: &PgPool,
    outcome: &RunOutcome,
) -> Result<RunOutcomeRow, DbError> {
    let row = sqlx::query_as::<_, RunOutcomeRow>(&format!(
        "INSERT INTO run_outcomes \
             (public_id, venue_id, status, record_count, rejected_count, error_kind, \
              error_message, started_at, finished_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&outcome.venue_id)
    .bind(outcome.status.as_str())
    .bind(i64::try_from(outcome.record_count).unwrap_or(i64::MAX))
    .bind(i64::try_from(outcome.rejected_count).unwrap_or(i64::MAX))
    .bind(outcome.error_kind.map(|k| k.as_str()))
    .bind(outcome.error_message.as_deref())
    .bind(outcome.started_at)
    .bind(outcome.finished_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Most recent outcomes first, optionally for a single venue.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_run_outcomes(
    pool: &PgPool,
    venue_id: Option<&str>,
    limit: i64,
) -> Result<Vec<RunOutcomeRow>, DbError> {
    let rows = sqlx::query_as::<_, RunOutcomeRow>(&format!(
        "SELECT {COLUMNS} FROM run_outcomes \
         WHERE ($1::text IS NULL OR venue_id = $1) \
         ORDER BY started_at DESC, id DESC \
         LIMIT $2"
    ))
    .bind(venue_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
