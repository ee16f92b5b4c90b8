//! Database operations for `booking_slots`.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use slotscout_core::{
    BookingSlotRecord, Price, PriceField, ProviderName, SlotKey, SlotRecordParts,
};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `booking_slots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SlotRow {
    pub id: i64,
    pub venue_id: String,
    pub resource_name: String,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub price_known: bool,
    pub price_amount: Option<Decimal>,
    pub price_currency: Option<String>,
    pub duration_minutes: i32,
    pub provider_name: Option<String>,
    pub extracted_at: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlotRow {
    /// Rebuilds the domain record, re-applying its invariants.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidRow`] when the stored columns do not form a
    /// valid record.
    pub fn into_record(self) -> Result<BookingSlotRecord, DbError> {
        let price = match (self.price_known, self.price_amount, self.price_currency) {
            (true, Some(amount), Some(currency)) => PriceField::Known(Price { amount, currency }),
            (false, None, None) => PriceField::Unknown,
            _ => {
                return Err(DbError::InvalidRow(format!(
                    "booking_slots.id={} has an inconsistent price",
                    self.id
                )))
            }
        };
        let duration_minutes = u32::try_from(self.duration_minutes).map_err(|_| {
            DbError::InvalidRow(format!(
                "booking_slots.id={} has negative duration",
                self.id
            ))
        })?;
        BookingSlotRecord::new(SlotRecordParts {
            venue_id: self.venue_id,
            resource_name: self.resource_name,
            date: self.slot_date,
            time: self.slot_time,
            price,
            duration_minutes,
            provider_name: self
                .provider_name
                .map_or(ProviderName::Unspecified, ProviderName::Named),
            extracted_at: self.extracted_at,
        })
        .map_err(|e| DbError::InvalidRow(format!("booking_slots.id={}: {e}", self.id)))
    }
}

/// Upserts `records` keyed on (venue, resource, date, time).
///
/// Every record is re-validated first; one invalid record rejects the whole
/// batch. Records sharing a key within the batch collapse to the last one,
/// since a single `ON CONFLICT DO UPDATE` statement cannot touch a row twice.
///
/// Returns the number of rows inserted or updated.
///
/// # Errors
///
/// Returns [`DbError::RejectedRecord`] for an invalid record, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn upsert_slot_records(
    pool: &PgPool,
    records: &[BookingSlotRecord],
) -> Result<u64, DbError> {
    for record in records {
        record
            .validate()
            .map_err(|e| DbError::RejectedRecord(format!("{}: {e}", record.key())))?;
    }
    let batch = last_per_key(records);
    if batch.is_empty() {
        return Ok(0);
    }

    let mut venue_ids: Vec<String> = Vec::with_capacity(batch.len());
    let mut resource_names: Vec<String> = Vec::with_capacity(batch.len());
    let mut dates: Vec<NaiveDate> = Vec::with_capacity(batch.len());
    let mut times: Vec<NaiveTime> = Vec::with_capacity(batch.len());
    let mut price_knowns: Vec<bool> = Vec::with_capacity(batch.len());
    let mut price_amounts: Vec<Option<Decimal>> = Vec::with_capacity(batch.len());
    let mut price_currencies: Vec<Option<String>> = Vec::with_capacity(batch.len());
    let mut durations: Vec<i32> = Vec::with_capacity(batch.len());
    let mut providers: Vec<Option<String>> = Vec::with_capacity(batch.len());
    let mut extracted_ats: Vec<DateTime<Utc>> = Vec::with_capacity(batch.len());

    for record in &batch {
        venue_ids.push(record.venue_id().to_string());
        resource_names.push(record.resource_name().to_string());
        dates.push(record.date());
        times.push(record.time());
        match record.price() {
            PriceField::Known(price) => {
                price_knowns.push(true);
                price_amounts.push(Some(price.amount));
                price_currencies.push(Some(price.currency.clone()));
            }
            PriceField::Unknown => {
                price_knowns.push(false);
                price_amounts.push(None);
                price_currencies.push(None);
            }
        }
        // validate() bounds duration to 480.
        durations.push(i32::try_from(record.duration_minutes()).unwrap_or(i32::MAX));
        providers.push(match record.provider_name() {
            ProviderName::Named(name) => Some(name.clone()),
            ProviderName::Unspecified => None,
        });
        extracted_ats.push(record.extracted_at());
    }

    let result = sqlx::query(
        "INSERT INTO booking_slots \
             (venue_id, resource_name, slot_date, slot_time, price_known, price_amount, \
              price_currency, duration_minutes, provider_name, extracted_at) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::text[], $3::date[], $4::time[], $5::bool[], $6::numeric[], \
              $7::text[], $8::int4[], $9::text[], $10::timestamptz[]) \
         ON CONFLICT (venue_id, resource_name, slot_date, slot_time) DO UPDATE SET \
             price_known      = EXCLUDED.price_known, \
             price_amount     = EXCLUDED.price_amount, \
             price_currency   = EXCLUDED.price_currency, \
             duration_minutes = EXCLUDED.duration_minutes, \
             provider_name    = EXCLUDED.provider_name, \
             extracted_at     = EXCLUDED.extracted_at, \
             updated_at       = NOW()",
    )
    .bind(&venue_ids)
    .bind(&resource_names)
    .bind(&dates)
    .bind(&times)
    .bind(&price_knowns)
    .bind(&price_amounts)
    .bind(&price_currencies)
    .bind(&durations)
    .bind(&providers)
    .bind(&extracted_ats)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Slots for one venue on one date, ordered by resource then start time.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_slots(
    pool: &PgPool,
    venue_id: &str,
    date: NaiveDate,
) -> Result<Vec<SlotRow>, DbError> {
    let rows = sqlx::query_as::<_, SlotRow>(
        "SELECT id, venue_id, resource_name, slot_date, slot_time, price_known, price_amount, \
                price_currency, duration_minutes, provider_name, extracted_at, first_seen_at, \
                updated_at \
         FROM booking_slots \
         WHERE venue_id = $1 AND slot_date = $2 \
         ORDER BY resource_name, slot_time",
    )
    .bind(venue_id)
    .bind(date)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Keeps the last record for each key, in order of first appearance.
fn last_per_key(records: &[BookingSlotRecord]) -> Vec<&BookingSlotRecord> {
    let mut position: HashMap<SlotKey, usize> = HashMap::with_capacity(records.len());
    let mut out: Vec<&BookingSlotRecord> = Vec::with_capacity(records.len());
    for record in records {
        match position.get(&record.key()) {
            Some(&i) => out[i] = record,
            None => {
                position.insert(record.key(), out.len());
                out.push(record);
            }
        }
    }
    out
}
