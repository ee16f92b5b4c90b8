//! Booking-slot data model: raw candidates read from a rendered grid and the
//! validated records handed to persistence.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for `duration_minutes` on a record (inclusive).
pub const MAX_DURATION_MINUTES: u32 = 480;

/// Decimal places kept for a price amount, matching `NUMERIC(12, 2)`.
pub const PRICE_SCALE: u32 = 2;

/// Highest whole number that can also be read as a 24-hour clock hour.
const LAST_CLOCK_HOUR: i64 = 23;

/// A price with an explicit currency code (e.g. `RUB`, `USD`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: Decimal,
    pub currency: String,
}

impl Price {
    /// Returns `true` when the amount is a whole number in `[0, 23]`, i.e. a
    /// value indistinguishable from a clock hour once the currency is dropped.
    #[must_use]
    pub fn is_hour_like(&self) -> bool {
        self.amount.fract().is_zero()
            && self.amount >= Decimal::ZERO
            && self.amount <= Decimal::from(LAST_CLOCK_HOUR)
    }

    /// Largest amount the storage column can hold.
    #[must_use]
    pub fn max_amount() -> Decimal {
        Decimal::new(999_999_999_999, PRICE_SCALE)
    }

    /// Whether the amount is stored exactly: non-negative, at most
    /// [`PRICE_SCALE`] decimal places, no larger than [`Price::max_amount`].
    #[must_use]
    pub fn fits_storage(&self) -> bool {
        !self.amount.is_sign_negative()
            && self.amount.normalize().scale() <= PRICE_SCALE
            && self.amount <= Self::max_amount()
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount.normalize(), self.currency)
    }
}

/// Price column of a record: either a classified price or the page's explicit
/// "price unknown" marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Known(Price),
    Unknown,
}

impl PriceField {
    #[must_use]
    pub fn as_known(&self) -> Option<&Price> {
        match self {
            PriceField::Known(price) => Some(price),
            PriceField::Unknown => None,
        }
    }
}

impl std::fmt::Display for PriceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PriceField::Known(price) => price.fmt(f),
            PriceField::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Named(String),
    Unspecified,
}

impl ProviderName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ProviderName::Named(name) => name,
            ProviderName::Unspecified => "unspecified",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One grid cell/row exactly as read from the page, before classification.
///
/// `nominal_date` is the date the flow believes it selected (reference date
/// plus day offset); `raw_date` is whatever the date cell itself exposed, if
/// anything. The classifier prefers a parseable `raw_date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingSlotCandidate {
    pub raw_time: Option<String>,
    pub raw_price: Option<String>,
    pub raw_duration: Option<String>,
    pub raw_provider: Option<String>,
    pub raw_resource_name: Option<String>,
    pub raw_date: Option<String>,
    pub nominal_date: NaiveDate,
    pub source_selector: String,
    pub page_url: String,
}

/// Upsert key for a slot: two extractions of the same page state map to the
/// same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub venue_id: String,
    pub resource_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl std::fmt::Display for SlotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.venue_id,
            self.resource_name,
            self.date,
            self.time.format("%H:%M")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("venue_id must be non-empty")]
    EmptyVenueId,

    #[error("resource_name must be non-empty")]
    EmptyResourceName,

    #[error("price {0} is indistinguishable from a clock hour")]
    HourLikePrice(Price),

    #[error("price {0} cannot be stored without rounding")]
    PriceOutOfRange(Price),

    #[error("duration {0} min is outside (0, {MAX_DURATION_MINUTES}]")]
    DurationOutOfRange(u32),
}

/// Field values for [`BookingSlotRecord::new`].
#[derive(Debug, Clone)]
pub struct SlotRecordParts {
    pub venue_id: String,
    pub resource_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub price: PriceField,
    pub duration_minutes: u32,
    pub provider_name: ProviderName,
    pub extracted_at: DateTime<Utc>,
}

/// A validated booking slot ready for persistence.
///
/// Fields are private: the only way to obtain a record is [`BookingSlotRecord::new`],
/// which enforces the invariants, and records are never edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSlotRecord {
    venue_id: String,
    resource_name: String,
    date: NaiveDate,
    time: NaiveTime,
    price: PriceField,
    duration_minutes: u32,
    provider_name: ProviderName,
    extracted_at: DateTime<Utc>,
}

impl BookingSlotRecord {
    /// Builds a record, rejecting hour-like prices and out-of-range durations.
    ///
    /// # Errors
    ///
    /// Returns the first [`RecordError`] the parts violate.
    pub fn new(parts: SlotRecordParts) -> Result<Self, RecordError> {
        let record = Self {
            venue_id: parts.venue_id,
            resource_name: parts.resource_name,
            date: parts.date,
            time: parts.time,
            price: parts.price,
            duration_minutes: parts.duration_minutes,
            provider_name: parts.provider_name,
            extracted_at: parts.extracted_at,
        };
        record.validate()?;
        Ok(record)
    }

    /// Re-checks the record invariants. Persistence calls this again before
    /// writing so that a record deserialized from elsewhere cannot slip past.
    ///
    /// # Errors
    ///
    /// Returns the first [`RecordError`] the record violates.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.venue_id.trim().is_empty() {
            return Err(RecordError::EmptyVenueId);
        }
        if self.resource_name.trim().is_empty() {
            return Err(RecordError::EmptyResourceName);
        }
        if let PriceField::Known(price) = &self.price {
            if !price.fits_storage() {
                return Err(RecordError::PriceOutOfRange(price.clone()));
            }
            if price.is_hour_like() {
                return Err(RecordError::HourLikePrice(price.clone()));
            }
        }
        if self.duration_minutes == 0 || self.duration_minutes > MAX_DURATION_MINUTES {
            return Err(RecordError::DurationOutOfRange(self.duration_minutes));
        }
        Ok(())
    }

    #[must_use]
    pub fn key(&self) -> SlotKey {
        SlotKey {
            venue_id: self.venue_id.clone(),
            resource_name: self.resource_name.clone(),
            date: self.date,
            time: self.time,
        }
    }

    #[must_use]
    pub fn venue_id(&self) -> &str {
        &self.venue_id
    }

    #[must_use]
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// `HH:MM`, or `HH:MM:SS` when the slot does not start on a whole minute.
    #[must_use]
    pub fn time_label(&self) -> String {
        if self.time.second() == 0 {
            self.time.format("%H:%M").to_string()
        } else {
            self.time.format("%H:%M:%S").to_string()
        }
    }

    #[must_use]
    pub fn price(&self) -> &PriceField {
        &self.price
    }

    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    #[must_use]
    pub fn provider_name(&self) -> &ProviderName {
        &self.provider_name
    }

    #[must_use]
    pub fn extracted_at(&self) -> DateTime<Utc> {
        self.extracted_at
    }
}
