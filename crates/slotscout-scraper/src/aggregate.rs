//! Turns raw candidates into validated slot records, lazily.

use chrono::{DateTime, Utc};
use slotscout_core::{BookingSlotCandidate, BookingSlotRecord, SlotRecordParts};

use crate::classify::classify_candidate;

/// Iterator of records over a candidate stream. Implausible or invalid
/// candidates are skipped and counted, never emitted.
pub struct Aggregator<I> {
    candidates: I,
    venue_id: String,
    extracted_at: DateTime<Utc>,
    rejected: u64,
}

impl<I> Aggregator<I> {
    /// Candidates dropped so far.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl<I> Iterator for Aggregator<I>
where
    I: Iterator<Item = BookingSlotCandidate>,
{
    type Item = BookingSlotRecord;

    fn next(&mut self) -> Option<Self::Item> {
        for candidate in self.candidates.by_ref() {
            let Some(slot) = classify_candidate(&candidate) else {
                self.rejected += 1;
                tracing::debug!(
                    venue = %self.venue_id,
                    raw_time = ?candidate.raw_time,
                    raw_price = ?candidate.raw_price,
                    "candidate rejected as implausible"
                );
                continue;
            };
            let Some(resource_name) = slot.resource_name else {
                self.rejected += 1;
                tracing::debug!(venue = %self.venue_id, "candidate rejected: no resource name");
                continue;
            };
            match BookingSlotRecord::new(SlotRecordParts {
                venue_id: self.venue_id.clone(),
                resource_name,
                date: slot.date,
                time: slot.time,
                price: slot.price,
                duration_minutes: slot.duration_minutes,
                provider_name: slot.provider_name,
                extracted_at: self.extracted_at,
            }) {
                Ok(record) => return Some(record),
                Err(e) => {
                    self.rejected += 1;
                    tracing::debug!(venue = %self.venue_id, error = %e, "candidate rejected");
                }
            }
        }
        None
    }
}

/// Aggregates `candidates` for `venue_id`, stamping every record with the
/// same extraction time.
pub fn aggregate<I>(candidates: I, venue_id: &str) -> Aggregator<I::IntoIter>
where
    I: IntoIterator<Item = BookingSlotCandidate>,
{
    Aggregator {
        candidates: candidates.into_iter(),
        venue_id: venue_id.to_string(),
        extracted_at: Utc::now(),
        rejected: 0,
    }
}
