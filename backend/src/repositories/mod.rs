//! Typed repositories over the document store
//!
//! Each repository maps one collection to its domain type. Repositories
//! return [`StoreError`](crate::error::StoreError) and leave stats
//! bookkeeping to the services.

pub mod food_entries;
pub mod user_stats;
pub mod workouts;

pub use food_entries::FoodEntryRepository;
pub use user_stats::UserStatsRepository;
pub use workouts::WorkoutRepository;

use crate::error::StoreError;
use crate::store::{Collection, Document};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use peak_performance_shared::{decode, DecodeOutcome};
use serde::de::DeserializeOwned;
use tracing::warn;

/// UTC instants bounding the local calendar `day`: `[start, end)`
pub fn day_bounds(day: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = day.and_time(NaiveTime::MIN);
    let shift = Duration::seconds(offset.local_minus_utc() as i64);
    let start = Utc.from_utc_datetime(&(local_midnight - shift));
    (start, start + Duration::days(1))
}

/// The local calendar day containing `instant`
pub fn local_day(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Offset from a minute count, falling back to UTC when out of range
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
}

/// Decode a fetched document, failing on anything unreadable
fn decode_document<T: DeserializeOwned>(
    collection: Collection,
    doc: &Document,
) -> Result<T, StoreError> {
    decode::<T>(Some(&doc.data))
        .into_result()
        .map_err(|source| StoreError::Malformed {
            collection,
            id: doc.id.clone(),
            source,
        })
}

/// Decode query results, skipping documents that cannot be read
fn decode_documents<T: DeserializeOwned>(
    collection: Collection,
    docs: Vec<Document>,
    attach_id: impl Fn(T, String) -> T,
) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match decode::<T>(Some(&doc.data)) {
            DecodeOutcome::Ok(value) | DecodeOutcome::Recovered { value, .. } => {
                Some(attach_id(value, doc.id))
            }
            DecodeOutcome::Fatal(cause) => {
                metrics::counter!("documents_skipped_total", "collection" => collection.as_str())
                    .increment(1);
                warn!(
                    %collection,
                    entry_id = %doc.id,
                    error = %cause,
                    "Skipping undecodable document"
                );
                None
            }
        })
        .collect()
}
