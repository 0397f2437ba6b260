use serde::Serialize;

use crate::{
    aggregate::Aggregates,
    record::{BucketKey, Quantity, RecordKey},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub key: RecordKey,
    pub total: Quantity,
}

/// The highest totals of a single hour, best first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyTop {
    pub bucket: BucketKey,
    pub entries: Vec<RankedEntry>,
}

/// Ranks the keys of every bucket by descending total and keeps the first `n`.
///
/// Equal totals are ordered by ascending key. Buckets are returned in chronological order.
pub fn top_n(aggregates: &Aggregates, n: usize) -> Vec<HourlyTop> {
    aggregates
        .iter()
        .map(|(bucket, keys)| {
            let mut entries = keys
                .iter()
                .map(|(&key, &total)| RankedEntry { key, total })
                .collect::<Vec<_>>();

            entries.sort_unstable_by(|a, b| b.total.cmp(&a.total).then(a.key.cmp(&b.key)));
            entries.truncate(n);

            HourlyTop {
                bucket: *bucket,
                entries,
            }
        })
        .collect()
}
