use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::Serialize;

use crate::record::{BucketKey, Quantity, Record, RecordKey};

pub const DEFAULT_STRIPES: usize = 16;

type Buckets = HashMap<BucketKey, HashMap<RecordKey, Quantity>>;

/// Hourly sums shared between consumer workers.
///
/// Buckets are spread over a fixed set of independently locked stripes, so consumers folding
/// records of different hours rarely contend. A bucket always lives in exactly one stripe.
pub struct AggregateMap {
    stripes: Box<[Mutex<Buckets>]>,
}

impl AggregateMap {
    pub fn new() -> Self {
        Self::with_stripes(DEFAULT_STRIPES)
    }

    pub fn with_stripes(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1))
                .map(|_| Mutex::new(Buckets::new()))
                .collect(),
        }
    }

    fn stripe(&self, bucket: &BucketKey) -> &Mutex<Buckets> {
        let index = bucket.ordinal() % self.stripes.len() as u64;
        &self.stripes[index as usize]
    }

    /// Adds `quantity` to the cell `(bucket, key)`, creating it at zero.
    ///
    /// Totals wrap on overflow, so they do not depend on fold order and are exact whenever the true
    /// sum fits in an `i64`.
    pub fn add(&self, bucket: BucketKey, key: RecordKey, quantity: Quantity) {
        let mut buckets = self.stripe(&bucket).lock();
        let total = buckets.entry(bucket).or_default().entry(key).or_insert(0);
        *total = total.wrapping_add(quantity);
    }

    pub fn fold(&self, record: &Record) {
        self.add(record.bucket(), record.key, record.quantity);
    }

    /// Freezes the map once no worker holds a reference anymore.
    pub fn into_aggregates(self) -> Aggregates {
        let mut aggregates = BTreeMap::new();

        for stripe in self.stripes.into_vec() {
            for (bucket, keys) in stripe.into_inner() {
                aggregates.insert(bucket, keys.into_iter().collect());
            }
        }

        Aggregates(aggregates)
    }
}

impl Default for AggregateMap {
    fn default() -> Self {
        Self::new()
    }
}

/// The final, read-only result of a run: bucket -> key -> total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Aggregates(BTreeMap<BucketKey, BTreeMap<RecordKey, Quantity>>);

impl Aggregates {
    pub fn get(&self, bucket: &BucketKey, key: RecordKey) -> Option<Quantity> {
        self.0.get(bucket).and_then(|keys| keys.get(&key)).copied()
    }

    pub fn bucket(&self, bucket: &BucketKey) -> Option<&BTreeMap<RecordKey, Quantity>> {
        self.0.get(bucket)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &BTreeMap<RecordKey, Quantity>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum over every bucket and key, wrapping like the per-cell totals.
    pub fn total(&self) -> Quantity {
        self.0
            .values()
            .flat_map(|keys| keys.values())
            .fold(0, |sum, quantity| sum.wrapping_add(*quantity))
    }

    pub fn into_inner(self) -> BTreeMap<BucketKey, BTreeMap<RecordKey, Quantity>> {
        self.0
    }
}

impl From<BTreeMap<BucketKey, BTreeMap<RecordKey, Quantity>>> for Aggregates {
    fn from(inner: BTreeMap<BucketKey, BTreeMap<RecordKey, Quantity>>) -> Self {
        Self(inner)
    }
}

#[cfg(test)]
mod tests {
    use std::{str::FromStr, thread};

    use crate::record::BucketKey;

    use super::AggregateMap;

    fn bucket(s: &str) -> BucketKey {
        BucketKey::from_str(s).unwrap()
    }

    #[test]
    fn test_add_creates_and_accumulates() {
        let map = AggregateMap::new();
        map.add(bucket("2025-01-01 00"), 1, 10);
        map.add(bucket("2025-01-01 00"), 1, 5);
        map.add(bucket("2025-01-01 00"), 2, 7);
        map.add(bucket("2025-01-01 01"), 1, 9);

        let aggregates = map.into_aggregates();
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates.get(&bucket("2025-01-01 00"), 1), Some(15));
        assert_eq!(aggregates.get(&bucket("2025-01-01 00"), 2), Some(7));
        assert_eq!(aggregates.get(&bucket("2025-01-01 01"), 1), Some(9));
        assert_eq!(aggregates.get(&bucket("2025-01-01 01"), 2), None);
        assert_eq!(aggregates.total(), 31);
    }

    #[test]
    fn test_single_stripe_behaves_like_coarse_lock() {
        let map = AggregateMap::with_stripes(0);
        for hour in 0..24 {
            map.add(bucket(&format!("2025-01-01 {hour:02}")), 1, 1);
        }

        let aggregates = map.into_aggregates();
        assert_eq!(aggregates.len(), 24);
        assert_eq!(aggregates.total(), 24);
    }

    #[test]
    fn test_buckets_are_ordered_chronologically() {
        let map = AggregateMap::new();
        map.add(bucket("2025-01-02 00"), 1, 1);
        map.add(bucket("2025-01-01 23"), 1, 1);
        map.add(bucket("2025-01-01 03"), 1, 1);

        let order = map
            .into_aggregates()
            .iter()
            .map(|(b, _)| b.to_string())
            .collect::<Vec<_>>();
        assert_eq!(order, vec!["2025-01-01 03", "2025-01-01 23", "2025-01-02 00"]);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let map = AggregateMap::with_stripes(4);

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for i in 0..10_000 {
                        map.add(bucket("2025-01-01 00"), 1, 1);
                        map.add(bucket(&format!("2025-01-01 {:02}", i % 24)), 2, 2);
                    }
                });
            }
        });

        let aggregates = map.into_aggregates();
        assert_eq!(aggregates.get(&bucket("2025-01-01 00"), 1), Some(80_000));
        assert_eq!(aggregates.total(), 80_000 + 8 * 10_000 * 2);
    }

    #[test]
    fn test_aggregates_serialize_with_readable_buckets() {
        let map = AggregateMap::new();
        map.add(bucket("2025-01-01 00"), 1, 15);

        let json = serde_json::to_string(&map.into_aggregates()).unwrap();
        assert_eq!(json, r#"{"2025-01-01 00":{"1":15}}"#);
    }

    #[test]
    fn test_totals_do_not_depend_on_fold_order() {
        let orders = [[i64::MAX, 1, -1], [-1, i64::MAX, 1], [1, -1, i64::MAX]];

        let totals = orders
            .iter()
            .map(|order| {
                let map = AggregateMap::new();
                for quantity in order {
                    map.add(bucket("2025-01-01 00"), 1, *quantity);
                }
                map.into_aggregates().get(&bucket("2025-01-01 00"), 1)
            })
            .collect::<Vec<_>>();

        assert_eq!(totals, vec![Some(i64::MAX); 3]);
    }

    #[test]
    fn test_total_wraps_instead_of_panicking() {
        let map = AggregateMap::new();
        map.add(bucket("2025-01-01 00"), 1, i64::MAX);
        map.add(bucket("2025-01-01 00"), 2, 1);
        map.add(bucket("2025-01-01 01"), 1, -1);

        let aggregates = map.into_aggregates();
        assert_eq!(aggregates.get(&bucket("2025-01-01 00"), 1), Some(i64::MAX));
        assert_eq!(aggregates.total(), i64::MAX);

        let map = AggregateMap::new();
        map.add(bucket("2025-01-01 00"), 1, i64::MAX);
        map.add(bucket("2025-01-01 00"), 2, 1);
        assert_eq!(map.into_aggregates().total(), i64::MIN);
    }
}
