use std::collections::BTreeMap;

use crate::{aggregate::Aggregates, record::Record};

/// Single-threaded reference aggregation over the same lines a pipeline run consumes.
pub fn aggregate_sequential(lines: &[String]) -> Aggregates {
    let mut aggregates = BTreeMap::new();

    for record in lines.iter().filter_map(|line| line.parse::<Record>().ok()) {
        let total = aggregates
            .entry(record.bucket())
            .or_insert_with(BTreeMap::new)
            .entry(record.key)
            .or_insert(0i64);
        *total = total.wrapping_add(record.quantity);
    }

    aggregates.into()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::record::BucketKey;

    use super::aggregate_sequential;

    #[test]
    fn test_sequential_aggregation() {
        let lines = [
            "2025-01-01 00:00:00 1 10",
            "2025-01-01 00:05:00 1 5",
            "bad",
            "2025-01-01 01:00:00 2 1",
        ]
        .map(String::from);

        let aggregates = aggregate_sequential(&lines);
        assert_eq!(aggregates.len(), 2);
        assert_eq!(
            aggregates.get(&BucketKey::from_str("2025-01-01 00").unwrap(), 1),
            Some(15)
        );
        assert_eq!(aggregates.total(), 16);
    }
}
