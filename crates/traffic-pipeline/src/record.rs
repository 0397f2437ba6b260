use std::{fmt::Display, str::FromStr};

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Serialize, Serializer};

use crate::error::ParseRecordError;

pub type RecordKey = u32;
pub type Quantity = i64;

/// A single measurement, parsed from a `<date> <time> <key> <quantity>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub timestamp: NaiveDateTime,
    pub key: RecordKey,
    pub quantity: Quantity,
}

impl Record {
    pub fn new(timestamp: NaiveDateTime, key: RecordKey, quantity: Quantity) -> Self {
        Self {
            timestamp,
            key,
            quantity,
        }
    }

    pub fn bucket(&self) -> BucketKey {
        BucketKey::from(&self.timestamp)
    }
}

impl FromStr for Record {
    type Err = ParseRecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields = line.split_whitespace().collect::<Vec<_>>();

        let [date, time, key, quantity] = fields.as_slice() else {
            return Err(ParseRecordError::FieldCount(fields.len()));
        };

        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
        let time = NaiveTime::parse_from_str(time, "%H:%M:%S")?;
        let key = key.parse::<RecordKey>().map_err(ParseRecordError::Key)?;
        let quantity = quantity.parse::<Quantity>().map_err(ParseRecordError::Quantity)?;

        Ok(Record::new(date.and_time(time), key, quantity))
    }
}

/// An hour-granular time bucket, rendered as `YYYY-MM-DD HH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey {
    date: NaiveDate,
    hour: u32,
}

impl BucketKey {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// Hours elapsed since the start of the common era, used to spread buckets over lock stripes.
    pub(crate) fn ordinal(&self) -> u64 {
        // Dates before 0001-01-01 fold onto the same stripes as their absolute value.
        u64::from(self.date.num_days_from_ce().unsigned_abs()) * 24 + u64::from(self.hour)
    }
}

impl From<&NaiveDateTime> for BucketKey {
    fn from(timestamp: &NaiveDateTime) -> Self {
        Self {
            date: timestamp.date(),
            hour: timestamp.hour(),
        }
    }
}

impl FromStr for BucketKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let timestamp = NaiveDateTime::parse_from_str(&format!("{s}:00:00"), "%Y-%m-%d %H:%M:%S")?;
        Ok(BucketKey::from(&timestamp))
    }
}

impl Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:02}", self.date.format("%Y-%m-%d"), self.hour)
    }
}

impl Serialize for BucketKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
