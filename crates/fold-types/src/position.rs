use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Where an event sits in chain history.
///
/// Ordering: `timestamp` → `block_number` → `log_index`. A missing log
/// index sorts before any present one; ties that survive this ordering are
/// broken by the stream merger, which records the full key it used.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventPosition {
    /// Block timestamp, seconds since the UNIX epoch.
    pub timestamp: i64,
    /// Block height.
    pub block_number: u64,
    /// Position of the log within its block, when the source provides it.
    pub log_index: Option<u32>,
}

impl EventPosition {
    pub fn new(timestamp: i64, block_number: u64, log_index: Option<u32>) -> Self {
        Self {
            timestamp,
            block_number,
            log_index,
        }
    }

    /// Position with only a timestamp, block number equal to the timestamp.
    ///
    /// Handy for tests where block coordinates do not matter.
    pub fn at(timestamp: i64) -> Self {
        Self::new(timestamp, timestamp.max(0) as u64, None)
    }

    /// Block-level ordinal used by "latest" selections: (block, log index).
    pub fn ordinal(&self) -> (u64, Option<u32>) {
        (self.block_number, self.log_index)
    }

    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    pub fn to_utc(&self) -> Result<DateTime<Utc>, TypeError> {
        timestamp_to_utc(self.timestamp)
    }
}

impl fmt::Debug for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventPosition({self})")
    }
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.log_index {
            Some(log) => write!(f, "t{}@{}.{}", self.timestamp, self.block_number, log),
            None => write!(f, "t{}@{}", self.timestamp, self.block_number),
        }
    }
}

/// Convert unix seconds to a UTC datetime.
pub fn timestamp_to_utc(secs: i64) -> Result<DateTime<Utc>, TypeError> {
    DateTime::from_timestamp(secs, 0).ok_or(TypeError::InvalidTimestamp(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_timestamp_first() {
        let a = EventPosition::new(100, 50, Some(9));
        let b = EventPosition::new(200, 10, Some(0));
        assert!(a < b);
    }

    #[test]
    fn ordering_block_second() {
        let a = EventPosition::new(100, 10, Some(9));
        let b = EventPosition::new(100, 11, Some(0));
        assert!(a < b);
    }

    #[test]
    fn missing_log_index_sorts_first() {
        let a = EventPosition::new(100, 10, None);
        let b = EventPosition::new(100, 10, Some(0));
        assert!(a < b);
        assert!(b.is_after(&a));
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", EventPosition::new(5, 7, Some(3))), "t5@7.3");
        assert_eq!(format!("{}", EventPosition::new(5, 7, None)), "t5@7");
    }

    #[test]
    fn converts_to_utc() {
        let utc = EventPosition::at(1_700_000_000).to_utc().unwrap();
        assert_eq!(utc.timestamp(), 1_700_000_000);
    }
}
