//! Utility functions for the match broker

use crate::types::MatchIdx;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Offset between 64-bit Steam ids and 32-bit account ids
pub const STEAM_ID64_BASE: u64 = 76_561_197_960_265_728;

static LAST_MATCH_IDX: AtomicI64 = AtomicI64::new(0);

/// Generate a new match index from the current nanosecond timestamp
///
/// Indices are strictly increasing within the process, so two matches
/// scheduled in the same nanosecond still get distinct keys.
pub fn generate_match_idx() -> MatchIdx {
    let now = Utc::now();
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros() * 1000);

    let mut last = LAST_MATCH_IDX.load(Ordering::SeqCst);
    loop {
        let next = nanos.max(last + 1);
        match LAST_MATCH_IDX.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return next.to_string(),
            Err(current) => last = current,
        }
    }
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a requested start time.
///
/// Accepts RFC 3339 timestamps or unix epoch seconds. An empty string means
/// "start now" and yields `None`.
pub fn parse_start_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    value.parse::<i64>().ok().and_then(epoch_to_datetime)
}

/// Convert unix epoch seconds into a timestamp
pub fn epoch_to_datetime(epoch: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(epoch, 0).single()
}

/// Convert a 64-bit Steam id into the 32-bit account id used by stats services
pub fn steam_id_to_account_id(steam_id: u64) -> u64 {
    if steam_id >= STEAM_ID64_BASE {
        steam_id - STEAM_ID64_BASE
    } else {
        steam_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_match_idx_is_numeric() {
        let idx = generate_match_idx();
        assert!(!idx.is_empty());
        assert!(idx.parse::<i64>().is_ok());
    }

    #[test]
    fn test_generate_match_idx_is_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| generate_match_idx()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_parse_start_time() {
        assert_eq!(parse_start_time(""), None);
        assert_eq!(parse_start_time("   "), None);
        assert_eq!(parse_start_time("not a time"), None);

        let parsed = parse_start_time("2026-01-02T03:04:05Z").unwrap();
        assert_eq!(parsed.timestamp(), 1_767_323_045);

        let parsed = parse_start_time("1700000000").unwrap();
        assert_eq!(parsed.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_steam_id_to_account_id() {
        assert_eq!(steam_id_to_account_id(76_561_197_960_265_729), 1);
        assert_eq!(steam_id_to_account_id(12345), 12345);
    }
}
