// src/utils.rs
// Shared helpers for block-range batching and date bucketing.

use chrono::{DateTime, NaiveDate, Utc};

/// Splits `[from_block, to_block]` into contiguous inclusive sub-ranges no
/// larger than `chunk_size` blocks. The chain reader issues one provider
/// call per sub-range.
pub fn block_chunks(from_block: u64, to_block: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let mut chunks = Vec::new();
    if chunk_size == 0 || from_block > to_block {
        return chunks;
    }
    let mut start = from_block;
    while start <= to_block {
        let end = std::cmp::min(start.saturating_add(chunk_size - 1), to_block);
        chunks.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    chunks
}

/// UTC calendar date for a unix timestamp. Timestamps before the epoch or
/// out of chrono's range collapse to the epoch date.
pub fn utc_date(timestamp_secs: u64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp(timestamp_secs as i64, 0)
        .map(|dt| dt.date_naive())
        .unwrap_or(NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date"))
}

/// Current unix time in seconds.
pub fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Initializes env_logger at the configured level. `RUST_LOG` still wins
/// when set. Safe to call more than once; later calls are no-ops.
pub fn init_logging(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_range_without_overlap() {
        let chunks = block_chunks(100, 350, 100);
        assert_eq!(chunks, vec![(100, 199), (200, 299), (300, 350)]);
    }

    #[test]
    fn single_block_range() {
        assert_eq!(block_chunks(5, 5, 100), vec![(5, 5)]);
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(block_chunks(10, 5, 100).is_empty());
    }

    #[test]
    fn date_bucketing() {
        // 2021-01-01T00:00:00Z
        assert_eq!(
            utc_date(1_609_459_200),
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
        );
        // One second before midnight lands on the previous day.
        assert_eq!(
            utc_date(1_609_459_199),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap()
        );
    }
}
