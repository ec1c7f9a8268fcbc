use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Watched item
// ---------------------------------------------------------------------------

/// One tracked product, as persisted in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedItem {
    pub id: String,
    pub url: String,
    pub description: String,
    /// Last observed price. None until the first successful scan.
    pub current_price: Option<f64>,
    /// Last observed point/rebate value.
    pub points: Option<f64>,
    /// Whether the last scan classified this item as on sale. Independent of
    /// whether a notification actually went out — the throttle may suppress.
    pub has_sale: bool,
    /// Set only when a notification was dispatched for this item.
    pub last_notification: Option<String>,
    pub updated_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Scrape result
// ---------------------------------------------------------------------------

/// Raw record scraped from a product page.
#[derive(Debug, Clone)]
pub struct PageInfo {
    pub title: String,
    pub current_price: Option<f64>,
    pub list_price: Option<f64>,
    pub point_value: f64,
}

// ---------------------------------------------------------------------------
// Sale candidate
// ---------------------------------------------------------------------------

/// An item that qualified for notification this cycle, after throttling.
/// Transient — consumed by the notifier and dropped.
#[derive(Debug, Clone, Serialize)]
pub struct SaleCandidate {
    pub id: String,
    pub title: String,
    pub current_price: f64,
    pub list_price: f64,
    pub point_value: f64,
    pub effective_price: f64,
    pub discount_percentage: f64,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Run lock
// ---------------------------------------------------------------------------

/// The singleton lock record, stored under the reserved id.
#[derive(Debug, Clone)]
pub struct RunLock {
    pub status: String,
    pub started_at: String,
    pub expires_at: String,
    pub function_name: String,
}

// ---------------------------------------------------------------------------
// Cycle trigger / outcome
// ---------------------------------------------------------------------------

/// Where a cycle request came from. On-demand cycles skip rescheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOrigin {
    Schedule,
    OnDemand,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub processed_items_count: usize,
    pub sale_items_count: usize,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle holds the run lock. Not an error — no work was done.
    Busy,
    Failed(String),
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub fn now_naive() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn format_timestamp(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a persisted ISO-8601 naive timestamp. Tolerates a trailing 'Z' and
/// missing fractional seconds. None means the stored value is unusable.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim().trim_end_matches('Z');
    s.parse::<NaiveDateTime>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_roundtrip() {
        // Persisted precision is microseconds.
        let t = chrono::NaiveDate::from_ymd_opt(2026, 8, 30)
            .unwrap()
            .and_hms_micro_opt(12, 34, 56, 789_012)
            .unwrap();
        let parsed = parse_timestamp(&format_timestamp(t)).expect("roundtrip");
        assert_eq!(parsed, t);
    }

    #[test]
    fn parse_tolerates_z_suffix_and_no_fraction() {
        assert!(parse_timestamp("2026-08-30T12:34:56Z").is_some());
        assert!(parse_timestamp("2026-08-30T12:34:56").is_some());
        assert!(parse_timestamp("2026-08-30T12:34:56.123456").is_some());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_timestamp("not-a-date").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
