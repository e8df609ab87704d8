//! Per-key hit records and the counting rules applied to them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How a record reports and advances its count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountingMode {
    /// Report-then-increment; the count freezes once the ceiling is reached.
    ///
    /// The first request of a window is always admitted, the request after
    /// the `max_connections`-th is the first rejected, and every later
    /// rejection in the same window reports the same `total_hits`.
    #[default]
    Compat,
    /// Every request is counted, including rejected ones, and the reported
    /// count is the post-increment value. A request is rejected once the
    /// count exceeds `max_connections`.
    Exact,
}

/// Verdict of a single increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncrementResult {
    /// Whether the key is over its ceiling for the current window.
    pub has_passed_limit: bool,
    /// Hit count to report for this request.
    pub total_hits: u64,
    /// When the current window for the key ends.
    pub reset_time: DateTime<Utc>,
}

/// Hit count for one key inside its current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitRecord {
    /// Start of the window.
    pub first_access_time: DateTime<Utc>,
    /// Requests counted since `first_access_time`.
    pub total_hits: u64,
}

impl HitRecord {
    /// Open a window at `now` for a key's first request.
    pub fn open(now: DateTime<Utc>) -> Self {
        Self {
            first_access_time: now,
            total_hits: 1,
        }
    }

    /// End of the window opened at `first_access_time`.
    pub fn reset_time(&self, window: Duration) -> DateTime<Utc> {
        self.first_access_time + window
    }

    /// Whether the window has ended at `now`.
    ///
    /// Windows never renew: traffic inside the window does not push this out.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now >= self.reset_time(window)
    }

    /// Verdict for the request that opened this record.
    pub fn first_result(&self, max_connections: u64, mode: CountingMode, window: Duration) -> IncrementResult {
        let has_passed_limit = match mode {
            CountingMode::Compat => false,
            CountingMode::Exact => self.total_hits > max_connections,
        };

        IncrementResult {
            has_passed_limit,
            total_hits: self.total_hits,
            reset_time: self.reset_time(window),
        }
    }

    /// Count one more request against a live record.
    pub fn hit(&mut self, max_connections: u64, mode: CountingMode, window: Duration) -> IncrementResult {
        let reset_time = self.reset_time(window);

        match mode {
            CountingMode::Compat => {
                // Frozen: report the would-be count without storing it.
                if self.total_hits >= max_connections {
                    return IncrementResult {
                        has_passed_limit: true,
                        total_hits: self.total_hits.saturating_add(1),
                        reset_time,
                    };
                }
                self.total_hits += 1;
                IncrementResult {
                    has_passed_limit: false,
                    total_hits: self.total_hits,
                    reset_time,
                }
            }
            CountingMode::Exact => {
                self.total_hits = self.total_hits.saturating_add(1);
                IncrementResult {
                    has_passed_limit: self.total_hits > max_connections,
                    total_hits: self.total_hits,
                    reset_time,
                }
            }
        }
    }
}
