//! In-memory fixed-window hit store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, trace};

use super::backend::HitStore;
use super::clock::{Clock, SystemClock};
use super::record::{CountingMode, HitRecord, IncrementResult};
use crate::error::Result;

/// Default window length when none is configured.
pub const DEFAULT_WINDOW_SECONDS: u64 = 60;
/// Default hit ceiling when none is configured.
pub const DEFAULT_MAX_CONNECTIONS: u64 = 5;
/// Longest supported window (100 years); longer windows are clamped.
const MAX_WINDOW_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

/// Tracks hit counts per client key inside fixed windows.
///
/// Records live in a sharded map, so increments on the same key are
/// serialized by that key's shard lock while keys in other shards proceed in
/// parallel. This struct is thread-safe and can be shared across tasks.
pub struct WindowStore {
    /// Hit records indexed by client key
    hits: DashMap<String, HitRecord>,
    /// Window length as configured
    window_seconds: u64,
    /// Window length used for arithmetic
    window: Duration,
    /// Hit ceiling per window
    max_connections: u64,
    /// How counts are reported and advanced
    mode: CountingMode,
    /// Time source
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for WindowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowStore")
            .field("window_seconds", &self.window_seconds)
            .field("max_connections", &self.max_connections)
            .field("mode", &self.mode)
            .field("records", &self.hits.len())
            .finish()
    }
}

impl WindowStore {
    /// Create a store with the given window and ceiling, using the system clock.
    pub fn new(window_seconds: u64, max_connections: u64) -> Self {
        let clamped = window_seconds.min(MAX_WINDOW_SECONDS);
        Self {
            hits: DashMap::new(),
            window_seconds,
            window: Duration::seconds(clamped as i64),
            max_connections,
            mode: CountingMode::default(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `mode` for counting.
    pub fn with_counting_mode(mut self, mode: CountingMode) -> Self {
        self.mode = mode;
        self
    }

    /// Use `clock` as the time source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Count one request for `key`.
    ///
    /// Expired records are replaced in place, so a key's next request after
    /// its window ends behaves as if the key were new.
    pub fn hit(&self, key: &str) -> IncrementResult {
        let now = self.clock.now();
        let window = self.window;

        let result = match self.hits.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if record.is_expired(now, window) {
                    debug!(key = %key, "Window expired, opening a new one");
                    *record = HitRecord::open(now);
                    record.first_result(self.max_connections, self.mode, window)
                } else {
                    record.hit(self.max_connections, self.mode, window)
                }
            }
            Entry::Vacant(entry) => {
                debug!(
                    key = %key,
                    window_seconds = self.window_seconds,
                    max_connections = self.max_connections,
                    "Creating new hit record"
                );
                let record = entry.insert(HitRecord::open(now));
                record.first_result(self.max_connections, self.mode, window)
            }
        };

        trace!(
            key = %key,
            total_hits = result.total_hits,
            has_passed_limit = result.has_passed_limit,
            "Counted hit"
        );

        result
    }

    /// Remove the record for `key`. Returns whether one existed.
    pub fn reset(&self, key: &str) -> bool {
        let removed = self.hits.remove(key).is_some();
        if removed {
            debug!(key = %key, "Hit record reset");
        }
        removed
    }

    /// Remove every record whose window has ended.
    ///
    /// Returns the number of records removed.
    pub fn clean_store(&self) -> usize {
        let now = self.clock.now();
        let window = self.window;
        let before = self.hits.len();

        self.hits.retain(|_, record| !record.is_expired(now, window));

        let removed = before.saturating_sub(self.hits.len());
        if removed > 0 {
            info!(removed, remaining = self.hits.len(), "Swept expired hit records");
        }
        removed
    }

    /// Snapshot of the live record for `key`, if any.
    pub fn get(&self, key: &str) -> Option<HitRecord> {
        let now = self.clock.now();
        self.hits
            .get(key)
            .filter(|record| !record.is_expired(now, self.window))
            .map(|record| record.value().clone())
    }

    /// Number of records held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Remove all records.
    pub fn clear(&self) {
        self.hits.clear();
    }

    /// Counting mode in use.
    pub fn counting_mode(&self) -> CountingMode {
        self.mode
    }
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECONDS, DEFAULT_MAX_CONNECTIONS)
    }
}

#[async_trait]
impl HitStore for WindowStore {
    async fn increment(&self, key: &str) -> Result<IncrementResult> {
        Ok(self.hit(key))
    }

    async fn reset_key(&self, key: &str) -> Result<()> {
        self.reset(key);
        Ok(())
    }

    fn max_connections(&self) -> u64 {
        self.max_connections
    }

    fn window_seconds(&self) -> u64 {
        self.window_seconds
    }
}
