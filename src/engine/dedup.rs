//! Duplicate alert suppression
//!
//! Alerts are fingerprinted on (action, symbol, exchange, qty, strategy)
//! plus a coarse time bucket `floor(unix_seconds / bucket)`. Two identical
//! alerts one second apart that straddle a bucket boundary are both
//! processed; this is a fixed-bucket window, not a sliding one.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::debug;

use super::alert::Alert;

/// Default bucket width in seconds
pub const DEFAULT_BUCKET_SECONDS: i64 = 10;

/// Default number of fingerprints retained
pub const DEFAULT_CAPACITY: usize = 200;

/// Bounded FIFO of recent alert fingerprints
#[derive(Debug)]
pub struct DedupWindow {
    bucket_seconds: i64,
    capacity: usize,
    history: Mutex<VecDeque<String>>,
}

impl DedupWindow {
    pub fn new(bucket_seconds: i64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bucket_seconds: bucket_seconds.max(1),
            capacity,
            history: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    /// Fingerprint of an alert at the given instant
    pub fn fingerprint(&self, alert: &Alert, now: DateTime<Utc>) -> String {
        let bucket = now.timestamp().div_euclid(self.bucket_seconds);
        format!(
            "{}_{}_{}_{}_{}_{}",
            alert.action.trim(),
            alert.symbol.trim(),
            alert.exchange.trim().to_lowercase(),
            alert.qty.normalize(),
            alert.strategy_name(),
            bucket
        )
    }

    /// Check an alert against the window using the current time
    pub async fn is_duplicate(&self, alert: &Alert) -> bool {
        self.is_duplicate_at(alert, Utc::now()).await
    }

    /// Check an alert against the window at a given instant
    ///
    /// A hit leaves the window unchanged. A miss records the fingerprint
    /// and evicts the oldest entry once the window is over capacity.
    pub async fn is_duplicate_at(&self, alert: &Alert, now: DateTime<Utc>) -> bool {
        let fingerprint = self.fingerprint(alert, now);
        let mut history = self.history.lock().await;

        if history.contains(&fingerprint) {
            debug!(%fingerprint, "Duplicate alert fingerprint");
            return true;
        }

        history.push_back(fingerprint);
        while history.len() > self.capacity {
            history.pop_front();
        }
        false
    }

    /// Number of fingerprints currently held
    pub async fn len(&self) -> usize {
        self.history.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.history.lock().await.is_empty()
    }
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET_SECONDS, DEFAULT_CAPACITY)
    }
}
