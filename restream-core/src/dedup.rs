//! Webhook delivery deduplication
//!
//! The source platform delivers at-least-once; re-processing a
//! "stream went live" notification must not spawn a second relay. The seen
//! set is test-and-insert under one lock so two concurrent deliveries of the
//! same message cannot both pass.
//!
//! Entries expire after the signature freshness window: a replay older than
//! that is already rejected at verification, so there is no need to remember
//! it here. This keeps the set bounded for a long-running process.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::signature::FRESHNESS_WINDOW_SECS;

/// Process-wide set of already-processed webhook message ids.
pub struct EventDeduplicator {
    seen: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl Default for EventDeduplicator {
    fn default() -> Self {
        Self::new(Duration::from_secs(FRESHNESS_WINDOW_SECS as u64))
    }
}

impl EventDeduplicator {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            seen: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns whether `message_id` was already processed, marking it seen
    /// otherwise. Expired entries are swept on the way in.
    pub fn seen(&self, message_id: &str) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock();
        seen.retain(|_, inserted_at| now.duration_since(*inserted_at) < self.ttl);

        if seen.contains_key(message_id) {
            return true;
        }
        seen.insert(message_id.to_string(), now);
        false
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}
