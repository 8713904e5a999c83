//! Clocks and cancellable timers
//!
//! The wizard runs on a single logical thread. Instead of spawning real timers
//! it records deadlines in [`Timers`] and the host calls `poll` to fire
//! whatever is due. Scheduling a key that is already pending replaces its
//! deadline, which gives debounce semantics: only the last schedule within
//! the window fires. Time comes from an injected [`Clock`], so tests can step
//! a [`ManualClock`] instead of sleeping.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Virtual clock for tests. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn advance_ms(&self, ms: i64) {
        self.advance(chrono::Duration::milliseconds(ms));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pending deadlines keyed by task
#[derive(Debug, Clone)]
pub struct Timers<K: Ord + Clone> {
    pending: BTreeMap<K, DateTime<Utc>>,
}

impl<K: Ord + Clone> Default for Timers<K> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> Timers<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` to fire at `at`. Returns true if an earlier schedule was replaced.
    pub fn schedule(&mut self, key: K, at: DateTime<Utc>) -> bool {
        self.pending.insert(key, at).is_some()
    }

    /// Cancel a pending task. Returns whether it was pending.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.pending.remove(key).is_some()
    }

    /// Cancel everything, returning how many tasks were dropped
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn deadline(&self, key: &K) -> Option<DateTime<Utc>> {
        self.pending.get(key).copied()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove and return every task due at `now`, earliest deadline first
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<K> {
        let mut due: Vec<(DateTime<Utc>, K)> = self
            .pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(key, at)| (*at, key.clone()))
            .collect();
        due.sort_by(|a, b| a.0.cmp(&b.0));

        for (_, key) in &due {
            self.pending.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }
}
