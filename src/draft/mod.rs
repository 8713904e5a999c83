//! Draft persistence
//!
//! A [`Draft`] is the snapshot of an in-progress wizard session. Stores are
//! injected behind the [`DraftStore`] trait; the wizard only ever asks a store
//! to save, load, check or clear, and never sees storage errors: a failed save
//! is reported as `false`, and a corrupt or unreadable draft loads as `None`.

mod file;

pub use file::FileDraftStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

use crate::form::FormValues;

/// Persisted snapshot: `{ "step": .., "data": {..}, "savedAt": "<ISO-8601>" }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Step the user was on (1-based)
    #[serde(rename = "step")]
    pub step_index: u32,
    /// Values entered so far
    #[serde(rename = "data")]
    pub values: FormValues,
    /// When the snapshot was written
    #[serde(rename = "savedAt")]
    pub saved_at: DateTime<Utc>,
}

impl Draft {
    pub fn new(step_index: u32, values: FormValues, saved_at: DateTime<Utc>) -> Self {
        Self {
            step_index,
            values,
            saved_at,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the draft. Fails on a non-finite number, which `serde_json`
    /// would otherwise write as `null` and make the whole draft unreadable.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        if let Some((key, _)) = self.values.iter().find(|(_, value)| !value.is_finite()) {
            return Err(serde::ser::Error::custom(format!(
                "field '{key}' holds a non-finite number"
            )));
        }
        serde_json::to_string(self)
    }

    /// Whether the draft is older than `max_age` at `now`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now.signed_duration_since(self.saved_at) > max_age
    }
}

/// Errors raised inside store implementations. They never cross the
/// [`DraftStore`] boundary.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("draft I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("draft serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("draft store is unavailable: {0}")]
    Unavailable(String),
}

/// Storage for a single draft under a fixed key
pub trait DraftStore: Send + Sync {
    /// Write the draft, replacing any previous one. Returns whether it was persisted.
    fn save(&self, draft: &Draft) -> bool;

    /// Read the draft. Missing or corrupt data yields `None`.
    fn load(&self) -> Option<Draft>;

    /// Whether something is stored under the key
    fn exists(&self) -> bool;

    /// Remove the draft. Clearing an empty store is not an error.
    fn clear(&self);
}

/// In-memory store. Clones share the same slot, so a test can keep a handle
/// after moving a clone into the wizard.
#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    /// Serialized draft, kept as JSON so corrupt contents can be simulated
    slot: Arc<Mutex<Option<String>>>,
    /// When set, every save fails (simulates a full quota)
    fail_saves: Arc<Mutex<bool>>,
    /// Number of successful saves
    saves: Arc<Mutex<usize>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a draft
    pub fn with_draft(draft: &Draft) -> Self {
        let store = Self::new();
        store.save(draft);
        *lock(&store.saves) = 0;
        store
    }

    /// Store pre-seeded with raw (possibly corrupt) contents
    pub fn with_raw(raw: impl Into<String>) -> Self {
        let store = Self::new();
        *lock(&store.slot) = Some(raw.into());
        store
    }

    pub fn set_fail_saves(&self, fail: bool) {
        *lock(&self.fail_saves) = fail;
    }

    pub fn save_count(&self) -> usize {
        *lock(&self.saves)
    }

    pub fn raw(&self) -> Option<String> {
        lock(&self.slot).clone()
    }

    fn try_save(&self, draft: &Draft) -> Result<(), DraftError> {
        if *lock(&self.fail_saves) {
            return Err(DraftError::Unavailable("quota exceeded".to_string()));
        }
        let json = draft.to_json()?;
        *lock(&self.slot) = Some(json);
        *lock(&self.saves) += 1;
        Ok(())
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, draft: &Draft) -> bool {
        match self.try_save(draft) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Draft not saved: {}", e);
                false
            }
        }
    }

    fn load(&self) -> Option<Draft> {
        let raw = lock(&self.slot).clone()?;
        match Draft::from_json(&raw) {
            Ok(draft) => Some(draft),
            Err(e) => {
                tracing::warn!("Ignoring corrupt draft: {}", e);
                None
            }
        }
    }

    fn exists(&self) -> bool {
        lock(&self.slot).is_some()
    }

    fn clear(&self) {
        *lock(&self.slot) = None;
    }
}

/// A poisoned lock only means another holder panicked; the data is still usable
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
