//! Connectivity and auto-save indicator
//!
//! Passive: it follows online/offline transitions reported by the host and
//! the wizard's save signal, and renders a status line. It never gates the
//! wizard.

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

/// What the indicator currently shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSnapshot {
    pub is_online: bool,
    pub last_saved: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct ConnectivityIndicator {
    is_online: bool,
    saves: watch::Receiver<Option<DateTime<Utc>>>,
}

impl ConnectivityIndicator {
    /// Follow a wizard's save signal (see `Wizard::subscribe_saves`), starting online
    pub fn new(saves: watch::Receiver<Option<DateTime<Utc>>>) -> Self {
        Self {
            is_online: true,
            saves,
        }
    }

    /// Apply a connectivity transition. Returns whether the state changed.
    pub fn handle(&mut self, event: ConnectivityEvent) -> bool {
        let online = event == ConnectivityEvent::Online;
        if online == self.is_online {
            return false;
        }
        debug!(online, "Connectivity changed");
        self.is_online = online;
        true
    }

    /// Whether a save happened since the last call
    pub fn take_save_notification(&mut self) -> bool {
        let changed = self.saves.has_changed().unwrap_or(false);
        if changed {
            self.saves.mark_unchanged();
        }
        changed
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        IndicatorSnapshot {
            is_online: self.is_online,
            last_saved: *self.saves.borrow(),
        }
    }

    /// One-line rendering, e.g. `Online | Saved 2 min ago`
    pub fn status_line(&self, now: DateTime<Utc>) -> String {
        let snapshot = self.snapshot();
        let connectivity = if snapshot.is_online { "Online" } else { "Offline" };
        let saved = match snapshot.last_saved {
            Some(at) => format!("Saved {}", describe_age(now, at)),
            None => "Not saved yet".to_string(),
        };
        format!("{connectivity} | {saved}")
    }
}

fn describe_age(now: DateTime<Utc>, at: DateTime<Utc>) -> String {
    let age = now.signed_duration_since(at);
    if age.num_seconds() < 60 {
        "just now".to_string()
    } else if age.num_minutes() < 60 {
        format!("{} min ago", age.num_minutes())
    } else {
        format!("at {}", at.format("%Y-%m-%d %H:%M UTC"))
    }
}
