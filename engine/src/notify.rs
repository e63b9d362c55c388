use std::{
    fmt,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

/// How long a notification stays visible unless dismissed earlier.
pub const DISMISS_AFTER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Info => "info",
        })
    }
}

/// Fire-and-forget user feedback.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

/// Sends notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Error => tracing::error!(%severity, "{message}"),
            Severity::Success | Severity::Info => tracing::info!(%severity, "{message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub raised_at: Instant,
}

/// Keeps raised notifications until they expire or get dismissed.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    inner: Mutex<CenterState>,
}

#[derive(Debug, Default)]
struct CenterState {
    next_id: u64,
    entries: Vec<Notification>,
}

impl CenterState {
    fn prune(&mut self, now: Instant) {
        self.entries
            .retain(|n| now.saturating_duration_since(n.raised_at) < DISMISS_AFTER);
    }
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise_at(&self, message: &str, severity: Severity, now: Instant) -> u64 {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.prune(now);
        let id = state.next_id;
        state.next_id += 1;
        state.entries.push(Notification {
            id,
            message: message.to_string(),
            severity,
            raised_at: now,
        });
        id
    }

    /// Notifications still visible at `now`, oldest first. Expired ones are dropped.
    pub fn active_at(&self, now: Instant) -> Vec<Notification> {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.prune(now);
        state.entries.clone()
    }

    pub fn active(&self) -> Vec<Notification> {
        self.active_at(Instant::now())
    }

    /// Close a notification early. Returns false if it was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = state.entries.len();
        state.entries.retain(|n| n.id != id);
        state.entries.len() != before
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, message: &str, severity: Severity) {
        self.raise_at(message, severity, Instant::now());
    }
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn notify(&self, message: &str, severity: Severity) {
        (**self).notify(message, severity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_expire_after_the_dismiss_delay() {
        let center = NotificationCenter::new();
        let t0 = Instant::now();
        center.raise_at("saved", Severity::Success, t0);
        center.raise_at("oops", Severity::Error, t0 + Duration::from_secs(3));

        assert_eq!(center.active_at(t0 + Duration::from_secs(4)).len(), 2);
        let left = center.active_at(t0 + Duration::from_secs(6));
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].message, "oops");
        assert!(center.active_at(t0 + Duration::from_secs(9)).is_empty());
    }

    #[test]
    fn raising_drops_expired_entries() {
        let center = NotificationCenter::new();
        let t0 = Instant::now();
        for i in 0..10 {
            center.raise_at("old", Severity::Info, t0 + Duration::from_millis(i));
        }
        center.raise_at("new", Severity::Info, t0 + Duration::from_secs(6));

        let state = center.inner.lock().unwrap();
        assert_eq!(state.entries.len(), 1);
        assert_eq!(state.entries[0].message, "new");
    }

    #[test]
    fn dismiss_closes_early() {
        let center = NotificationCenter::new();
        let now = Instant::now();
        let id = center.raise_at("hello", Severity::Info, now);
        assert!(center.dismiss(id));
        assert!(!center.dismiss(id));
        assert!(center.active_at(now).is_empty());
    }
}
