//! Time-based re-entry guard for the deployment trigger.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

pub const DEFAULT_COOLDOWN_SECS: i64 = 600;

/// Upper bound for a configured cooldown: one year.
pub const MAX_COOLDOWN_SECS: i64 = 365 * 24 * 60 * 60;

/// Source of "now" for the guard.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Debounce for triggers: after an accepted entry, further entries are
/// rejected until `cooldown` has elapsed.
///
/// The guard itself is plain data. Callers that share it must wrap it in a
/// lock that also spans the work it protects.
#[derive(Debug, Clone)]
pub struct ReentryGuard {
    cooldown: Duration,
    last_accepted: Option<DateTime<Utc>>,
}

impl Default for ReentryGuard {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_COOLDOWN_SECS))
    }
}

impl ReentryGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn last_accepted(&self) -> Option<DateTime<Utc>> {
        self.last_accepted
    }

    /// Accept `now` unless it falls inside the cooldown of the last accepted
    /// entry. On accept the stored timestamp moves to `now`.
    ///
    /// A window whose end is past the representable range never closes.
    pub fn try_enter(&mut self, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_accepted {
            match last.checked_add_signed(self.cooldown) {
                Some(open_at) if now >= open_at => {}
                _ => return false,
            }
        }
        self.last_accepted = Some(now);
        true
    }
}
