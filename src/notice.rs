// src/notice.rs
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Deferred UI resets. Each one is independent of the others and of workout data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UiTimer {
    /// Hides the "workout saved" banner.
    SuccessBanner,
    /// Hides the "invalid input" banner.
    ErrorBanner,
    /// Restores the form's display mode after it was hidden.
    FormReset,
}

#[derive(Debug, Default, Clone)]
pub struct Notices {
    due: BTreeMap<UiTimer, DateTime<Utc>>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `timer` to fire `delay_ms` after `now`, replacing a pending one.
    pub fn schedule(&mut self, timer: UiTimer, now: DateTime<Utc>, delay_ms: u64) {
        let delay = Duration::milliseconds(i64::try_from(delay_ms).unwrap_or(i64::MAX / 1_000_000));
        self.due.insert(timer, now + delay);
    }

    pub fn cancel(&mut self, timer: UiTimer) -> bool {
        self.due.remove(&timer).is_some()
    }

    pub fn is_pending(&self, timer: UiTimer) -> bool {
        self.due.contains_key(&timer)
    }

    /// Fires every timer due at or before `now`, in a stable order.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<UiTimer> {
        let fired: Vec<UiTimer> = self
            .due
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(timer, _)| *timer)
            .collect();
        for timer in &fired {
            self.due.remove(timer);
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_fire_once_when_due() {
        let now = Utc::now();
        let mut notices = Notices::new();
        notices.schedule(UiTimer::SuccessBanner, now, 2000);
        notices.schedule(UiTimer::FormReset, now, 1000);

        assert!(notices.tick(now + Duration::milliseconds(500)).is_empty());
        assert_eq!(notices.tick(now + Duration::milliseconds(1000)), vec![UiTimer::FormReset]);
        assert_eq!(notices.tick(now + Duration::seconds(5)), vec![UiTimer::SuccessBanner]);
        assert!(notices.tick(now + Duration::seconds(10)).is_empty());
    }

    #[test]
    fn rescheduling_replaces_and_cancel_removes() {
        let now = Utc::now();
        let mut notices = Notices::new();
        notices.schedule(UiTimer::ErrorBanner, now, 1000);
        notices.schedule(UiTimer::ErrorBanner, now, 3000);
        assert!(notices.tick(now + Duration::milliseconds(2000)).is_empty());
        assert!(notices.cancel(UiTimer::ErrorBanner));
        assert!(!notices.is_pending(UiTimer::ErrorBanner));
    }
}
