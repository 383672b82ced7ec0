//! Cooperative scan clock.
//!
//! The clock never fires on its own: the owner asks for the next deadline,
//! waits until then (or until some other event arrives) and calls
//! [`ScanClock::poll`]. Deadlines are anchored to the previous *scheduled*
//! time, so processing latency does not accumulate into drift.

use crate::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// When this tick was due; may be earlier than the poll time.
    pub scheduled: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub struct ScanClock {
    interval_ms: u64,
    next_due: Option<Timestamp>,
}

impl ScanClock {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            next_due: None,
        }
    }

    /// Start (or restart) ticking; the first tick is one interval from `now`.
    pub fn start(&mut self, now: Timestamp) {
        self.next_due = Some(now + self.interval_ms.max(1));
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Restart the interval without an immediate tick. No-op when stopped.
    pub fn reset(&mut self, now: Timestamp) {
        if self.next_due.is_some() {
            self.start(now);
        }
    }

    /// Takes effect from the next scheduled tick onwards.
    pub fn set_interval(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms;
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.next_due
    }

    /// Deliver the tick that is due at `now`, if any.
    ///
    /// When several deadlines have passed only one tick is delivered and
    /// the schedule jumps ahead on the same phase.
    pub fn poll(&mut self, now: Timestamp) -> Option<Tick> {
        let due = self.next_due?;
        if now < due {
            return None;
        }
        let interval = self.interval_ms.max(1);
        let missed = (now - due) / interval;
        let scheduled = due + missed * interval;
        self.next_due = Some(scheduled + interval);
        Some(Tick { scheduled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_clock_never_ticks() {
        let mut c = ScanClock::new(500);
        assert!(!c.is_running());
        assert_eq!(c.poll(10_000), None);
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn ticks_at_fixed_interval() {
        let mut c = ScanClock::new(500);
        c.start(0);
        assert_eq!(c.poll(499), None);
        assert_eq!(c.poll(500), Some(Tick { scheduled: 500 }));
        assert_eq!(c.poll(500), None);
        assert_eq!(c.next_deadline(), Some(1000));
    }

    #[test]
    fn late_poll_does_not_drift() {
        let mut c = ScanClock::new(500);
        c.start(0);
        assert_eq!(c.poll(530), Some(Tick { scheduled: 500 }));
        assert_eq!(c.next_deadline(), Some(1000));
    }

    #[test]
    fn stall_coalesces_missed_ticks() {
        let mut c = ScanClock::new(500);
        c.start(0);
        assert_eq!(c.poll(1720), Some(Tick { scheduled: 1500 }));
        assert_eq!(c.next_deadline(), Some(2000));
    }

    #[test]
    fn reset_restarts_interval() {
        let mut c = ScanClock::new(500);
        c.start(0);
        c.reset(300);
        assert_eq!(c.poll(500), None);
        assert_eq!(c.next_deadline(), Some(800));
    }

    #[test]
    fn reset_when_stopped_stays_stopped() {
        let mut c = ScanClock::new(500);
        c.reset(300);
        assert!(!c.is_running());
    }

    #[test]
    fn interval_change_applies_after_next_tick() {
        let mut c = ScanClock::new(500);
        c.start(0);
        c.set_interval(200);
        assert_eq!(c.next_deadline(), Some(500));
        assert!(c.poll(500).is_some());
        assert_eq!(c.next_deadline(), Some(700));
    }
}
