use std::cell::Cell;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use tracing::warn;

/// Source of the current local time. Injected wherever "now" matters so
/// tests can run against a fixed instant.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Local device time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Cell<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        FixedClock { now: Cell::new(now) }
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }

    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// Fixed-rate polling. Each deadline is one interval after the previous
/// deadline, so time spent inside a poll does not push later polls back.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: StdDuration,
    next: Instant,
}

impl PollSchedule {
    /// Start a schedule whose first poll happens at `first`.
    pub fn new(interval: StdDuration, first: Instant) -> Self {
        PollSchedule {
            interval,
            next: first + interval,
        }
    }

    pub fn interval(&self) -> StdDuration {
        self.interval
    }

    /// How long to sleep from `now` until the next poll. Advances the
    /// deadline. A schedule more than one interval behind restarts from
    /// `now` instead of firing a burst of late polls.
    pub fn wait(&mut self, now: Instant) -> StdDuration {
        if now > self.next + self.interval {
            warn!(behind = ?now.duration_since(self.next), "poll schedule fell behind");
            self.next = now;
        }
        let wait = self.next.saturating_duration_since(now);
        self.next += self.interval;
        wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: StdDuration = StdDuration::from_secs(60);

    #[test]
    fn polls_do_not_drift_with_slow_work() {
        let origin = Instant::now();
        let mut schedule = PollSchedule::new(MINUTE, origin);
        let mut now = origin;
        for poll in 1..=500u32 {
            now += StdDuration::from_millis(35);
            now += schedule.wait(now);
            assert_eq!(now, origin + MINUTE * poll);
        }
    }

    #[test]
    fn far_behind_schedule_restarts_from_now() {
        let origin = Instant::now();
        let mut schedule = PollSchedule::new(MINUTE, origin);
        let late = origin + StdDuration::from_secs(200);
        assert_eq!(schedule.wait(late), StdDuration::ZERO);
        assert_eq!(schedule.wait(late + StdDuration::from_secs(1)), StdDuration::from_secs(59));
    }

    #[test]
    fn fixed_clock_moves_only_when_told() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 3)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));
        assert_eq!((&clock).today(), start.date());
    }
}
