//! Pure time arithmetic over tasks: cook end, expiry, weekday index, the
//! Monday–Friday week window, and parsing of user supplied times.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::{PlannerError, Result};
use crate::model::{Shift, Task};

/// Days shown on the grid, Monday to Friday.
pub const DISPLAYED_DAYS: u32 = 5;

const MAX_WEEK_OFFSET: i64 = 1_000_000;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Start time plus cook time.
pub fn cook_end(task: &Task) -> NaiveDateTime {
    add_or_saturate(task.start_time(), Duration::minutes(i64::from(task.cook_time)))
}

/// Cook end plus the shelf life in whole days.
pub fn expiry(task: &Task) -> NaiveDateTime {
    add_or_saturate(cook_end(task), Duration::days(i64::from(task.shelf_life_days)))
}

/// 0 = Monday .. 6 = Sunday.
pub fn weekday_index(timestamp: NaiveDateTime) -> u32 {
    timestamp.weekday().num_days_from_monday()
}

fn add_or_saturate(timestamp: NaiveDateTime, delta: Duration) -> NaiveDateTime {
    timestamp
        .checked_add_signed(delta)
        .unwrap_or(NaiveDateTime::MAX)
}

impl Shift {
    /// The lane a clock time naturally falls in. Only used as a default.
    pub fn suggested_for(time: NaiveTime) -> Shift {
        match time.hour() {
            0..=11 => Shift::Morning,
            12..=17 => Shift::Afternoon,
            _ => Shift::Evening,
        }
    }
}

/// The working week shown on the plan: Monday to Friday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    /// The week of `today` moved by `offset` weeks. Negative offsets page
    /// back, positive ones forward.
    pub fn for_offset(today: NaiveDate, offset: i64) -> Self {
        let offset = offset.clamp(-MAX_WEEK_OFFSET, MAX_WEEK_OFFSET);
        let shifted = today
            .checked_add_signed(Duration::weeks(offset))
            .unwrap_or(today);
        let back = Duration::days(i64::from(shifted.weekday().num_days_from_monday()));
        let start = shifted.checked_sub_signed(back).unwrap_or(shifted);
        let end = start
            .checked_add_signed(Duration::days(i64::from(DISPLAYED_DAYS - 1)))
            .unwrap_or(start);
        WeekWindow { start, end }
    }

    pub fn containing(date: NaiveDate) -> Self {
        WeekWindow::for_offset(date, 0)
    }

    /// Whether `date` falls between Monday and Friday of this week.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Whether `date` is the Saturday or Sunday after this window.
    pub fn weekend_contains(&self, date: NaiveDate) -> bool {
        let offset = (date - self.start).num_days();
        offset == 5 || offset == 6
    }

    /// The date of day `index` (0 = Monday).
    pub fn day(&self, index: u32) -> NaiveDate {
        self.start
            .checked_add_signed(Duration::days(i64::from(index)))
            .unwrap_or(self.start)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..DISPLAYED_DAYS).map(move |index| self.day(index))
    }

    pub fn next(&self) -> Self {
        WeekWindow::for_offset(self.start, 1)
    }

    pub fn previous(&self) -> Self {
        WeekWindow::for_offset(self.start, -1)
    }

    pub fn label(&self) -> String {
        format!(
            "Week {} · {} to {}",
            self.start.iso_week().week(),
            self.start.format("%d %b"),
            self.end.format("%d %b %Y")
        )
    }
}

/// Parse a start timestamp typed by the user. Malformed input is rejected
/// rather than guessed at.
pub fn parse_start_time(input: &str) -> Result<NaiveDateTime> {
    let input = input.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .ok_or_else(|| PlannerError::InvalidTimestamp(input.to_string()))
}

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| PlannerError::InvalidDate(input.to_string()))
}

pub fn parse_clock(input: &str) -> Result<NaiveTime> {
    let input = input.trim();
    NaiveTime::parse_from_str(input, "%H:%M")
        .map_err(|_| PlannerError::InvalidTime(input.to_string()))
}
