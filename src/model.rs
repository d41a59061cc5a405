use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::timecalc::weekday_index;

/// Name given to tasks created without one.
pub const PLACEHOLDER_NAME: &str = "Untitled preparation";

/// Appended to the name of a duplicated task.
pub const DUPLICATE_SUFFIX: &str = " (copy)";

pub const DEFAULT_PREP_MINUTES: u32 = 15;
pub const DEFAULT_COOK_MINUTES: u32 = 60;
pub const DEFAULT_PACKING_MINUTES: u32 = 15;
pub const DEFAULT_SHELF_LIFE_DAYS: u32 = 3;

/// Staff used when no roster is configured.
pub const DEFAULT_ROSTER: &[&str] = &["Chef", "Sous-chef", "Commis", "Pastry"];

/// Clock time given to tasks created on a day without an explicit time.
pub fn default_start_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// The lane of the day a task is scheduled in. It is chosen by the user and
/// is not checked against the clock time of the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    Morning,
    Afternoon,
    Evening,
}

impl Shift {
    pub const ALL: [Shift; 3] = [Shift::Morning, Shift::Afternoon, Shift::Evening];

    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::Morning => "morning",
            Shift::Afternoon => "afternoon",
            Shift::Evening => "evening",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shift {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" | "m" => Ok(Shift::Morning),
            "afternoon" | "a" => Ok(Shift::Afternoon),
            "evening" | "e" => Ok(Shift::Evening),
            _ => Err(PlannerError::UnknownShift(s.to_string())),
        }
    }
}

/// A single preparation task. The whole plan is a list of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    pub responsible: String,
    /// Minutes.
    pub prep_time: u32,
    /// Minutes. Cook end is `start_time + cook_time`.
    pub cook_time: u32,
    /// Minutes.
    pub packing_time: u32,
    pub shelf_life_days: u32,
    start_time: NaiveDateTime,
    #[serde(default)]
    day_of_week: u32,
    pub shift: Shift,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl Task {
    /// A task with default durations and a placeholder name.
    pub fn new(
        id: impl Into<String>,
        start_time: NaiveDateTime,
        shift: Shift,
        responsible: impl Into<String>,
    ) -> Self {
        Task {
            id: id.into(),
            name: PLACEHOLDER_NAME.to_string(),
            responsible: responsible.into(),
            prep_time: DEFAULT_PREP_MINUTES,
            cook_time: DEFAULT_COOK_MINUTES,
            packing_time: DEFAULT_PACKING_MINUTES,
            shelf_life_days: DEFAULT_SHELF_LIFE_DAYS,
            start_time,
            day_of_week: weekday_index(start_time),
            shift,
            comments: None,
        }
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    /// 0 = Monday .. 6 = Sunday, always derived from the start time.
    pub fn day_of_week(&self) -> u32 {
        self.day_of_week
    }

    pub fn date(&self) -> NaiveDate {
        self.start_time.date()
    }

    /// Change the start time, keeping the day of the week in sync.
    pub fn set_start_time(&mut self, start_time: NaiveDateTime) {
        self.start_time = start_time;
        self.day_of_week = weekday_index(start_time);
    }

    /// Replace the calendar date, keeping the clock time.
    pub fn set_date(&mut self, date: NaiveDate) {
        self.set_start_time(date.and_time(self.start_time.time()));
    }

    /// Stored records may carry a stale day of the week. Returns whether it
    /// had to be fixed.
    pub(crate) fn repair_day_of_week(&mut self) -> bool {
        let expected = weekday_index(self.start_time);
        if self.day_of_week == expected {
            return false;
        }
        self.day_of_week = expected;
        true
    }
}

/// Optional task fields, used both to create tasks and to edit them. Absent
/// fields fall back to the defaults on creation and are left untouched on
/// edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub name: Option<String>,
    pub responsible: Option<String>,
    pub prep_time: Option<u32>,
    pub cook_time: Option<u32>,
    pub packing_time: Option<u32>,
    pub shelf_life_days: Option<u32>,
    pub start_time: Option<NaiveDateTime>,
    pub shift: Option<Shift>,
    pub comments: Option<String>,
}

impl TaskDraft {
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(name) = &self.name {
            task.name = normalize_name(name);
        }
        if let Some(responsible) = &self.responsible {
            task.responsible = responsible.trim().to_string();
        }
        if let Some(minutes) = self.prep_time {
            task.prep_time = minutes;
        }
        if let Some(minutes) = self.cook_time {
            task.cook_time = minutes;
        }
        if let Some(minutes) = self.packing_time {
            task.packing_time = minutes;
        }
        if let Some(days) = self.shelf_life_days {
            task.shelf_life_days = days;
        }
        if let Some(start_time) = self.start_time {
            task.set_start_time(start_time);
        }
        if let Some(shift) = self.shift {
            task.shift = shift;
        }
        if let Some(comments) = &self.comments {
            let comments = comments.trim();
            task.comments = if comments.is_empty() {
                None
            } else {
                Some(comments.to_string())
            };
        }
    }
}

/// Blank names become the placeholder.
pub fn normalize_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Parse a number of minutes typed by a user. Anything that is not a
/// non-negative number becomes 0; fractions are truncated.
pub fn coerce_minutes(input: &str) -> u32 {
    let input = input.trim();
    if let Ok(value) = input.parse::<i64>() {
        return value.clamp(0, i64::from(u32::MAX)) as u32;
    }
    match input.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value.min(f64::from(u32::MAX)) as u32,
        _ => 0,
    }
}

/// Same rules as [`coerce_minutes`], for shelf life in days.
pub fn coerce_days(input: &str) -> u32 {
    coerce_minutes(input)
}

/// The kitchen staff tasks can be assigned to. Names outside the roster are
/// accepted as free-text overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    members: Vec<String>,
}

impl Roster {
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members
            .into_iter()
            .map(|m| Into::<String>::into(m).trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if members.is_empty() {
            return Roster::default();
        }
        Roster { members }
    }

    /// Parse a comma separated list, e.g. from an environment variable.
    pub fn parse(list: &str) -> Self {
        Roster::new(list.split(','))
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m.eq_ignore_ascii_case(name.trim()))
    }

    /// Responsible assigned to new tasks.
    pub fn default_responsible(&self) -> &str {
        self.members.first().map(String::as_str).unwrap_or("")
    }
}

impl Default for Roster {
    fn default() -> Self {
        Roster {
            members: DEFAULT_ROSTER.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap()
    }

    #[test]
    fn new_task_derives_day_of_week() {
        let task = Task::new("t1", at("2024-06-05T08:00"), Shift::Morning, "Chef");
        assert_eq!(task.day_of_week(), 2);
        assert_eq!(task.name, PLACEHOLDER_NAME);
        assert_eq!(task.cook_time, DEFAULT_COOK_MINUTES);
    }

    #[test]
    fn set_date_keeps_clock_time() {
        let mut task = Task::new("t1", at("2024-06-03T14:45"), Shift::Afternoon, "Chef");
        task.set_date(NaiveDate::from_ymd_opt(2024, 6, 7).unwrap());
        assert_eq!(task.start_time(), at("2024-06-07T14:45"));
        assert_eq!(task.day_of_week(), 4);
    }

    #[test]
    fn draft_only_touches_present_fields() {
        let mut task = Task::new("t1", at("2024-06-03T08:00"), Shift::Morning, "Chef");
        let draft = TaskDraft {
            name: Some("  ".to_string()),
            cook_time: Some(90),
            comments: Some("no salt".to_string()),
            ..TaskDraft::default()
        };
        draft.apply_to(&mut task);
        assert_eq!(task.name, PLACEHOLDER_NAME);
        assert_eq!(task.cook_time, 90);
        assert_eq!(task.prep_time, DEFAULT_PREP_MINUTES);
        assert_eq!(task.responsible, "Chef");
        assert_eq!(task.comments.as_deref(), Some("no salt"));
    }

    #[test]
    fn empty_comment_clears_comments() {
        let mut task = Task::new("t1", at("2024-06-03T08:00"), Shift::Morning, "Chef");
        task.comments = Some("old".to_string());
        TaskDraft {
            comments: Some(String::new()),
            ..TaskDraft::default()
        }
        .apply_to(&mut task);
        assert_eq!(task.comments, None);
    }

    #[test]
    fn invalid_numbers_coerce_to_zero() {
        assert_eq!(coerce_minutes("45"), 45);
        assert_eq!(coerce_minutes(" 12 "), 12);
        assert_eq!(coerce_minutes("12.7"), 12);
        assert_eq!(coerce_minutes("-5"), 0);
        assert_eq!(coerce_minutes("abc"), 0);
        assert_eq!(coerce_minutes(""), 0);
        assert_eq!(coerce_minutes("NaN"), 0);
        assert_eq!(coerce_days("2"), 2);
    }

    #[test]
    fn shift_parses_names_and_initials() {
        assert_eq!("Morning".parse::<Shift>().unwrap(), Shift::Morning);
        assert_eq!("a".parse::<Shift>().unwrap(), Shift::Afternoon);
        assert_eq!("evening".parse::<Shift>().unwrap(), Shift::Evening);
        assert!("night".parse::<Shift>().is_err());
    }

    #[test]
    fn task_serializes_with_camel_case_fields() {
        let task = Task::new("t1", at("2024-06-03T08:00"), Shift::Morning, "Chef");
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["startTime"], "2024-06-03T08:00:00");
        assert_eq!(json["dayOfWeek"], 0);
        assert_eq!(json["shelfLifeDays"], DEFAULT_SHELF_LIFE_DAYS);
        assert_eq!(json["shift"], "morning");
        assert!(json.get("comments").is_none());
    }

    #[test]
    fn roster_falls_back_to_default() {
        assert_eq!(Roster::parse(" , "), Roster::default());
        let roster = Roster::parse("Ana, Luis");
        assert_eq!(roster.default_responsible(), "Ana");
        assert!(roster.contains("luis"));
        assert!(!roster.contains("Marta"));
    }
}
