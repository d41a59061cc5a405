use std::time::Duration as StdDuration;

use chrono::NaiveDateTime;
use humantime::format_duration;
use prettytable::{format, Cell, Row, Table};

use crate::model::{Shift, Task};
use crate::timecalc::{cook_end, expiry, WeekWindow};

/// Where a task stands relative to the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Cooking,
    Cooked,
}

pub fn state_at(task: &Task, now: NaiveDateTime) -> TaskState {
    if now < task.start_time() {
        TaskState::Pending
    } else if now < cook_end(task) {
        TaskState::Cooking
    } else {
        TaskState::Cooked
    }
}

/// Format a number of minutes, e.g. `1h 30m`.
pub fn fmt_minutes(minutes: u32) -> String {
    if minutes == 0 {
        return "0m".to_string();
    }
    format_duration(StdDuration::from_secs(u64::from(minutes) * 60)).to_string()
}

/// Text snippets for printing a task.
pub trait TaskLabels {
    fn fmt_start(&self) -> String;
    fn fmt_window(&self) -> String;
    fn fmt_durations(&self) -> String;
    fn fmt_shelf_life(&self) -> String;
    fn fmt_expiry(&self) -> String;
}

impl TaskLabels for Task {
    fn fmt_start(&self) -> String {
        self.start_time().format("%H:%M").to_string()
    }

    fn fmt_window(&self) -> String {
        format!("{}-{}", self.fmt_start(), cook_end(self).format("%H:%M"))
    }

    fn fmt_durations(&self) -> String {
        format!(
            "prep {} · cook {} · packing {}",
            fmt_minutes(self.prep_time),
            fmt_minutes(self.cook_time),
            fmt_minutes(self.packing_time)
        )
    }

    fn fmt_shelf_life(&self) -> String {
        match self.shelf_life_days {
            1 => "1 day".to_string(),
            days => format!("{} days", days),
        }
    }

    fn fmt_expiry(&self) -> String {
        expiry(self).format("%a %d %b %Y %H:%M").to_string()
    }
}

/// A shift × weekday table of the tasks in `window`. `tasks` should already
/// be sorted by start time; `cell` renders one task inside a cell.
pub fn week_grid<F>(tasks: &[&Task], window: &WeekWindow, mut cell: F) -> Table
where
    F: FnMut(&Task) -> String,
{
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);

    let mut titles = vec![Cell::new("")];
    titles.extend(
        window
            .days()
            .map(|day| Cell::new(&day.format("%a %d/%m").to_string())),
    );
    table.set_titles(Row::new(titles));

    for shift in Shift::ALL.iter().copied() {
        let mut cells = vec![Cell::new(shift.as_str())];
        for day in window.days() {
            let lines: Vec<String> = tasks
                .iter()
                .filter(|t| t.shift == shift && t.date() == day)
                .map(|t| cell(t))
                .collect();
            cells.push(Cell::new(&lines.join("\n")));
        }
        table.add_row(Row::new(cells));
    }
    table
}

/// The plan for the week as shown by `prepweek list`.
pub fn render_week(
    tasks: &[&Task],
    weekend_count: usize,
    window: &WeekWindow,
    now: NaiveDateTime,
) -> String {
    let grid = week_grid(tasks, window, |task| {
        let marker = match state_at(task, now) {
            TaskState::Pending => "",
            TaskState::Cooking => "▶ ",
            TaskState::Cooked => "✓ ",
        };
        format!(
            "{}{} {} ({})\n  {}",
            marker,
            task.fmt_start(),
            task.name,
            task.responsible,
            short_id(&task.id)
        )
    });

    let mut out = format!("{}\n{}", window.label(), grid);
    if tasks.is_empty() {
        out.push_str("No tasks planned this week.\n");
    }
    if weekend_count > 0 {
        out.push_str(&format!(
            "{} task(s) on the weekend are not shown.\n",
            weekend_count
        ));
    }
    out
}

/// Details of a single task as shown by `prepweek show`.
pub fn render_task(task: &Task) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.add_row(row!["id", task.id]);
    table.add_row(row!["name", task.name]);
    table.add_row(row!["responsible", task.responsible]);
    table.add_row(row![
        "start",
        task.start_time().format("%a %d %b %Y %H:%M").to_string()
    ]);
    table.add_row(row!["shift", task.shift]);
    table.add_row(row!["cooking", task.fmt_window()]);
    table.add_row(row!["durations", task.fmt_durations()]);
    table.add_row(row!["shelf life", task.fmt_shelf_life()]);
    table.add_row(row!["expires", task.fmt_expiry()]);
    if let Some(comments) = &task.comments {
        table.add_row(row!["comments", textwrap::fill(comments, 60)]);
    }
    table.to_string()
}

/// The first block of a UUID, enough to address a task from the CLI.
pub fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}
