//! Printable weekly plan: a shift × weekday summary followed by one card
//! per task in start order.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::error::Result;
use crate::model::Task;
use crate::timecalc::{cook_end, WeekWindow};
use crate::view::{week_grid, TaskLabels};

const CARD_WIDTH: usize = 72;

/// Render the plan for `window`. `tasks` may contain the whole plan; only
/// tasks from Monday to Friday of the window are printed.
pub fn render(tasks: &[Task], window: &WeekWindow) -> String {
    let mut week: Vec<&Task> = tasks.iter().filter(|t| window.contains(t.date())).collect();
    week.sort_by_key(|t| t.start_time());

    let mut out = String::new();
    out.push_str("PRODUCTION PLAN\n");
    out.push_str(&format!("{}\n", window.label()));
    out.push_str(&format!(
        "Week starting {}\n\n",
        window.start.format("%A %d %B %Y")
    ));

    let grid = week_grid(&week, window, |t| format!("{} {}", t.fmt_start(), t.name));
    out.push_str(&grid.to_string());

    if week.is_empty() {
        out.push_str("\nNo tasks planned this week.\n");
        return out;
    }

    out.push_str(&format!("\nTASK DETAILS ({})\n", week.len()));
    for task in week {
        out.push_str(&card(task));
    }
    out
}

fn card(task: &Task) -> String {
    let rule = "-".repeat(CARD_WIDTH);
    let mut out = format!("{}\n", rule);
    out.push_str(&format!(
        "{}\n{} · {} shift · {}\n",
        task.name,
        task.start_time().format("%a %d/%m"),
        task.shift,
        task.responsible
    ));
    out.push_str(&format!(
        "Start {} · cook end {}\n",
        task.fmt_start(),
        cook_end(task).format("%H:%M")
    ));
    out.push_str(&format!("{}\n", task.fmt_durations()));
    out.push_str(&format!(
        "Shelf life {} · expires {}\n",
        task.fmt_shelf_life(),
        task.fmt_expiry()
    ));
    if let Some(comments) = &task.comments {
        out.push_str("Comments:\n");
        let wrapped = textwrap::fill(comments.trim(), CARD_WIDTH - 2);
        out.push_str(&textwrap::indent(&wrapped, "  "));
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Write the rendered plan to `path`. The file only appears once it is
/// complete; an existing file is replaced.
pub fn write(path: &Path, tasks: &[Task], window: &WeekWindow) -> Result<()> {
    let document = render(tasks, window);

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(document.as_bytes())?;
    file.flush()?;
    file.persist(path).map_err(|err| err.error)?;

    info!(path = %path.display(), "plan exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Shift;
    use crate::timecalc::{parse_date, parse_start_time};

    fn task(id: &str, start: &str, name: &str) -> Task {
        let mut task = Task::new(id, parse_start_time(start).unwrap(), Shift::Morning, "Chef");
        task.name = name.to_string();
        task.cook_time = 90;
        task
    }

    fn window() -> WeekWindow {
        WeekWindow::containing(parse_date("2024-06-03").unwrap())
    }

    #[test]
    fn cards_follow_start_order() {
        let tasks = vec![
            task("b", "2024-06-04T10:00", "Braise"),
            task("a", "2024-06-03T08:00", "Aioli"),
            task("c", "2024-06-11T08:00", "Next week"),
        ];
        let doc = render(&tasks, &window());

        assert!(doc.starts_with("PRODUCTION PLAN\nWeek 23"));
        assert!(doc.contains("Week starting Monday 03 June 2024"));
        assert!(doc.contains("TASK DETAILS (2)"));
        assert!(!doc.contains("Next week"));
        let details = &doc[doc.find("TASK DETAILS").unwrap()..];
        assert!(details.find("Aioli").unwrap() < details.find("Braise").unwrap());
        assert!(details.contains("Start 08:00 · cook end 09:30"));
        assert!(details.contains("expires Thu 06 Jun 2024 09:30"));
    }

    #[test]
    fn comments_are_wrapped_and_indented() {
        let mut t = task("a", "2024-06-03T08:00", "Aioli");
        t.comments = Some("word ".repeat(40));
        let doc = render(&[t], &window());
        let comment_lines: Vec<_> = doc
            .lines()
            .skip_while(|l| *l != "Comments:")
            .skip(1)
            .collect();
        assert!(comment_lines.len() > 1);
        assert!(comment_lines.iter().all(|l| l.starts_with("  word")));
        assert!(comment_lines.iter().all(|l| l.len() <= CARD_WIDTH));
    }

    #[test]
    fn empty_week_has_no_cards() {
        let doc = render(&[], &window());
        assert!(doc.contains("No tasks planned this week."));
        assert!(!doc.contains("TASK DETAILS"));
    }

    #[test]
    fn write_replaces_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.txt");
        std::fs::write(&path, "old").unwrap();

        write(&path, &[task("a", "2024-06-03T08:00", "Aioli")], &window()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Aioli"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn write_into_missing_directory_fails_without_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("plan.txt");
        assert!(write(&path, &[], &window()).is_err());
        assert!(!path.exists());
    }
}
