use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, error, warn};

use prepweek::alerts::{AlertEngine, Permission, PermissionPrompt, TerminalSink};
use prepweek::clock::{Clock, PollSchedule, SystemClock};
use prepweek::config::poll_interval;
use prepweek::export;
use prepweek::model::{default_start_time, Shift, TaskDraft};
use prepweek::storage::{Persistence, SqliteStorage};
use prepweek::store::TaskStore;
use prepweek::PlannerError;
use prepweek::timecalc::WeekWindow;
use prepweek::view::{self, short_id, TaskLabels};

pub type Store = TaskStore<SqliteStorage>;

const DENIED_MESSAGE: &str = "Alerts are blocked for this plan. Run 'prepweek notifications reset' \
     and then 'prepweek notifications enable' to be asked again.";

pub fn add_task(
    store: &mut Store,
    day: NaiveDate,
    at: Option<NaiveTime>,
    shift: Option<Shift>,
    mut draft: TaskDraft,
) -> Result<()> {
    let time = at.unwrap_or_else(default_start_time);
    draft.start_time = Some(day.and_time(time));
    let shift = shift.unwrap_or_else(|| Shift::suggested_for(time));

    let task = store.create(&draft, day, shift);
    println!(
        "{} {} {} ({}) {}",
        short_id(&task.id),
        task.start_time().format("%a %d/%m"),
        task.fmt_window(),
        task.shift,
        task.name
    );
    Ok(())
}

pub fn edit_task(
    store: &mut Store,
    id: &str,
    start: Option<NaiveDateTime>,
    shift: Option<Shift>,
    mut draft: TaskDraft,
) -> Result<()> {
    let id = store.resolve(id)?.id.clone();
    draft.start_time = start;
    draft.shift = shift;

    let task = store
        .edit(&id, &draft)
        .ok_or(PlannerError::UnknownTask(id))?;
    print!("{}", view::render_task(&task));
    Ok(())
}

pub fn remove_task(store: &mut Store, id: &str) -> Result<()> {
    let task = store.resolve(id)?.clone();
    store.delete(&task.id);
    println!("Removed {} ({}).", task.name, short_id(&task.id));
    Ok(())
}

pub fn duplicate_task(store: &mut Store, id: &str) -> Result<()> {
    let task = store.resolve(id)?.clone();
    let copy = store.duplicate(&task);
    println!("{} {}", short_id(&copy.id), copy.name);
    Ok(())
}

pub fn move_task(store: &mut Store, id: &str, date: NaiveDate, shift: Shift) -> Result<()> {
    let id = store.resolve(id)?.id.clone();
    if let Some(task) = store.move_task(&id, date, shift) {
        println!(
            "{} moved to {} {} ({}).",
            task.name,
            task.start_time().format("%a %d/%m"),
            task.fmt_start(),
            task.shift
        );
    }
    Ok(())
}

pub fn list(store: &Store, clock: &dyn Clock, week: i64) -> Result<()> {
    let window = WeekWindow::for_offset(clock.today(), week);
    let tasks = store.tasks_in_week(&window);
    let weekend = store.weekend_tasks(&window).len();
    print!("{}", view::render_week(&tasks, weekend, &window, clock.now()));
    Ok(())
}

pub fn show(store: &Store, id: &str) -> Result<()> {
    let task = store.resolve(id)?;
    print!("{}", view::render_task(task));
    Ok(())
}

pub fn export(store: &Store, clock: &dyn Clock, path: PathBuf, week: i64) -> Result<()> {
    let window = WeekWindow::for_offset(clock.today(), week);
    println!("Exporting {}...", window.label());
    match export::write(&path, store.tasks(), &window) {
        Ok(()) => {
            println!("Plan written to {}.", path.display());
            Ok(())
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "export failed");
            Err(err).with_context(|| format!("Failed to export the plan to {}.", path.display()))
        }
    }
}

/// Poll the plan forever (or once) and raise alerts through the terminal.
pub fn watch(store: &mut Store, interval: Duration, once: bool) -> Result<()> {
    let mut schedule = PollSchedule::new(poll_interval(interval), Instant::now());
    let permission = store
        .persistence()
        .load_permission()
        .context("Failed to read the notification permission.")?;
    if permission != Permission::Granted {
        println!(
            "Alerts are {}; run 'prepweek notifications enable' to allow them.",
            permission_label(permission)
        );
    }

    let mut engine = AlertEngine::new(SystemClock, TerminalSink::stdout(), permission);
    debug!(interval = %humantime::format_duration(schedule.interval()), "watching the plan");
    loop {
        store.reload();
        match store.persistence().load_permission() {
            Ok(permission) => engine.set_permission(permission),
            Err(err) => warn!(error = %err, "failed to refresh the notification permission"),
        }
        let sent = engine.tick(store.tasks());
        debug!(sent, tasks = store.tasks().len(), "alert sweep done");

        if once {
            return Ok(());
        }
        thread::sleep(schedule.wait(Instant::now()));
    }
}

pub fn notification_status(store: &Store) -> Result<()> {
    let permission = store
        .persistence()
        .load_permission()
        .context("Failed to read the notification permission.")?;
    println!("Alerts: {}.", permission_label(permission));
    if permission == Permission::Denied {
        println!("{}", DENIED_MESSAGE);
    }
    Ok(())
}

pub fn enable_notifications(store: &mut Store) -> Result<()> {
    let current = store
        .persistence()
        .load_permission()
        .context("Failed to read the notification permission.")?;
    let mut engine = AlertEngine::new(SystemClock, TerminalSink::stdout(), current);
    let outcome = engine.request_permission(&mut TerminalPrompt, store.tasks());

    if outcome != current {
        store
            .persistence_mut()
            .save_permission(outcome)
            .context("Failed to save the notification permission.")?;
    }
    match outcome {
        Permission::Granted => println!("Alerts are enabled."),
        Permission::Denied => println!("{}", DENIED_MESSAGE),
        Permission::Unsupported => {
            println!("This terminal cannot show alerts; run the command interactively.")
        }
        Permission::Default => println!("Alerts were not enabled."),
    }
    Ok(())
}

pub fn reset_notifications(store: &mut Store) -> Result<()> {
    store
        .persistence_mut()
        .save_permission(Permission::Default)
        .context("Failed to save the notification permission.")?;
    println!("Alert permission reset.");
    Ok(())
}

fn permission_label(permission: Permission) -> &'static str {
    match permission {
        Permission::Default => "not enabled",
        Permission::Granted => "enabled",
        Permission::Denied => "blocked",
        Permission::Unsupported => "unsupported",
    }
}

/// Asks on the terminal; unavailable when stdin is not interactive.
struct TerminalPrompt;

impl PermissionPrompt for TerminalPrompt {
    fn is_supported(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn ask(&mut self) -> io::Result<bool> {
        print!("Show an alert when each task starts and finishes cooking? [y/N] ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}
