use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use humantime::parse_duration;
use structopt::StructOpt;

use prepweek::model::{coerce_days, coerce_minutes, Shift, TaskDraft};
use prepweek::timecalc::{parse_clock, parse_date, parse_start_time};

/// Task fields shared by `add` and `edit`. Numbers that cannot be read
/// become 0.
#[derive(Debug, StructOpt)]
pub struct TaskFields {
    /// Dish or preparation name.
    #[structopt(long)]
    pub name: Option<String>,

    /// Cook in charge (any name; the roster is only a suggestion).
    #[structopt(long)]
    pub responsible: Option<String>,

    /// Preparation time in minutes.
    #[structopt(long, parse(from_str = coerce_minutes))]
    pub prep: Option<u32>,

    /// Cooking time in minutes.
    #[structopt(long, parse(from_str = coerce_minutes))]
    pub cook: Option<u32>,

    /// Packing time in minutes.
    #[structopt(long, parse(from_str = coerce_minutes))]
    pub packing: Option<u32>,

    /// Shelf life in days.
    #[structopt(long, parse(from_str = coerce_days))]
    pub shelf_life: Option<u32>,

    /// Free-text notes. An empty string clears them.
    #[structopt(long)]
    pub comments: Option<String>,
}

impl TaskFields {
    pub fn into_draft(self) -> TaskDraft {
        TaskDraft {
            name: self.name,
            responsible: self.responsible,
            prep_time: self.prep,
            cook_time: self.cook,
            packing_time: self.packing,
            shelf_life_days: self.shelf_life,
            comments: self.comments,
            ..TaskDraft::default()
        }
    }
}

#[derive(Debug, StructOpt)]
pub enum NotificationAction {
    /// Show whether alerts are allowed.
    Status,
    /// Ask for permission to show alerts.
    Enable,
    /// Forget a previous answer so `enable` asks again.
    Reset,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Plan a new preparation task.
    Add {
        /// Day of the task (YYYY-MM-DD).
        #[structopt(parse(try_from_str = parse_date))]
        day: NaiveDate,

        /// Start time (HH:MM), 08:00 when omitted.
        #[structopt(long, parse(try_from_str = parse_clock))]
        at: Option<NaiveTime>,

        /// morning, afternoon or evening. Guessed from the start time when omitted.
        #[structopt(long)]
        shift: Option<Shift>,

        #[structopt(flatten)]
        fields: TaskFields,
    },
    /// Change fields of a task.
    Edit {
        /// Task id or unambiguous prefix.
        id: String,

        /// New start (YYYY-MM-DDTHH:MM).
        #[structopt(long, parse(try_from_str = parse_start_time))]
        start: Option<NaiveDateTime>,

        #[structopt(long)]
        shift: Option<Shift>,

        #[structopt(flatten)]
        fields: TaskFields,
    },
    /// Remove a task.
    Rm {
        id: String,
    },
    /// Copy a task under a new id.
    Dup {
        id: String,
    },
    /// Move a task to another day and shift, keeping its start time.
    Mv {
        id: String,

        #[structopt(parse(try_from_str = parse_date))]
        date: NaiveDate,

        shift: Shift,
    },
    /// Show the week plan.
    List {
        /// Weeks from the current one (-1 is last week).
        #[structopt(short, long, default_value = "0", allow_hyphen_values = true)]
        week: i64,
    },
    /// Show every field of a task.
    Show {
        id: String,
    },
    /// Write a printable plan of the week to a file.
    Export {
        #[structopt(parse(from_os_str))]
        path: PathBuf,

        /// Weeks from the current one.
        #[structopt(short, long, default_value = "0", allow_hyphen_values = true)]
        week: i64,
    },
    /// Poll the plan and alert when tasks start and finish cooking.
    Watch {
        /// Time between polls (parse_duration).
        #[structopt(long, default_value = "60s", parse(try_from_str = parse_duration))]
        interval: Duration,

        /// Poll once and exit.
        #[structopt(long)]
        once: bool,
    },
    /// Manage permission to show alerts.
    Notifications {
        #[structopt(subcommand)]
        action: Option<NotificationAction>,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "prepweek",
    about = "A weekly kitchen production planner."
)]
pub struct CommandLineArgs {
    #[structopt(subcommand)]
    pub action: Command,

    /// Use a different plan database.
    #[structopt(parse(from_os_str), short, long)]
    pub db_file: Option<PathBuf>,
}
