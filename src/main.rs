use anyhow::Context;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

use prepweek::clock::SystemClock;
use prepweek::config::Config;
use prepweek::storage::SqliteStorage;
use prepweek::store::TaskStore;

mod cli;
mod interface;

use cli::{Command::*, CommandLineArgs, NotificationAction};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    // Get the command-line arguments.
    let CommandLineArgs { action, db_file } = CommandLineArgs::from_args();

    // Find and open the plan.
    let config = Config::resolve(db_file).context("Failed to find the plan database.")?;
    let storage = SqliteStorage::open(&config.db_path)
        .with_context(|| format!("Failed to open {}.", config.db_path.display()))?;
    let mut store = TaskStore::load(storage, config.roster);
    let clock = SystemClock;

    // Perform the action.
    match action {
        Add {
            day,
            at,
            shift,
            fields,
        } => interface::add_task(&mut store, day, at, shift, fields.into_draft()),
        Edit {
            id,
            start,
            shift,
            fields,
        } => interface::edit_task(&mut store, &id, start, shift, fields.into_draft()),
        Rm { id } => interface::remove_task(&mut store, &id),
        Dup { id } => interface::duplicate_task(&mut store, &id),
        Mv { id, date, shift } => interface::move_task(&mut store, &id, date, shift),
        List { week } => interface::list(&store, &clock, week),
        Show { id } => interface::show(&store, &id),
        Export { path, week } => interface::export(&store, &clock, path, week),
        Watch { interval, once } => interface::watch(&mut store, interval, once),
        Notifications { action } => match action.unwrap_or(NotificationAction::Status) {
            NotificationAction::Status => interface::notification_status(&store),
            NotificationAction::Enable => interface::enable_notifications(&mut store),
            NotificationAction::Reset => interface::reset_notifications(&mut store),
        },
    }?;
    Ok(())
}
