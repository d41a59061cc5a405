//! Runtime settings. Each value is resolved as: command-line flag, then
//! environment variable, then built-in default.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use tracing::warn;

use crate::alerts::DETECTION_WINDOW_SECS;
use crate::error::{PlannerError, Result};
use crate::model::Roster;

/// Overrides the plan database location.
pub const DB_ENV: &str = "PREPWEEK_DB";

/// Comma separated list of kitchen staff.
pub const ROSTER_ENV: &str = "PREPWEEK_ROSTER";

/// Polling cadence of `prepweek watch`, matched to the alert window.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

const DB_FILE_NAME: &str = "plan.sqlite";

/// The interval `watch` actually polls at. Zero means the default; anything
/// longer than the alert window would let boundaries slip between polls, so
/// it is shortened to the window.
pub fn poll_interval(requested: Duration) -> Duration {
    let longest = Duration::from_secs(DETECTION_WINDOW_SECS as u64);
    if requested.is_zero() {
        DEFAULT_POLL_INTERVAL
    } else if requested > longest {
        warn!(
            requested = %humantime::format_duration(requested),
            used = %humantime::format_duration(longest),
            "poll interval longer than the alert window, shortening it"
        );
        longest
    } else {
        requested
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub roster: Roster,
}

impl Config {
    /// Resolve settings from the process environment.
    pub fn resolve(db_flag: Option<PathBuf>) -> Result<Self> {
        Config::resolve_with(
            db_flag,
            std::env::var(DB_ENV).ok(),
            std::env::var(ROSTER_ENV).ok(),
            default_db_path(),
        )
    }

    /// Resolve settings from explicit values (testable without env vars).
    pub fn resolve_with(
        db_flag: Option<PathBuf>,
        db_env: Option<String>,
        roster_env: Option<String>,
        default_db: Option<PathBuf>,
    ) -> Result<Self> {
        let db_path = db_flag
            .or_else(|| db_env.filter(|v| !v.trim().is_empty()).map(PathBuf::from))
            .or(default_db)
            .ok_or(PlannerError::NoDataDir)?;
        let roster = roster_env
            .map(|list| Roster::parse(&list))
            .unwrap_or_default();
        Ok(Config { db_path, roster })
    }
}

/// `plan.sqlite` in the platform data directory.
pub fn default_db_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "prepweek", "prepweek")
        .map(|dirs| dirs.data_dir().join(DB_FILE_NAME))
}
