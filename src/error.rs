use thiserror::Error;

/// Errors raised by the planner library. Command handlers wrap these in
/// `anyhow` with some context before reporting them.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("invalid timestamp {0:?}: expected YYYY-MM-DDTHH:MM")]
    InvalidTimestamp(String),

    #[error("invalid date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid time {0:?}: expected HH:MM")]
    InvalidTime(String),

    #[error("unknown shift {0:?}: expected morning, afternoon or evening")]
    UnknownShift(String),

    #[error("no task matches id {0:?}")]
    UnknownTask(String),

    #[error("id prefix {0:?} is ambiguous ({1} tasks match)")]
    AmbiguousTask(String, usize),

    #[error("could not determine a data directory for the plan database")]
    NoDataDir,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("write rejected: {0}")]
    WriteRejected(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PlannerError> = std::result::Result<T, E>;
