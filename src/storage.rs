use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::alerts::Permission;
use crate::error::{PlannerError, Result};
use crate::model::Task;

/// Key holding the whole plan as a JSON array.
pub const TASKS_KEY: &str = "production-tasks";

/// Key holding the notification permission.
pub const PERMISSION_KEY: &str = "notification-permission";

/// Where the plan lives between runs. The plan is always read and written
/// as a whole.
pub trait Persistence {
    /// Unreadable content yields an empty plan rather than an error.
    fn load_tasks(&self) -> Result<Vec<Task>>;
    fn save_tasks(&mut self, tasks: &[Task]) -> Result<()>;
    fn load_permission(&self) -> Result<Permission>;
    fn save_permission(&mut self, permission: Permission) -> Result<()>;
}

/// Decode a stored plan, treating anything malformed as empty.
pub fn decode_tasks(raw: &str) -> Vec<Task> {
    match serde_json::from_str::<Vec<Task>>(raw) {
        Ok(tasks) => tasks,
        Err(err) => {
            warn!(error = %err, "stored plan is unreadable, starting from an empty plan");
            Vec::new()
        }
    }
}

pub fn encode_tasks(tasks: &[Task]) -> Result<String> {
    Ok(serde_json::to_string(tasks)?)
}

fn decode_permission(raw: &str) -> Permission {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!(error = %err, "stored notification permission is unreadable");
        Permission::Default
    })
}

/// A single-table key/value store in SQLite.
pub struct SqliteStorage {
    db: Connection,
}

impl SqliteStorage {
    /// Open the plan database, creating it (and its directory) if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let db = Connection::open(path)?;
        debug!(path = %path.display(), "opened plan database");
        SqliteStorage::init(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        SqliteStorage::init(Connection::open_in_memory()?)
    }

    fn init(db: Connection) -> Result<Self> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                  key     TEXT PRIMARY KEY,
                  value   TEXT NOT NULL
                  )",
            [],
        )?;
        Ok(SqliteStorage { db })
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.db.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Overwrite the stored plan with raw text. Only meant for repairs and
    /// tests.
    pub fn put_raw_tasks(&self, raw: &str) -> Result<()> {
        self.put(TASKS_KEY, raw)
    }
}

impl Persistence for SqliteStorage {
    fn load_tasks(&self) -> Result<Vec<Task>> {
        Ok(self
            .get(TASKS_KEY)?
            .map(|raw| decode_tasks(&raw))
            .unwrap_or_default())
    }

    fn save_tasks(&mut self, tasks: &[Task]) -> Result<()> {
        let raw = encode_tasks(tasks)?;
        self.put(TASKS_KEY, &raw)?;
        debug!(count = tasks.len(), "plan saved");
        Ok(())
    }

    fn load_permission(&self) -> Result<Permission> {
        Ok(self
            .get(PERMISSION_KEY)?
            .map(|raw| decode_permission(&raw))
            .unwrap_or_default())
    }

    fn save_permission(&mut self, permission: Permission) -> Result<()> {
        let raw = serde_json::to_string(&permission)?;
        self.put(PERMISSION_KEY, &raw)
    }
}

/// Keeps the plan in memory as the same JSON text SQLite would hold.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    pub raw_tasks: Option<String>,
    pub permission: Permission,
    /// Number of successful plan writes.
    pub flushes: usize,
    /// Reject every write when set.
    pub fail_writes: bool,
}

impl MemoryStorage {
    pub fn with_raw_tasks(raw: impl Into<String>) -> Self {
        MemoryStorage {
            raw_tasks: Some(raw.into()),
            ..MemoryStorage::default()
        }
    }
}

impl Persistence for MemoryStorage {
    fn load_tasks(&self) -> Result<Vec<Task>> {
        Ok(self
            .raw_tasks
            .as_deref()
            .map(decode_tasks)
            .unwrap_or_default())
    }

    fn save_tasks(&mut self, tasks: &[Task]) -> Result<()> {
        if self.fail_writes {
            return Err(PlannerError::WriteRejected("memory storage is read-only".to_string()));
        }
        self.raw_tasks = Some(encode_tasks(tasks)?);
        self.flushes += 1;
        Ok(())
    }

    fn load_permission(&self) -> Result<Permission> {
        Ok(self.permission)
    }

    fn save_permission(&mut self, permission: Permission) -> Result<()> {
        if self.fail_writes {
            return Err(PlannerError::WriteRejected("memory storage is read-only".to_string()));
        }
        self.permission = permission;
        Ok(())
    }
}
