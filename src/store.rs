//! The plan: every task, in memory, written back whole after each change.
//!
//! All operations are total. Unknown ids turn deletes and moves into
//! no-ops, and updates into appends. A failed write is logged and the
//! in-memory plan stays authoritative for the rest of the session.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{PlannerError, Result};
use crate::model::{default_start_time, Roster, Shift, Task, TaskDraft, DUPLICATE_SUFFIX};
use crate::storage::Persistence;
use crate::timecalc::WeekWindow;

/// What [`TaskStore::update`] did with the task it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Replaced,
    /// The id was unknown so the task was added.
    Appended,
}

pub struct TaskStore<P: Persistence> {
    tasks: Vec<Task>,
    persistence: P,
    roster: Roster,
}

impl<P: Persistence> TaskStore<P> {
    /// Read the plan once from `persistence`.
    pub fn load(persistence: P, roster: Roster) -> Self {
        let mut store = TaskStore {
            tasks: Vec::new(),
            persistence,
            roster,
        };
        store.reload();
        store
    }

    /// Replace the in-memory plan with what is stored. Records with a
    /// repeated id are dropped and stale weekdays are repaired.
    pub fn reload(&mut self) {
        let stored = match self.persistence.load_tasks() {
            Ok(tasks) => tasks,
            Err(err) => {
                warn!(error = %err, "failed to read the plan, starting empty");
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(stored.len());
        for mut task in stored {
            if !seen.insert(task.id.clone()) {
                warn!(id = %task.id, "dropping stored task with a repeated id");
                continue;
            }
            if task.repair_day_of_week() {
                debug!(id = %task.id, "repaired stale day of week");
            }
            tasks.push(task);
        }
        debug!(count = tasks.len(), "plan loaded");
        self.tasks = tasks;
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut P {
        &mut self.persistence
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Find a task by its full id or by an unambiguous id prefix.
    pub fn resolve(&self, prefix: &str) -> Result<&Task> {
        if let Some(task) = self.get(prefix) {
            return Ok(task);
        }
        let matches: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| !prefix.is_empty() && t.id.starts_with(prefix))
            .collect();
        match matches.len() {
            0 => Err(PlannerError::UnknownTask(prefix.to_string())),
            1 => Ok(matches[0]),
            n => Err(PlannerError::AmbiguousTask(prefix.to_string(), n)),
        }
    }

    /// Tasks scheduled Monday to Friday of `window`, by start time.
    pub fn tasks_in_week(&self, window: &WeekWindow) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| window.contains(t.date()))
            .collect();
        tasks.sort_by_key(|t| t.start_time());
        tasks
    }

    /// Tasks on the weekend following `window`, which the grid does not show.
    pub fn weekend_tasks(&self, window: &WeekWindow) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| window.weekend_contains(t.date()))
            .collect()
    }

    /// Add a task on `day` in `shift`. It starts at 08:00 unless the draft
    /// carries a start time, whose clock time is then used on `day`.
    /// Missing fields get the defaults.
    pub fn create(&mut self, draft: &TaskDraft, day: NaiveDate, shift: Shift) -> Task {
        let id = self.fresh_id();
        let mut task = Task::new(
            id,
            day.and_time(default_start_time()),
            shift,
            self.roster.default_responsible(),
        );
        draft.apply_to(&mut task);
        task.set_date(day);
        task.shift = shift;
        if let Some(responsible) = &draft.responsible {
            if !self.roster.contains(responsible) {
                debug!(%responsible, "responsible is not on the roster");
            }
        }

        debug!(id = %task.id, name = %task.name, "task created");
        self.tasks.push(task.clone());
        self.flush();
        task
    }

    /// Replace the task with the same id, keeping its position. Unknown ids
    /// are appended.
    pub fn update(&mut self, mut task: Task) -> UpdateOutcome {
        task.repair_day_of_week();
        let outcome = match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => {
                *slot = task;
                UpdateOutcome::Replaced
            }
            None => {
                warn!(id = %task.id, "updated task was not in the plan, appending it");
                self.tasks.push(task);
                UpdateOutcome::Appended
            }
        };
        self.flush();
        outcome
    }

    /// Apply a draft to an existing task. Returns the edited task, or `None`
    /// if the id is unknown.
    pub fn edit(&mut self, id: &str, draft: &TaskDraft) -> Option<Task> {
        let mut task = self.get(id)?.clone();
        draft.apply_to(&mut task);
        self.update(task.clone());
        Some(task)
    }

    /// Returns whether a task was removed.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let removed = self.tasks.len() != before;
        if removed {
            debug!(%id, "task deleted");
        }
        self.flush();
        removed
    }

    /// Add a copy of `task` under a new id with a decorated name.
    pub fn duplicate(&mut self, task: &Task) -> Task {
        let mut copy = task.clone();
        copy.id = self.fresh_id();
        copy.name = format!("{}{}", task.name, DUPLICATE_SUFFIX);
        debug!(from = %task.id, to = %copy.id, "task duplicated");
        self.tasks.push(copy.clone());
        self.flush();
        copy
    }

    /// Move a task to another date and shift, keeping its clock time.
    pub fn move_task(&mut self, id: &str, new_date: NaiveDate, new_shift: Shift) -> Option<Task> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        task.set_date(new_date);
        task.shift = new_shift;
        let moved = task.clone();
        debug!(%id, date = %new_date, shift = %new_shift, "task moved");
        self.flush();
        Some(moved)
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    fn flush(&mut self) {
        if let Err(err) = self.persistence.save_tasks(&self.tasks) {
            error!(error = %err, "failed to save the plan, keeping the in-memory copy");
        }
    }
}
