//! Task CRUD, archival, and soft-delete operations.

use super::{Database, now_ms};
use crate::types::{Reminder, Task, TaskStatus};
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row, params};
use tracing::warn;
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, owner_id, title, description, status, tags, due_date, \
     is_time_based, reminders, archived, archived_at, deleted_at, created_at, updated_at";

/// Fields for a new task. Everything except the title is optional.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub tags: Vec<String>,
    pub due_date: Option<i64>,
    pub is_time_based: bool,
    pub reminders: Vec<Reminder>,
}

/// Partial update for a task. `None` leaves a field alone; the
/// double-option fields distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<Option<i64>>,
    pub is_time_based: Option<bool>,
    pub reminders: Option<Vec<Reminder>>,
}

fn parse_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let id: String = row.get(0)?;
    let status: String = row.get(4)?;
    let tags_json: String = row.get(5)?;
    let reminders_json: String = row.get(8)?;
    let archived: i32 = row.get(9)?;
    let is_time_based: i32 = row.get(7)?;

    // A malformed reminders column is treated as "no reminders" so one bad
    // row cannot take down a listing or a scan cycle.
    let reminders: Vec<Reminder> = serde_json::from_str(&reminders_json).unwrap_or_else(|e| {
        warn!(task_id = %id, error = %e, "Malformed reminders JSON; treating as empty");
        Vec::new()
    });

    Ok(Task {
        id,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        status: TaskStatus::from_str(&status).unwrap_or(TaskStatus::Todo),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        due_date: row.get(6)?,
        is_time_based: is_time_based != 0,
        reminders,
        archived: archived != 0,
        archived_at: row.get(10)?,
        deleted_at: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
fn get_task_internal(conn: &Connection, task_id: &str) -> Result<Option<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tasks WHERE id = ?1",
        TASK_COLUMNS
    ))?;

    match stmt.query_row(params![task_id], parse_task_row) {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Create a task owned by the given user.
    pub fn create_task(&self, owner_id: &str, draft: TaskDraft) -> Result<Task> {
        let id = Uuid::new_v4().to_string();
        let now = now_ms();
        let status = draft.status.unwrap_or(TaskStatus::Todo);
        let tags_json = serde_json::to_string(&draft.tags)?;
        let reminders_json = serde_json::to_string(&draft.reminders)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (id, owner_id, title, description, status, tags, due_date,
                                    is_time_based, reminders, archived, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11)",
                params![
                    &id,
                    owner_id,
                    &draft.title,
                    &draft.description,
                    status.as_str(),
                    tags_json,
                    draft.due_date,
                    draft.is_time_based as i32,
                    reminders_json,
                    now,
                    now,
                ],
            )?;

            Ok(Task {
                id,
                owner_id: owner_id.to_string(),
                title: draft.title,
                description: draft.description,
                status,
                tags: draft.tags,
                due_date: draft.due_date,
                is_time_based: draft.is_time_based,
                reminders: draft.reminders,
                archived: false,
                archived_at: None,
                deleted_at: None,
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Get a task by id, including soft-deleted rows. Callers decide
    /// whether a set `deleted_at` makes the task invisible.
    pub fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// Point lookup for the permission resolver's ownership check:
    /// the task filtered by `id AND owner_id`.
    pub fn find_task_by_owner(&self, task_id: &str, owner_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks WHERE id = ?1 AND owner_id = ?2",
                TASK_COLUMNS
            ))?;

            match stmt.query_row(params![task_id, owner_id], parse_task_row) {
                Ok(task) => Ok(Some(task)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Apply a partial update and return the updated task.
    pub fn update_task(&self, task_id: &str, patch: TaskPatch) -> Result<Task> {
        let now = now_ms();

        self.with_conn(|conn| {
            let task = get_task_internal(conn, task_id)?
                .ok_or_else(|| anyhow!("Task {} not found", task_id))?;

            let new_title = patch.title.unwrap_or(task.title.clone());
            let new_description = patch.description.unwrap_or(task.description.clone());
            let new_status = patch.status.unwrap_or(task.status);
            let new_tags = patch.tags.unwrap_or(task.tags.clone());
            let new_due_date = patch.due_date.unwrap_or(task.due_date);
            let new_is_time_based = patch.is_time_based.unwrap_or(task.is_time_based);
            let new_reminders = patch.reminders.unwrap_or(task.reminders.clone());

            let tags_json = serde_json::to_string(&new_tags)?;
            let reminders_json = serde_json::to_string(&new_reminders)?;

            conn.execute(
                "UPDATE tasks SET title = ?1, description = ?2, status = ?3, tags = ?4,
                        due_date = ?5, is_time_based = ?6, reminders = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    new_title,
                    new_description,
                    new_status.as_str(),
                    tags_json,
                    new_due_date,
                    new_is_time_based as i32,
                    reminders_json,
                    now,
                    task_id,
                ],
            )?;

            Ok(Task {
                title: new_title,
                description: new_description,
                status: new_status,
                tags: new_tags,
                due_date: new_due_date,
                is_time_based: new_is_time_based,
                reminders: new_reminders,
                updated_at: now,
                ..task
            })
        })
    }

    /// List tasks visible to a user: owned plus shared, excluding
    /// soft-deleted rows, newest first.
    pub fn list_tasks_for_user(&self, user_id: &str, include_archived: bool) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let archived_clause = if include_archived {
                ""
            } else {
                " AND t.archived = 0"
            };
            let sql = format!(
                "SELECT {cols} FROM tasks t
                 WHERE t.deleted_at IS NULL{archived}
                   AND (t.owner_id = ?1
                        OR EXISTS (SELECT 1 FROM task_shares s
                                   WHERE s.task_id = t.id AND s.user_id = ?1))
                 ORDER BY t.created_at DESC",
                cols = TASK_COLUMNS
                    .split(", ")
                    .map(|c| format!("t.{}", c))
                    .collect::<Vec<_>>()
                    .join(", "),
                archived = archived_clause,
            );

            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params![user_id], parse_task_row)?
                .filter_map(|r| r.ok())
                .collect();

            Ok(tasks)
        })
    }

    /// Archive or unarchive a task.
    pub fn set_archived(&self, task_id: &str, archived: bool) -> Result<Task> {
        let now = now_ms();

        self.with_conn(|conn| {
            let task = get_task_internal(conn, task_id)?
                .ok_or_else(|| anyhow!("Task {} not found", task_id))?;

            let archived_at = if archived { Some(now) } else { None };
            conn.execute(
                "UPDATE tasks SET archived = ?1, archived_at = ?2, updated_at = ?3 WHERE id = ?4",
                params![archived as i32, archived_at, now, task_id],
            )?;

            Ok(Task {
                archived,
                archived_at,
                updated_at: now,
                ..task
            })
        })
    }

    /// Soft-delete a task. It disappears from listings and the reminder
    /// scan but stays addressable by id.
    pub fn soft_delete_task(&self, task_id: &str) -> Result<Task> {
        let now = now_ms();

        self.with_conn(|conn| {
            let task = get_task_internal(conn, task_id)?
                .ok_or_else(|| anyhow!("Task {} not found", task_id))?;

            conn.execute(
                "UPDATE tasks SET deleted_at = ?1, updated_at = ?2 WHERE id = ?3",
                params![now, now, task_id],
            )?;

            Ok(Task {
                deleted_at: Some(now),
                updated_at: now,
                ..task
            })
        })
    }

    /// Clear a task's soft-delete marker. Shares are untouched.
    pub fn restore_task(&self, task_id: &str) -> Result<Task> {
        let now = now_ms();

        self.with_conn(|conn| {
            let task = get_task_internal(conn, task_id)?
                .ok_or_else(|| anyhow!("Task {} not found", task_id))?;

            conn.execute(
                "UPDATE tasks SET deleted_at = NULL, updated_at = ?1 WHERE id = ?2",
                params![now, task_id],
            )?;

            Ok(Task {
                deleted_at: None,
                updated_at: now,
                ..task
            })
        })
    }

    /// Permanently delete a task. Shares cascade; notifications keep their
    /// denormalized snapshots.
    pub fn delete_task_permanent(&self, task_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            Ok(deleted > 0)
        })
    }

    /// Tasks eligible for reminder evaluation: time-based, with a due
    /// date, not archived, not done, not soft-deleted.
    pub fn query_time_based_open_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks
                 WHERE is_time_based = 1 AND due_date IS NOT NULL
                   AND archived = 0 AND status != 'done' AND deleted_at IS NULL
                 ORDER BY due_date ASC",
                TASK_COLUMNS
            ))?;

            let tasks = stmt
                .query_map([], parse_task_row)?
                .filter_map(|r| r.ok())
                .collect();

            Ok(tasks)
        })
    }
}
