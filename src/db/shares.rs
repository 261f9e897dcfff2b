//! TaskShare row operations.
//!
//! At most one row exists per (task_id, user_id); the task owner never has
//! a row for their own task. Lifecycle policy (who may invite, upgrade,
//! revoke) lives in the sharing service, not here.

use super::{Database, now_ms};
use crate::types::{SharePermission, TaskShare};
use anyhow::{Result, anyhow};
use rusqlite::{Row, params};
use uuid::Uuid;

const SHARE_COLUMNS: &str = "id, task_id, user_id, permission, shared_by, created_at, updated_at";

fn parse_share_row(row: &Row<'_>) -> rusqlite::Result<TaskShare> {
    let permission: String = row.get(3)?;
    Ok(TaskShare {
        id: row.get(0)?,
        task_id: row.get(1)?,
        user_id: row.get(2)?,
        permission: SharePermission::from_str(&permission).unwrap_or(SharePermission::Viewer),
        shared_by: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl Database {
    /// Point lookup for the (task, user) pair.
    pub fn find_share(&self, task_id: &str, user_id: &str) -> Result<Option<TaskShare>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM task_shares WHERE task_id = ?1 AND user_id = ?2",
                SHARE_COLUMNS
            ))?;

            match stmt.query_row(params![task_id, user_id], parse_share_row) {
                Ok(share) => Ok(Some(share)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Create a share row. Fails on a duplicate (task, user) pair.
    pub fn create_share(
        &self,
        task_id: &str,
        user_id: &str,
        permission: SharePermission,
        shared_by: &str,
    ) -> Result<TaskShare> {
        let id = Uuid::new_v4().to_string();
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO task_shares (id, task_id, user_id, permission, shared_by,
                                          created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![&id, task_id, user_id, permission.as_str(), shared_by, now, now],
            )?;

            Ok(TaskShare {
                id,
                task_id: task_id.to_string(),
                user_id: user_id.to_string(),
                permission,
                shared_by: shared_by.to_string(),
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Update the permission of an existing share in place.
    pub fn update_share(
        &self,
        task_id: &str,
        user_id: &str,
        permission: SharePermission,
    ) -> Result<TaskShare> {
        let now = now_ms();

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE task_shares SET permission = ?1, updated_at = ?2
                 WHERE task_id = ?3 AND user_id = ?4",
                params![permission.as_str(), now, task_id, user_id],
            )?;

            if updated == 0 {
                return Err(anyhow!(
                    "No share on task {} for user {}",
                    task_id,
                    user_id
                ));
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM task_shares WHERE task_id = ?1 AND user_id = ?2",
                SHARE_COLUMNS
            ))?;
            let share = stmt.query_row(params![task_id, user_id], parse_share_row)?;

            Ok(share)
        })
    }

    /// Delete a share. Returns whether a row was removed.
    pub fn delete_share(&self, task_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM task_shares WHERE task_id = ?1 AND user_id = ?2",
                params![task_id, user_id],
            )?;

            Ok(deleted > 0)
        })
    }

    /// All shares on a task, oldest grant first.
    pub fn list_shares_for_task(&self, task_id: &str) -> Result<Vec<TaskShare>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM task_shares WHERE task_id = ?1 ORDER BY created_at ASC",
                SHARE_COLUMNS
            ))?;

            let shares = stmt
                .query_map(params![task_id], parse_share_row)?
                .filter_map(|r| r.ok())
                .collect();

            Ok(shares)
        })
    }
}
