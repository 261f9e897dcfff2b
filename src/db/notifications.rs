//! Notification row operations.
//!
//! Rows are immutable after creation except for the read flag and
//! deletion. `task_title` and `actor_name` are snapshots, so rows outlive
//! permanent task deletion and survive renames unchanged.

use super::{Database, now_ms};
use crate::types::{Notification, NotificationKind};
use anyhow::Result;
use rusqlite::{Row, params};
use uuid::Uuid;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, task_id, task_title, actor_id, actor_name, message, read, created_at";

/// Fields for a new notification record.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub task_id: String,
    pub task_title: String,
    pub actor_id: String,
    pub actor_name: String,
    pub message: String,
}

fn parse_notification_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get(2)?;
    let read: i32 = row.get(8)?;
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: NotificationKind::from_str(&kind).unwrap_or(NotificationKind::TaskEdited),
        task_id: row.get(3)?,
        task_title: row.get(4)?,
        actor_id: row.get(5)?,
        actor_name: row.get(6)?,
        message: row.get(7)?,
        read: read != 0,
        created_at: row.get(9)?,
    })
}

impl Database {
    /// Write one notification record.
    pub fn create_notification(&self, record: NewNotification) -> Result<Notification> {
        let id = Uuid::new_v4().to_string();
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (id, user_id, kind, task_id, task_title,
                                            actor_id, actor_name, message, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9)",
                params![
                    &id,
                    &record.user_id,
                    record.kind.as_str(),
                    &record.task_id,
                    &record.task_title,
                    &record.actor_id,
                    &record.actor_name,
                    &record.message,
                    now,
                ],
            )?;

            Ok(Notification {
                id,
                user_id: record.user_id,
                kind: record.kind,
                task_id: record.task_id,
                task_title: record.task_title,
                actor_id: record.actor_id,
                actor_name: record.actor_name,
                message: record.message,
                read: false,
                created_at: now,
            })
        })
    }

    /// A user's notifications, unread first, then newest first.
    pub fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM notifications WHERE user_id = ?1
                 ORDER BY read ASC, created_at DESC",
                NOTIFICATION_COLUMNS
            ))?;

            let notifications = stmt
                .query_map(params![user_id], parse_notification_row)?
                .filter_map(|r| r.ok())
                .collect();

            Ok(notifications)
        })
    }

    /// Mark one of a user's notifications read. Returns whether a row
    /// matched.
    pub fn mark_notification_read(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;

            Ok(updated > 0)
        })
    }

    /// Mark all of a user's notifications read. Returns the count updated.
    pub fn mark_all_notifications_read(&self, user_id: &str) -> Result<i32> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
                params![user_id],
            )?;

            Ok(updated as i32)
        })
    }

    /// Delete one of a user's notifications (dismiss).
    pub fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;

            Ok(deleted > 0)
        })
    }

    /// Unread notification count for a user.
    pub fn unread_notification_count(&self, user_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
                params![user_id],
                |row| row.get(0),
            )?;

            Ok(count)
        })
    }

    /// Dedup query for the reminder scheduler: the most recent REMINDER
    /// notification for (user, task) created within the window ending at
    /// `now`.
    pub fn find_recent_reminder_notification(
        &self,
        user_id: &str,
        task_id: &str,
        window_minutes: i64,
        now: i64,
    ) -> Result<Option<Notification>> {
        let cutoff = now - window_minutes * 60_000;

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM notifications
                 WHERE user_id = ?1 AND task_id = ?2 AND kind = 'REMINDER'
                   AND created_at >= ?3
                 ORDER BY created_at DESC LIMIT 1",
                NOTIFICATION_COLUMNS
            ))?;

            match stmt.query_row(params![user_id, task_id, cutoff], parse_notification_row) {
                Ok(notification) => Ok(Some(notification)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }
}
