//! User account CRUD operations.

use super::{Database, now_ms};
use crate::types::User;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        default_view: row.get(4)?,
        timezone: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const USER_COLUMNS: &str =
    "id, name, email, password_hash, default_view, timezone, created_at, updated_at";

/// Internal helper to get a user using an existing connection (avoids deadlock).
fn get_user_internal(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE id = ?1",
        USER_COLUMNS
    ))?;

    match stmt.query_row(params![user_id], parse_user_row) {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Create a new user. The email must not already be registered
    /// (compared case-insensitively).
    pub fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        let now = now_ms();

        self.with_conn(|conn| {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM users WHERE email = ?1",
                    params![email],
                    |_| Ok(true),
                )
                .unwrap_or(false);

            if exists {
                return Err(anyhow!("Email '{}' already registered", email));
            }

            conn.execute(
                "INSERT INTO users (id, name, email, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![&id, name, email, password_hash, now, now],
            )?;

            Ok(User {
                id,
                name: name.to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                default_view: None,
                timezone: None,
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Get a user by id.
    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_internal(conn, user_id))
    }

    /// Look up a user by email (case-insensitive).
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users WHERE email = ?1",
                USER_COLUMNS
            ))?;

            match stmt.query_row(params![email], parse_user_row) {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Check that a user exists. Returns an error if not found.
    pub fn require_user(&self, user_id: &str) -> Result<User> {
        self.get_user(user_id)?
            .ok_or_else(|| anyhow!("User {} not found", user_id))
    }

    /// Update profile fields. Double-option distinguishes "leave alone"
    /// from "clear".
    pub fn update_profile(
        &self,
        user_id: &str,
        name: Option<String>,
        default_view: Option<Option<String>>,
        timezone: Option<Option<String>>,
    ) -> Result<User> {
        let now = now_ms();

        self.with_conn(|conn| {
            let user = get_user_internal(conn, user_id)?
                .ok_or_else(|| anyhow!("User {} not found", user_id))?;

            let new_name = name.unwrap_or(user.name.clone());
            let new_default_view = default_view.unwrap_or(user.default_view.clone());
            let new_timezone = timezone.unwrap_or(user.timezone.clone());

            conn.execute(
                "UPDATE users SET name = ?1, default_view = ?2, timezone = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![new_name, new_default_view, new_timezone, now, user_id],
            )?;

            Ok(User {
                name: new_name,
                default_view: new_default_view,
                timezone: new_timezone,
                updated_at: now,
                ..user
            })
        })
    }
}
