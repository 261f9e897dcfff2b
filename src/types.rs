//! Core domain types for taskhub.

use serde::{Deserialize, Serialize};

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "todo" => Some(TaskStatus::Todo),
            "in_progress" => Some(TaskStatus::InProgress),
            "done" => Some(TaskStatus::Done),
            _ => None,
        }
    }
}

/// Permission level granted by a task share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharePermission {
    Viewer,
    Editor,
}

impl SharePermission {
    pub fn as_str(&self) -> &'static str {
        match self {
            SharePermission::Viewer => "viewer",
            SharePermission::Editor => "editor",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "viewer" => Some(SharePermission::Viewer),
            "editor" => Some(SharePermission::Editor),
            _ => None,
        }
    }

    /// Human-readable label for notification messages.
    pub fn label(&self) -> &'static str {
        match self {
            SharePermission::Viewer => "Viewer",
            SharePermission::Editor => "Editor",
        }
    }
}

/// A caller's resolved role on a task.
///
/// Ordering is the authorization order OWNER > EDITOR > VIEWER. Sharing
/// policy checks compare role identity instead, since a Viewer has a
/// specific restricted capability rather than simply "less than Editor".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Editor,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Owner => "owner",
        }
    }
}

impl From<SharePermission> for Role {
    fn from(p: SharePermission) -> Self {
        match p {
            SharePermission::Viewer => Role::Viewer,
            SharePermission::Editor => Role::Editor,
        }
    }
}

/// Default lead time for relative reminders without an explicit one.
pub const DEFAULT_LEAD_MINUTES: i64 = 30;

/// A reminder configured on a task.
///
/// Relative reminders need the task's due date to resolve a trigger time;
/// custom reminders carry their own absolute time. The repeat fields are
/// accepted and stored, but the scan only evaluates a reminder's next
/// firing -- re-firing past the dedup window is not implemented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reminder {
    Relative {
        #[serde(skip_serializing_if = "Option::is_none")]
        before_minutes: Option<i64>,
        #[serde(default)]
        repeat: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        repeat_interval: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        repeat_count: Option<i64>,
    },
    Custom {
        custom_date: i64,
        #[serde(default)]
        repeat: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        repeat_interval: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        repeat_count: Option<i64>,
    },
}

impl Reminder {
    /// Resolve the absolute trigger time in ms, given the task's due date.
    /// Relative reminders without a due date have no trigger.
    pub fn trigger_time(&self, due_date: Option<i64>) -> Option<i64> {
        match self {
            Reminder::Relative { before_minutes, .. } => {
                let lead = before_minutes.unwrap_or(DEFAULT_LEAD_MINUTES);
                due_date.map(|due| due - lead * 60_000)
            }
            Reminder::Custom { custom_date, .. } => Some(*custom_date),
        }
    }
}

/// Kind of notification, matching the mutation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    TaskShared,
    CollaboratorAdded,
    PermissionChanged,
    TaskEdited,
    TaskArchived,
    Reminder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskShared => "TASK_SHARED",
            NotificationKind::CollaboratorAdded => "COLLABORATOR_ADDED",
            NotificationKind::PermissionChanged => "PERMISSION_CHANGED",
            NotificationKind::TaskEdited => "TASK_EDITED",
            NotificationKind::TaskArchived => "TASK_ARCHIVED",
            NotificationKind::Reminder => "REMINDER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "TASK_SHARED" => Some(NotificationKind::TaskShared),
            "COLLABORATOR_ADDED" => Some(NotificationKind::CollaboratorAdded),
            "PERMISSION_CHANGED" => Some(NotificationKind::PermissionChanged),
            "TASK_EDITED" => Some(NotificationKind::TaskEdited),
            "TASK_ARCHIVED" => Some(NotificationKind::TaskArchived),
            "REMINDER" => Some(NotificationKind::Reminder),
            _ => None,
        }
    }
}

/// A registered user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub default_view: Option<String>,
    pub timezone: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub tags: Vec<String>,
    pub due_date: Option<i64>,
    pub is_time_based: bool,
    pub reminders: Vec<Reminder>,
    pub archived: bool,
    pub archived_at: Option<i64>,
    pub deleted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A grant of Viewer or Editor access on a task to a non-owner user.
/// The owner never has a share row for their own task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskShare {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub permission: SharePermission,
    pub shared_by: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A notification delivered to exactly one recipient.
///
/// `task_title` and `actor_name` are denormalized snapshots taken at write
/// time; they intentionally go stale after a rename and are never re-joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub task_id: String,
    pub task_title: String,
    pub actor_id: String,
    pub actor_name: String,
    pub message: String,
    pub read: bool,
    pub created_at: i64,
}

/// A collaborator entry for listCollaborators: the owner plus each share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collaborator {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ordering_owner_above_editor_above_viewer() {
        assert!(Role::Owner > Role::Editor);
        assert!(Role::Editor > Role::Viewer);
        assert!(Role::Owner >= Role::Owner);
    }

    #[test]
    fn relative_reminder_defaults_to_30_minute_lead() {
        let r = Reminder::Relative {
            before_minutes: None,
            repeat: false,
            repeat_interval: None,
            repeat_count: None,
        };
        let due = 1_000_000_000;
        assert_eq!(r.trigger_time(Some(due)), Some(due - 30 * 60_000));
    }

    #[test]
    fn relative_reminder_without_due_date_has_no_trigger() {
        let r = Reminder::Relative {
            before_minutes: Some(10),
            repeat: false,
            repeat_interval: None,
            repeat_count: None,
        };
        assert_eq!(r.trigger_time(None), None);
    }

    #[test]
    fn custom_reminder_ignores_due_date() {
        let r = Reminder::Custom {
            custom_date: 42,
            repeat: false,
            repeat_interval: None,
            repeat_count: None,
        };
        assert_eq!(r.trigger_time(None), Some(42));
        assert_eq!(r.trigger_time(Some(99)), Some(42));
    }

    #[test]
    fn reminder_json_is_tagged_by_type() {
        let json = r#"{"type":"relative","before_minutes":15}"#;
        let r: Reminder = serde_json::from_str(json).unwrap();
        assert_eq!(
            r,
            Reminder::Relative {
                before_minutes: Some(15),
                repeat: false,
                repeat_interval: None,
                repeat_count: None,
            }
        );

        let json = r#"{"type":"custom","custom_date":1700000000000,"repeat":true}"#;
        let r: Reminder = serde_json::from_str(json).unwrap();
        match r {
            Reminder::Custom { custom_date, repeat, .. } => {
                assert_eq!(custom_date, 1_700_000_000_000);
                assert!(repeat);
            }
            _ => panic!("expected custom reminder"),
        }
    }
}
