//! Task service: authorize, mutate, fan out.
//!
//! Every mutation resolves the actor's role first, applies the record
//! change, then computes a recipient set and writes notifications
//! best-effort. The mutation result never depends on notification writes.

use crate::access;
use crate::db::Database;
use crate::db::tasks::{TaskDraft, TaskPatch};
use crate::error::ApiError;
use crate::notify::{self, EditedFields, NotificationEvent};
use crate::types::{NotificationKind, Role, Task, User};
use anyhow::Result;
use tracing::info;

/// Create a task; the actor becomes its owner.
pub fn create(db: &Database, actor: &User, draft: TaskDraft) -> Result<Task> {
    if draft.title.trim().is_empty() {
        return Err(ApiError::missing_field("title").into());
    }

    let task = db.create_task(&actor.id, draft)?;
    info!(task_id = %task.id, owner = %actor.id, "Task created");
    Ok(task)
}

/// Fetch a task the actor can see, along with their role on it.
pub fn get(db: &Database, actor: &User, task_id: &str) -> Result<(Role, Task)> {
    access::require_role(db, task_id, &actor.id, Role::Viewer)
}

/// Tasks the actor owns or has a share on, excluding soft-deleted ones.
pub fn list(db: &Database, actor: &User, include_archived: bool) -> Result<Vec<Task>> {
    db.list_tasks_for_user(&actor.id, include_archived)
}

/// Edit a task. Owner or Editor. Fans out TASK_EDITED to the owner and
/// every share-holder except the actor.
pub fn update(db: &Database, actor: &User, task_id: &str, patch: TaskPatch) -> Result<Task> {
    let (_, before) = access::require_role(db, task_id, &actor.id, Role::Editor)?;

    let fields = EditedFields {
        status: patch.status.is_some_and(|s| s != before.status),
        title: patch
            .title
            .as_ref()
            .is_some_and(|t| *t != before.title),
        due_date: patch.due_date.is_some_and(|d| d != before.due_date),
        description: patch
            .description
            .as_ref()
            .is_some_and(|d| *d != before.description),
    };

    let task = db.update_task(task_id, patch)?;

    let shares = db.list_shares_for_task(task_id)?;
    let message = notify::edit_message(&actor.name, &task.title, fields);
    for recipient_id in notify::task_audience(&task, &shares, &actor.id) {
        notify::notify(
            db,
            NotificationEvent {
                recipient_id,
                kind: NotificationKind::TaskEdited,
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                actor_id: actor.id.clone(),
                actor_name: actor.name.clone(),
                message: message.clone(),
            },
        );
    }

    Ok(task)
}

/// Archive a task. Owner or Editor. When the actor is not the owner, the
/// owner alone is notified.
pub fn archive(db: &Database, actor: &User, task_id: &str) -> Result<Task> {
    access::require_role(db, task_id, &actor.id, Role::Editor)?;
    let task = db.set_archived(task_id, true)?;
    info!(task_id, actor = %actor.id, "Task archived");

    if task.owner_id != actor.id {
        notify::notify(
            db,
            NotificationEvent {
                recipient_id: task.owner_id.clone(),
                kind: NotificationKind::TaskArchived,
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                actor_id: actor.id.clone(),
                actor_name: actor.name.clone(),
                message: format!("{} archived \"{}\"", actor.name, task.title),
            },
        );
    }

    Ok(task)
}

/// Unarchive a task. Owner or Editor. Emits nothing.
pub fn unarchive(db: &Database, actor: &User, task_id: &str) -> Result<Task> {
    access::require_role(db, task_id, &actor.id, Role::Editor)?;
    let task = db.set_archived(task_id, false)?;
    info!(task_id, actor = %actor.id, "Task unarchived");
    Ok(task)
}

/// Soft-delete a task. Owner only. Shares stay in place for a later
/// restore.
pub fn soft_delete(db: &Database, actor: &User, task_id: &str) -> Result<Task> {
    access::require_role(db, task_id, &actor.id, Role::Owner)?;
    let task = db.soft_delete_task(task_id)?;
    info!(task_id, "Task soft-deleted");
    Ok(task)
}

/// Restore a soft-deleted task. Owner only.
pub fn restore(db: &Database, actor: &User, task_id: &str) -> Result<Task> {
    access::require_role(db, task_id, &actor.id, Role::Owner)?;
    let task = db.restore_task(task_id)?;
    info!(task_id, "Task restored");
    Ok(task)
}

/// Permanently delete a task. Owner only. Shares cascade; notifications
/// keep their snapshots.
pub fn delete_permanent(db: &Database, actor: &User, task_id: &str) -> Result<()> {
    access::require_role(db, task_id, &actor.id, Role::Owner)?;
    db.delete_task_permanent(task_id)?;
    info!(task_id, "Task permanently deleted");
    Ok(())
}
