//! Share lifecycle: invite, permission change, revoke, collaborator list.
//!
//! Per (task, user) the only states are no-access -> VIEWER <-> EDITOR ->
//! no-access. Every transition fans out notifications through the
//! notification engine; the underlying share mutation never waits on or
//! rolls back for a notification write.

use crate::access;
use crate::db::Database;
use crate::error::ApiError;
use crate::notify::{self, NotificationEvent};
use crate::types::{Collaborator, NotificationKind, Role, SharePermission, TaskShare, User};
use anyhow::Result;
use serde::Serialize;
use tracing::info;

/// Result of an invite: either a fresh or updated share, or a report that
/// the grantee already held exactly this permission.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InviteOutcome {
    Shared { share: TaskShare },
    PermissionChanged { share: TaskShare },
    AlreadyShared { share: TaskShare },
}

/// Share a task with another user, or adjust their existing permission.
///
/// Any resolvable role may invite, but a Viewer may only grant Viewer.
/// The grantee must exist, must not be the owner, and must not be the
/// actor.
pub fn invite(
    db: &Database,
    actor: &User,
    task_id: &str,
    grantee_email: &str,
    permission: SharePermission,
) -> Result<InviteOutcome> {
    let Some((role, task)) = access::resolve(db, task_id, &actor.id)? else {
        return Err(ApiError::task_not_found(task_id).into());
    };

    if role == Role::Viewer && permission == SharePermission::Editor {
        return Err(ApiError::forbidden("Viewers can only share as Viewer").into());
    }

    let grantee = db
        .find_user_by_email(grantee_email)?
        .ok_or_else(|| ApiError::user_not_found(grantee_email))?;

    if grantee.id == task.owner_id {
        return Err(
            ApiError::invalid_value("email", "The task owner already has full access").into(),
        );
    }
    if grantee.id == actor.id {
        return Err(
            ApiError::invalid_value("email", "You cannot share a task with yourself").into(),
        );
    }

    if let Some(existing) = db.find_share(task_id, &grantee.id)? {
        if existing.permission == permission {
            return Ok(InviteOutcome::AlreadyShared { share: existing });
        }

        let share = db.update_share(task_id, &grantee.id, permission)?;
        info!(
            task_id,
            grantee = %grantee.id,
            permission = permission.as_str(),
            "Share permission updated via invite"
        );

        notify::notify(
            db,
            NotificationEvent {
                recipient_id: grantee.id.clone(),
                kind: NotificationKind::PermissionChanged,
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                actor_id: actor.id.clone(),
                actor_name: actor.name.clone(),
                message: format!(
                    "{} changed your access to \"{}\" to {}",
                    actor.name,
                    task.title,
                    permission.label()
                ),
            },
        );

        return Ok(InviteOutcome::PermissionChanged { share });
    }

    // Snapshot the audience before the new row lands so the grantee is not
    // told twice.
    let existing_shares = db.list_shares_for_task(task_id)?;
    let share = db.create_share(task_id, &grantee.id, permission, &actor.id)?;
    info!(task_id, grantee = %grantee.id, permission = permission.as_str(), "Task shared");

    for recipient_id in notify::task_audience(&task, &existing_shares, &actor.id) {
        notify::notify(
            db,
            NotificationEvent {
                recipient_id,
                kind: NotificationKind::CollaboratorAdded,
                task_id: task.id.clone(),
                task_title: task.title.clone(),
                actor_id: actor.id.clone(),
                actor_name: actor.name.clone(),
                message: format!(
                    "{} added {} to \"{}\"",
                    actor.name, grantee.name, task.title
                ),
            },
        );
    }

    notify::notify(
        db,
        NotificationEvent {
            recipient_id: grantee.id.clone(),
            kind: NotificationKind::TaskShared,
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            message: format!(
                "{} shared \"{}\" with you as {}",
                actor.name,
                task.title,
                permission.label()
            ),
        },
    );

    Ok(InviteOutcome::Shared { share })
}

/// Change an existing collaborator's permission. Owners only.
pub fn change_permission(
    db: &Database,
    actor: &User,
    task_id: &str,
    grantee_user_id: &str,
    permission: SharePermission,
) -> Result<TaskShare> {
    let (_, task) = access::require_role(db, task_id, &actor.id, Role::Owner)?;

    if db.find_share(task_id, grantee_user_id)?.is_none() {
        return Err(ApiError::share_not_found(task_id, grantee_user_id).into());
    }

    let share = db.update_share(task_id, grantee_user_id, permission)?;
    info!(
        task_id,
        grantee = grantee_user_id,
        permission = permission.as_str(),
        "Share permission changed"
    );

    notify::notify(
        db,
        NotificationEvent {
            recipient_id: grantee_user_id.to_string(),
            kind: NotificationKind::PermissionChanged,
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            message: format!(
                "{} changed your access to \"{}\" to {}",
                actor.name,
                task.title,
                permission.label()
            ),
        },
    );

    Ok(share)
}

/// Remove a collaborator. Allowed for the owner, or for the grantee
/// removing themself. No notification is sent.
pub fn revoke(db: &Database, actor: &User, task_id: &str, grantee_user_id: &str) -> Result<()> {
    let Some((role, _)) = access::resolve(db, task_id, &actor.id)? else {
        return Err(ApiError::task_not_found(task_id).into());
    };

    if actor.id != grantee_user_id && role != Role::Owner {
        return Err(ApiError::forbidden("Only the owner can remove other collaborators").into());
    }

    if !db.delete_share(task_id, grantee_user_id)? {
        return Err(ApiError::share_not_found(task_id, grantee_user_id).into());
    }

    info!(task_id, grantee = grantee_user_id, "Share revoked");
    Ok(())
}

/// The owner (tagged OWNER) plus every share's user tagged with its
/// permission. Any resolvable role may list.
pub fn list_collaborators(db: &Database, actor: &User, task_id: &str) -> Result<Vec<Collaborator>> {
    let Some((_, task)) = access::resolve(db, task_id, &actor.id)? else {
        return Err(ApiError::task_not_found(task_id).into());
    };

    let owner = db.require_user(&task.owner_id)?;
    let mut collaborators = vec![Collaborator {
        user_id: owner.id,
        name: owner.name,
        email: owner.email,
        role: Role::Owner,
    }];

    for share in db.list_shares_for_task(task_id)? {
        let user = db.require_user(&share.user_id)?;
        collaborators.push(Collaborator {
            user_id: user.id,
            name: user.name,
            email: user.email,
            role: share.permission.into(),
        });
    }

    Ok(collaborators)
}
