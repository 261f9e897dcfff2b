//! Permission resolution for tasks.
//!
//! Ownership is checked first, then share rows. A caller with no
//! resolvable role gets the same not-found outcome as a caller naming a
//! task that does not exist, so existence never leaks.

use crate::db::Database;
use crate::error::ApiError;
use crate::types::{Role, Task};
use anyhow::Result;

/// Resolve a user's role on a task. Pure read, no side effects.
///
/// Owners can still resolve a soft-deleted task (they need to for restore
/// and permanent delete); share-holders cannot.
pub fn resolve(db: &Database, task_id: &str, user_id: &str) -> Result<Option<(Role, Task)>> {
    if let Some(task) = db.find_task_by_owner(task_id, user_id)? {
        return Ok(Some((Role::Owner, task)));
    }

    let Some(share) = db.find_share(task_id, user_id)? else {
        return Ok(None);
    };

    match db.get_task(task_id)? {
        Some(task) if task.deleted_at.is_none() => Ok(Some((share.permission.into(), task))),
        _ => Ok(None),
    }
}

/// Strict variant: fail unless the resolved role meets `min_role` under
/// the ordering OWNER > EDITOR > VIEWER.
///
/// An insufficient role collapses to the same not-found error as no role
/// at all. Policy checks that must say "forbidden" (a Viewer granting
/// Editor, a non-owner revoking someone else) compare role identity in the
/// sharing service instead of going through this ordering.
pub fn require_role(
    db: &Database,
    task_id: &str,
    user_id: &str,
    min_role: Role,
) -> Result<(Role, Task)> {
    match resolve(db, task_id, user_id)? {
        Some((role, task)) if role >= min_role => Ok((role, task)),
        _ => Err(ApiError::task_not_found(task_id).into()),
    }
}
