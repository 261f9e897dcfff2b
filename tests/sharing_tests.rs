//! Tests for permission resolution and the share lifecycle.

use taskhub::access;
use taskhub::db::Database;
use taskhub::db::tasks::TaskDraft;
use taskhub::error::{ApiError, ErrorCode};
use taskhub::sharing::{self, InviteOutcome};
use taskhub::types::{NotificationKind, Role, SharePermission, User};

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn make_user(db: &Database, name: &str, email: &str) -> User {
    db.create_user(name, email, "hash").expect("Failed to create user")
}

fn make_task(db: &Database, owner: &User, title: &str) -> taskhub::types::Task {
    db.create_task(
        &owner.id,
        TaskDraft {
            title: title.to_string(),
            ..Default::default()
        },
    )
    .expect("Failed to create task")
}

fn error_code(err: anyhow::Error) -> ErrorCode {
    ApiError::from(err).code
}

mod resolver_tests {
    use super::*;

    #[test]
    fn owner_resolves_to_owner_role() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let task = make_task(&db, &owner, "Mine");

        let (role, resolved) = access::resolve(&db, &task.id, &owner.id).unwrap().unwrap();
        assert_eq!(role, Role::Owner);
        assert_eq!(resolved.id, task.id);
    }

    #[test]
    fn share_holder_resolves_to_share_permission() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let viewer = make_user(&db, "Bob", "bob@example.com");
        let editor = make_user(&db, "Cam", "cam@example.com");
        let task = make_task(&db, &owner, "Shared");
        db.create_share(&task.id, &viewer.id, SharePermission::Viewer, &owner.id)
            .unwrap();
        db.create_share(&task.id, &editor.id, SharePermission::Editor, &owner.id)
            .unwrap();

        let (role, _) = access::resolve(&db, &task.id, &viewer.id).unwrap().unwrap();
        assert_eq!(role, Role::Viewer);
        let (role, _) = access::resolve(&db, &task.id, &editor.id).unwrap().unwrap();
        assert_eq!(role, Role::Editor);
    }

    #[test]
    fn stranger_and_missing_task_are_indistinguishable() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let stranger = make_user(&db, "Eve", "eve@example.com");
        let task = make_task(&db, &owner, "Private");

        assert!(access::resolve(&db, &task.id, &stranger.id).unwrap().is_none());
        assert!(access::resolve(&db, "no-such-task", &stranger.id).unwrap().is_none());
    }

    #[test]
    fn require_role_collapses_insufficient_role_to_not_found() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let viewer = make_user(&db, "Bob", "bob@example.com");
        let task = make_task(&db, &owner, "Shared");
        db.create_share(&task.id, &viewer.id, SharePermission::Viewer, &owner.id)
            .unwrap();

        let err = access::require_role(&db, &task.id, &viewer.id, Role::Editor).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::TaskNotFound);

        assert!(access::require_role(&db, &task.id, &viewer.id, Role::Viewer).is_ok());
        assert!(access::require_role(&db, &task.id, &owner.id, Role::Owner).is_ok());
    }

    #[test]
    fn soft_deleted_task_is_invisible_to_share_holders_but_not_owner() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let editor = make_user(&db, "Bob", "bob@example.com");
        let task = make_task(&db, &owner, "Doomed");
        db.create_share(&task.id, &editor.id, SharePermission::Editor, &owner.id)
            .unwrap();

        db.soft_delete_task(&task.id).unwrap();

        assert!(access::resolve(&db, &task.id, &editor.id).unwrap().is_none());
        let (role, _) = access::resolve(&db, &task.id, &owner.id).unwrap().unwrap();
        assert_eq!(role, Role::Owner);
    }
}

mod invite_tests {
    use super::*;

    #[test]
    fn invite_creates_share_and_notifies_grantee_and_owner_audience() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let first = make_user(&db, "Bob", "bob@example.com");
        let second = make_user(&db, "Cam", "cam@example.com");
        let task = make_task(&db, &owner, "Launch");

        // Owner invites Bob
        let outcome =
            sharing::invite(&db, &owner, &task.id, "bob@example.com", SharePermission::Editor)
                .unwrap();
        assert!(matches!(outcome, InviteOutcome::Shared { .. }));

        let bob_inbox = db.list_notifications(&first.id).unwrap();
        assert_eq!(bob_inbox.len(), 1);
        assert_eq!(bob_inbox[0].kind, NotificationKind::TaskShared);
        assert_eq!(
            bob_inbox[0].message,
            "Ada shared \"Launch\" with you as Editor"
        );
        // The actor gets nothing
        assert!(db.list_notifications(&owner.id).unwrap().is_empty());

        // Bob (Editor) invites Cam: existing collaborators and the owner
        // hear COLLABORATOR_ADDED, Cam hears TASK_SHARED.
        sharing::invite(&db, &first, &task.id, "cam@example.com", SharePermission::Viewer).unwrap();

        let owner_inbox = db.list_notifications(&owner.id).unwrap();
        assert_eq!(owner_inbox.len(), 1);
        assert_eq!(owner_inbox[0].kind, NotificationKind::CollaboratorAdded);
        assert_eq!(owner_inbox[0].message, "Bob added Cam to \"Launch\"");

        let cam_inbox = db.list_notifications(&second.id).unwrap();
        assert_eq!(cam_inbox.len(), 1);
        assert_eq!(cam_inbox[0].kind, NotificationKind::TaskShared);

        // Bob invited, so Bob hears nothing new
        assert_eq!(db.list_notifications(&first.id).unwrap().len(), 1);
    }

    #[test]
    fn repeat_invite_is_idempotent_and_silent() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let grantee = make_user(&db, "Bob", "bob@example.com");
        let task = make_task(&db, &owner, "Launch");

        sharing::invite(&db, &owner, &task.id, "bob@example.com", SharePermission::Viewer).unwrap();
        let outcome =
            sharing::invite(&db, &owner, &task.id, "bob@example.com", SharePermission::Viewer)
                .unwrap();

        assert!(matches!(outcome, InviteOutcome::AlreadyShared { .. }));
        assert_eq!(db.list_shares_for_task(&task.id).unwrap().len(), 1);
        // Exactly the one TASK_SHARED from the first invite
        assert_eq!(db.list_notifications(&grantee.id).unwrap().len(), 1);
    }

    #[test]
    fn invite_with_different_permission_updates_in_place() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let grantee = make_user(&db, "Bob", "bob@example.com");
        let task = make_task(&db, &owner, "Launch");

        sharing::invite(&db, &owner, &task.id, "bob@example.com", SharePermission::Viewer).unwrap();
        let outcome =
            sharing::invite(&db, &owner, &task.id, "bob@example.com", SharePermission::Editor)
                .unwrap();

        match outcome {
            InviteOutcome::PermissionChanged { share } => {
                assert_eq!(share.permission, SharePermission::Editor);
            }
            other => panic!("expected PermissionChanged, got {:?}", other),
        }
        assert_eq!(db.list_shares_for_task(&task.id).unwrap().len(), 1);

        let inbox = db.list_notifications(&grantee.id).unwrap();
        assert_eq!(inbox.len(), 2);
        assert!(inbox.iter().any(|n| n.kind == NotificationKind::PermissionChanged));
    }

    #[test]
    fn viewer_can_never_grant_editor() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let viewer = make_user(&db, "Bob", "bob@example.com");
        make_user(&db, "Cam", "cam@example.com");
        let task = make_task(&db, &owner, "Launch");
        db.create_share(&task.id, &viewer.id, SharePermission::Viewer, &owner.id)
            .unwrap();

        let err =
            sharing::invite(&db, &viewer, &task.id, "cam@example.com", SharePermission::Editor)
                .unwrap_err();
        let api = ApiError::from(err);
        assert_eq!(api.code, ErrorCode::Forbidden);
        assert_eq!(api.message, "Viewers can only share as Viewer");

        // Upgrade attempt through the invite path is equally rejected
        sharing::invite(&db, &owner, &task.id, "cam@example.com", SharePermission::Viewer).unwrap();
        let err =
            sharing::invite(&db, &viewer, &task.id, "cam@example.com", SharePermission::Editor)
                .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::Forbidden);
    }

    #[test]
    fn viewer_sharing_as_viewer_succeeds() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let viewer = make_user(&db, "Bob", "bob@example.com");
        let invitee = make_user(&db, "Cam", "cam@example.com");
        let task = make_task(&db, &owner, "Launch");
        db.create_share(&task.id, &viewer.id, SharePermission::Viewer, &owner.id)
            .unwrap();

        let outcome =
            sharing::invite(&db, &viewer, &task.id, "cam@example.com", SharePermission::Viewer)
                .unwrap();
        assert!(matches!(outcome, InviteOutcome::Shared { .. }));

        assert_eq!(db.list_notifications(&invitee.id).unwrap().len(), 1);
        let owner_inbox = db.list_notifications(&owner.id).unwrap();
        assert_eq!(owner_inbox.len(), 1);
        assert_eq!(owner_inbox[0].kind, NotificationKind::CollaboratorAdded);
    }

    #[test]
    fn invite_rejects_owner_self_and_unknown_grantees() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let task = make_task(&db, &owner, "Launch");

        let err = sharing::invite(&db, &owner, &task.id, "ada@example.com", SharePermission::Viewer)
            .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::InvalidFieldValue);

        let err =
            sharing::invite(&db, &owner, &task.id, "ghost@example.com", SharePermission::Viewer)
                .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::UserNotFound);
    }

    #[test]
    fn stranger_cannot_invite_and_learns_nothing() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let stranger = make_user(&db, "Eve", "eve@example.com");
        make_user(&db, "Cam", "cam@example.com");
        let task = make_task(&db, &owner, "Private");

        let err =
            sharing::invite(&db, &stranger, &task.id, "cam@example.com", SharePermission::Viewer)
                .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::TaskNotFound);
    }
}

mod permission_change_tests {
    use super::*;

    #[test]
    fn owner_changes_permission_and_grantee_is_notified() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let grantee = make_user(&db, "Bob", "bob@example.com");
        let task = make_task(&db, &owner, "Launch");
        db.create_share(&task.id, &grantee.id, SharePermission::Viewer, &owner.id)
            .unwrap();

        let share =
            sharing::change_permission(&db, &owner, &task.id, &grantee.id, SharePermission::Editor)
                .unwrap();
        assert_eq!(share.permission, SharePermission::Editor);

        let inbox = db.list_notifications(&grantee.id).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::PermissionChanged);
        assert_eq!(
            inbox[0].message,
            "Ada changed your access to \"Launch\" to Editor"
        );
    }

    #[test]
    fn non_owner_cannot_change_permissions() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let editor = make_user(&db, "Bob", "bob@example.com");
        let other = make_user(&db, "Cam", "cam@example.com");
        let task = make_task(&db, &owner, "Launch");
        db.create_share(&task.id, &editor.id, SharePermission::Editor, &owner.id)
            .unwrap();
        db.create_share(&task.id, &other.id, SharePermission::Viewer, &owner.id)
            .unwrap();

        let err =
            sharing::change_permission(&db, &editor, &task.id, &other.id, SharePermission::Editor)
                .unwrap_err();
        assert_eq!(error_code(err), ErrorCode::TaskNotFound);
    }
}

mod revoke_tests {
    use super::*;

    #[test]
    fn owner_revokes_and_access_returns_to_none() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let grantee = make_user(&db, "Bob", "bob@example.com");
        let task = make_task(&db, &owner, "Launch");
        db.create_share(&task.id, &grantee.id, SharePermission::Editor, &owner.id)
            .unwrap();

        sharing::revoke(&db, &owner, &task.id, &grantee.id).unwrap();
        assert!(access::resolve(&db, &task.id, &grantee.id).unwrap().is_none());
    }

    #[test]
    fn grantee_can_remove_themself() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let grantee = make_user(&db, "Bob", "bob@example.com");
        let task = make_task(&db, &owner, "Launch");
        db.create_share(&task.id, &grantee.id, SharePermission::Viewer, &owner.id)
            .unwrap();

        sharing::revoke(&db, &grantee, &task.id, &grantee.id).unwrap();
        assert!(db.find_share(&task.id, &grantee.id).unwrap().is_none());
    }

    #[test]
    fn collaborator_cannot_revoke_someone_else() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let editor = make_user(&db, "Bob", "bob@example.com");
        let other = make_user(&db, "Cam", "cam@example.com");
        let task = make_task(&db, &owner, "Launch");
        db.create_share(&task.id, &editor.id, SharePermission::Editor, &owner.id)
            .unwrap();
        db.create_share(&task.id, &other.id, SharePermission::Viewer, &owner.id)
            .unwrap();

        let err = sharing::revoke(&db, &editor, &task.id, &other.id).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::Forbidden);
        assert!(db.find_share(&task.id, &other.id).unwrap().is_some());
    }

    #[test]
    fn revoke_is_silent() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let grantee = make_user(&db, "Bob", "bob@example.com");
        let task = make_task(&db, &owner, "Launch");
        db.create_share(&task.id, &grantee.id, SharePermission::Viewer, &owner.id)
            .unwrap();

        sharing::revoke(&db, &owner, &task.id, &grantee.id).unwrap();
        assert!(db.list_notifications(&grantee.id).unwrap().is_empty());
    }
}

mod collaborator_list_tests {
    use super::*;

    #[test]
    fn owner_is_first_and_tagged_owner() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let viewer = make_user(&db, "Bob", "bob@example.com");
        let editor = make_user(&db, "Cam", "cam@example.com");
        let task = make_task(&db, &owner, "Launch");
        db.create_share(&task.id, &viewer.id, SharePermission::Viewer, &owner.id)
            .unwrap();
        db.create_share(&task.id, &editor.id, SharePermission::Editor, &owner.id)
            .unwrap();

        let collaborators = sharing::list_collaborators(&db, &viewer, &task.id).unwrap();
        assert_eq!(collaborators.len(), 3);
        assert_eq!(collaborators[0].user_id, owner.id);
        assert_eq!(collaborators[0].role, Role::Owner);

        let bob = collaborators.iter().find(|c| c.user_id == viewer.id).unwrap();
        assert_eq!(bob.role, Role::Viewer);
        let cam = collaborators.iter().find(|c| c.user_id == editor.id).unwrap();
        assert_eq!(cam.role, Role::Editor);
    }

    #[test]
    fn stranger_cannot_list_collaborators() {
        let db = setup_db();
        let owner = make_user(&db, "Ada", "ada@example.com");
        let stranger = make_user(&db, "Eve", "eve@example.com");
        let task = make_task(&db, &owner, "Private");

        let err = sharing::list_collaborators(&db, &stranger, &task.id).unwrap_err();
        assert_eq!(error_code(err), ErrorCode::TaskNotFound);
    }
}
