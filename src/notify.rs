//! Notification fan-out engine.
//!
//! `notify` writes one durable record per call. Writes are independent and
//! best-effort: a failed write is logged and never aborts the mutation
//! that triggered it or the rest of a recipient loop. Callers compute the
//! recipient set; the engine only enforces the self-notification ban.

use crate::db::Database;
use crate::db::notifications::NewNotification;
use crate::types::{NotificationKind, Task, TaskShare};
use tracing::warn;

/// A notification event for one recipient.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub task_id: String,
    pub task_title: String,
    pub actor_id: String,
    pub actor_name: String,
    pub message: String,
}

/// Write one notification, unless the recipient is the actor.
pub fn notify(db: &Database, event: NotificationEvent) {
    if event.recipient_id == event.actor_id {
        return;
    }

    let recipient_id = event.recipient_id.clone();
    let kind = event.kind;
    let result = db.create_notification(NewNotification {
        user_id: event.recipient_id,
        kind: event.kind,
        task_id: event.task_id,
        task_title: event.task_title,
        actor_id: event.actor_id,
        actor_name: event.actor_name,
        message: event.message,
    });

    if let Err(e) = result {
        warn!(
            recipient = %recipient_id,
            kind = ?kind,
            error = %e,
            "Dropped notification write"
        );
    }
}

/// Recipients for a task mutation: the owner plus every share-holder,
/// minus the actor.
pub fn task_audience(task: &Task, shares: &[TaskShare], actor_id: &str) -> Vec<String> {
    let mut recipients = Vec::with_capacity(shares.len() + 1);
    if task.owner_id != actor_id {
        recipients.push(task.owner_id.clone());
    }
    for share in shares {
        if share.user_id != actor_id && !recipients.contains(&share.user_id) {
            recipients.push(share.user_id.clone());
        }
    }
    recipients
}

/// Which tracked fields a task edit touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditedFields {
    pub status: bool,
    pub title: bool,
    pub due_date: bool,
    pub description: bool,
}

impl EditedFields {
    pub fn count(&self) -> usize {
        [self.status, self.title, self.due_date, self.description]
            .iter()
            .filter(|&&c| c)
            .count()
    }
}

/// Compose the human-readable clause for a TASK_EDITED notification.
/// One changed field is named; several collapse to "updated details";
/// none of the tracked fields falls back to a generic "edited".
pub fn edit_message(actor_name: &str, task_title: &str, fields: EditedFields) -> String {
    match fields.count() {
        0 => format!("{} edited \"{}\"", actor_name, task_title),
        1 => {
            let field = if fields.status {
                "the status of"
            } else if fields.title {
                "the title of"
            } else if fields.due_date {
                "the due date of"
            } else {
                "the description of"
            };
            format!("{} changed {} \"{}\"", actor_name, field, task_title)
        }
        _ => format!("{} updated details of \"{}\"", actor_name, task_title),
    }
}

/// Compose the time-to-due clause for a reminder, from the rounded number
/// of minutes until the due date.
pub fn due_phrase(minutes_to_due: i64) -> String {
    let m = minutes_to_due;
    if m <= 0 {
        return "is now due!".to_string();
    }
    if m < 60 {
        return format!("is due in {} minute{}", m, plural(m));
    }
    if m < 1440 {
        let h = ((m as f64) / 60.0).round() as i64;
        return format!("is due in {} hour{}", h, plural(h));
    }
    let d = ((m as f64) / 1440.0).round() as i64;
    format!("is due in {} day{}", d, plural(d))
}

/// Rounded minutes between now and the due date.
pub fn minutes_to_due(due_date: i64, now: i64) -> i64 {
    (((due_date - now) as f64) / 60_000.0).round() as i64
}

fn plural(n: i64) -> &'static str {
    if n == 1 { "" } else { "s" }
}
