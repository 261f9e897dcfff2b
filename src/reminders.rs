//! Reminder scheduler.
//!
//! An owned scheduler object drives a recurring scan over time-based open
//! tasks and fires at most one REMINDER notification per (owner, task)
//! within the dedup window. There is no process-wide singleton; multiple
//! instances can run side by side in tests.

use crate::config::SchedulerConfig;
use crate::db::notifications::NewNotification;
use crate::db::{Database, now_ms};
use crate::notify;
use crate::types::{NotificationKind, Task};
use anyhow::Result;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Width of the exact-hit window around a trigger time.
const FIRE_WINDOW_MS: i64 = 60_000;

/// Recurring background scanner for due-date reminders.
pub struct ReminderScheduler {
    db: Database,
    config: SchedulerConfig,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ReminderScheduler {
    pub fn new(db: Database, config: SchedulerConfig) -> Self {
        Self {
            db,
            config,
            shutdown_tx: None,
        }
    }

    /// Start the recurring scan. Idempotent: starting while already
    /// running cancels the previous timer first. The first scan runs
    /// immediately.
    pub fn start(&mut self) {
        self.stop();

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let db = self.db.clone();
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let dedup_window_minutes = self.config.dedup_window_minutes;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            // First tick completes immediately; a stalled cycle delays the
            // next tick instead of bursting.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("Reminder scheduler stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = scan_cycle(&db, dedup_window_minutes, now_ms()) {
                            // The timer is never torn down by a cycle failure.
                            error!(error = %e, "Reminder scan cycle failed");
                        }
                    }
                }
            }
        });

        self.shutdown_tx = Some(shutdown_tx);
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            dedup_window_minutes = self.config.dedup_window_minutes,
            "Reminder scheduler started"
        );
    }

    /// Cancel the recurring timer. A scan already in flight runs to
    /// completion.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One scan over all eligible tasks. Each task's evaluation is isolated:
/// a failure is logged and the scan moves on.
pub fn scan_cycle(db: &Database, dedup_window_minutes: i64, now: i64) -> Result<()> {
    let tasks = db.query_time_based_open_tasks()?;
    debug!(count = tasks.len(), "Reminder scan");

    for task in &tasks {
        if let Err(e) = evaluate_task(db, task, dedup_window_minutes, now) {
            warn!(task_id = %task.id, error = %e, "Reminder evaluation failed; continuing scan");
        }
    }

    Ok(())
}

/// Evaluate every reminder on one task and fire at most once.
///
/// A reminder fires when now landed inside the one-minute window around
/// its trigger time, or when the trigger was missed by a polling gap but
/// the due date has not passed yet (catch-up). A REMINDER notification for
/// this (owner, task) within the dedup window suppresses firing -- which
/// also caps a multi-reminder task at one notification per scan.
fn evaluate_task(db: &Database, task: &Task, dedup_window_minutes: i64, now: i64) -> Result<()> {
    let Some(due_date) = task.due_date else {
        return Ok(());
    };

    for reminder in &task.reminders {
        let Some(trigger) = reminder.trigger_time(task.due_date) else {
            continue;
        };

        if !should_fire(trigger, due_date, now) {
            continue;
        }

        let recent = db.find_recent_reminder_notification(
            &task.owner_id,
            &task.id,
            dedup_window_minutes,
            now,
        )?;
        if recent.is_some() {
            debug!(task_id = %task.id, "Reminder suppressed by dedup window");
            continue;
        }

        fire(db, task, due_date, now)?;
    }

    Ok(())
}

/// Exact window: |now - trigger| < 1 minute. Catch-up: the trigger passed
/// inside a polling gap but the due date has not.
fn should_fire(trigger: i64, due_date: i64, now: i64) -> bool {
    (now - trigger).abs() < FIRE_WINDOW_MS || (trigger <= now && now < due_date)
}

/// Write the REMINDER notification for the task owner.
///
/// This is the one legitimate self-notification, so it goes through the
/// low-level write rather than the fan-out engine's actor suppression.
fn fire(db: &Database, task: &Task, due_date: i64, now: i64) -> Result<()> {
    let owner = db.require_user(&task.owner_id)?;
    let phrase = notify::due_phrase(notify::minutes_to_due(due_date, now));
    let message = format!("\"{}\" {}", task.title, phrase);

    db.create_notification(NewNotification {
        user_id: task.owner_id.clone(),
        kind: NotificationKind::Reminder,
        task_id: task.id.clone(),
        task_title: task.title.clone(),
        actor_id: task.owner_id.clone(),
        actor_name: owner.name,
        message,
    })?;

    info!(task_id = %task.id, owner = %task.owner_id, "Reminder fired");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_window_is_one_minute_either_side() {
        let due = 1_000 * 60_000;
        let trigger = due - 30 * 60_000;
        assert!(should_fire(trigger, due, trigger - 59_999));
        assert!(should_fire(trigger, due, trigger + 59_999));
        assert!(!should_fire(trigger, due, trigger - 60_000));
    }

    #[test]
    fn catch_up_fires_until_due_date_passes() {
        let due = 1_000 * 60_000;
        let trigger = due - 30 * 60_000;
        // Missed by several poll ticks, still before due
        assert!(should_fire(trigger, due, trigger + 10 * 60_000));
        // Due date reached: no catch-up
        assert!(!should_fire(trigger, due, due));
        assert!(!should_fire(trigger, due, due + 60_000));
    }

    #[test]
    fn before_trigger_window_never_fires() {
        let due = 1_000 * 60_000;
        let trigger = due - 30 * 60_000;
        assert!(!should_fire(trigger, due, trigger - 21 * 60_000));
    }
}
