//! taskhub -- collaborative task tracking with per-task shares,
//! notification fan-out, and due-date reminders.

pub mod access;
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod reminders;
pub mod sharing;
pub mod tasks;
pub mod types;
