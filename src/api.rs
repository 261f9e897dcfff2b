//! HTTP surface: router factory and handlers.
//!
//! Handlers are thin: decode the payload, resolve the current user, call
//! the service layer, serialize the result. All policy lives below this
//! module.

use crate::auth::{self, CurrentUser};
use crate::config::AppConfig;
use crate::db::Database;
use crate::db::tasks::{TaskDraft, TaskPatch};
use crate::error::ApiError;
use crate::sharing::{self, InviteOutcome};
use crate::tasks;
use crate::types::{Reminder, SharePermission, TaskStatus, User};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
}

/// Build the application router over the given state.
pub fn create_app(db: Database, config: Arc<AppConfig>) -> Router {
    let state = AppState { db, config };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        // Accounts
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/me", get(me).patch(update_me))
        // Tasks
        .route("/api/tasks", post(create_task).get(list_tasks))
        .route(
            "/api/tasks/{task_id}",
            get(get_task).patch(update_task).delete(soft_delete_task),
        )
        .route("/api/tasks/{task_id}/archive", post(archive_task))
        .route("/api/tasks/{task_id}/unarchive", post(unarchive_task))
        .route("/api/tasks/{task_id}/restore", post(restore_task))
        .route(
            "/api/tasks/{task_id}/permanent",
            axum::routing::delete(delete_task_permanent),
        )
        // Sharing
        .route("/api/tasks/{task_id}/shares", post(invite))
        .route(
            "/api/tasks/{task_id}/shares/{user_id}",
            patch(change_permission).delete(revoke),
        )
        .route("/api/tasks/{task_id}/collaborators", get(list_collaborators))
        // Notifications
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/read-all", post(read_all_notifications))
        .route(
            "/api/notifications/{id}",
            axum::routing::delete(delete_notification),
        )
        .route("/api/notifications/{id}/read", post(read_notification))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Deserialize a present-but-null field as `Some(None)` so PATCH bodies
/// can distinguish "clear this" from "leave it alone".
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

// ---------------------------------------------------------------------------
// Accounts

#[derive(Debug, Deserialize)]
struct SignupRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    user: User,
}

async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::missing_field("name"));
    }
    if !payload.email.contains('@') {
        return Err(ApiError::invalid_value("email", "Invalid email address"));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::invalid_value(
            "password",
            "Password must be at least 8 characters",
        ));
    }

    if state
        .db
        .find_user_by_email(&payload.email)
        .map_err(ApiError::from)?
        .is_some()
    {
        return Err(ApiError::email_taken(&payload.email));
    }

    let hash = auth::hash_password(&payload.password)?;
    let user = state
        .db
        .create_user(payload.name.trim(), &payload.email, &hash)
        .map_err(ApiError::from)?;

    let token = auth::issue_token(
        &user.id,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_minutes,
    )?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = state
        .db
        .find_user_by_email(&payload.email)
        .map_err(ApiError::from)?
        .ok_or_else(ApiError::invalid_credentials)?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::invalid_credentials());
    }

    let token = auth::issue_token(
        &user.id,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_minutes,
    )?;

    Ok(Json(AuthResponse { token, user }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

#[derive(Debug, Deserialize)]
struct ProfilePatch {
    name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    default_view: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    timezone: Option<Option<String>>,
}

async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<ProfilePatch>,
) -> Result<Json<User>, ApiError> {
    let updated = state
        .db
        .update_profile(&user.id, payload.name, payload.default_view, payload.timezone)
        .map_err(ApiError::from)?;
    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// Tasks

#[derive(Debug, Deserialize)]
struct CreateTaskRequest {
    title: String,
    description: Option<String>,
    status: Option<TaskStatus>,
    #[serde(default)]
    tags: Vec<String>,
    due_date: Option<i64>,
    #[serde(default)]
    is_time_based: bool,
    #[serde(default)]
    reminders: Vec<Reminder>,
}

#[derive(Debug, Deserialize, Default)]
struct UpdateTaskRequest {
    title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
    status: Option<TaskStatus>,
    tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    due_date: Option<Option<i64>>,
    is_time_based: Option<bool>,
    reminders: Option<Vec<Reminder>>,
}

#[derive(Debug, Deserialize, Default)]
struct ListTasksQuery {
    #[serde(default)]
    include_archived: bool,
}

async fn create_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = TaskDraft {
        title: payload.title,
        description: payload.description,
        status: payload.status,
        tags: payload.tags,
        due_date: payload.due_date,
        is_time_based: payload.is_time_based,
        reminders: payload.reminders,
    };

    let task = tasks::create(&state.db, &user, draft).map_err(ApiError::from)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListTasksQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tasks = tasks::list(&state.db, &user, query.include_archived).map_err(ApiError::from)?;
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (role, task) = tasks::get(&state.db, &user, &task_id).map_err(ApiError::from)?;
    Ok(Json(json!({ "role": role, "task": task })))
}

async fn update_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<String>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = TaskPatch {
        title: payload.title,
        description: payload.description,
        status: payload.status,
        tags: payload.tags,
        due_date: payload.due_date,
        is_time_based: payload.is_time_based,
        reminders: payload.reminders,
    };

    let task = tasks::update(&state.db, &user, &task_id, patch).map_err(ApiError::from)?;
    Ok(Json(task))
}

async fn archive_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = tasks::archive(&state.db, &user, &task_id).map_err(ApiError::from)?;
    Ok(Json(task))
}

async fn unarchive_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = tasks::unarchive(&state.db, &user, &task_id).map_err(ApiError::from)?;
    Ok(Json(task))
}

async fn soft_delete_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = tasks::soft_delete(&state.db, &user, &task_id).map_err(ApiError::from)?;
    Ok(Json(task))
}

async fn restore_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = tasks::restore(&state.db, &user, &task_id).map_err(ApiError::from)?;
    Ok(Json(task))
}

async fn delete_task_permanent(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    tasks::delete_permanent(&state.db, &user, &task_id).map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Sharing

#[derive(Debug, Deserialize)]
struct InviteRequest {
    email: String,
    permission: SharePermission,
}

#[derive(Debug, Deserialize)]
struct ChangePermissionRequest {
    permission: SharePermission,
}

async fn invite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<String>,
    Json(payload): Json<InviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = sharing::invite(
        &state.db,
        &user,
        &task_id,
        &payload.email,
        payload.permission,
    )
    .map_err(ApiError::from)?;

    let status = match outcome {
        InviteOutcome::Shared { .. } => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

async fn change_permission(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((task_id, grantee_id)): Path<(String, String)>,
    Json(payload): Json<ChangePermissionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let share = sharing::change_permission(
        &state.db,
        &user,
        &task_id,
        &grantee_id,
        payload.permission,
    )
    .map_err(ApiError::from)?;
    Ok(Json(share))
}

async fn revoke(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((task_id, grantee_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    sharing::revoke(&state.db, &user, &task_id, &grantee_id).map_err(ApiError::from)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_collaborators(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let collaborators =
        sharing::list_collaborators(&state.db, &user, &task_id).map_err(ApiError::from)?;
    Ok(Json(collaborators))
}

// ---------------------------------------------------------------------------
// Notifications

async fn list_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let notifications = state
        .db
        .list_notifications(&user.id)
        .map_err(ApiError::from)?;
    Ok(Json(notifications))
}

async fn unread_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let count = state
        .db
        .unread_notification_count(&user.id)
        .map_err(ApiError::from)?;
    Ok(Json(json!({ "unread": count })))
}

async fn read_notification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state
        .db
        .mark_notification_read(&id, &user.id)
        .map_err(ApiError::from)?
    {
        return Err(ApiError::notification_not_found(&id));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn read_all_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .db
        .mark_all_notifications_read(&user.id)
        .map_err(ApiError::from)?;
    Ok(Json(json!({ "updated": updated })))
}

async fn delete_notification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state
        .db
        .delete_notification(&id, &user.id)
        .map_err(ApiError::from)?
    {
        return Err(ApiError::notification_not_found(&id));
    }
    Ok(StatusCode::NO_CONTENT)
}
