use axum::{
    extract::{Path, State},
    response::Redirect,
};
use askama::Template;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::require_user,
    models::Notification,
    state::AppState,
};

#[derive(Template)]
#[template(path = "notifications.html")]
pub struct NotificationsTemplate {
    notifications: Vec<Notification>,
    unread_count: usize,
}

pub async fn notifications_list(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<NotificationsTemplate, AppError> {
    let current_user = require_user(&cookies, &state).await?;

    let notifications = sqlx::query_as::<_, Notification>(
        "SELECT * FROM notifications WHERE destination_id = $1 ORDER BY created_at DESC LIMIT 200",
    )
    .bind(current_user.id)
    .fetch_all(&state.db)
    .await?;
    let unread_count = notifications.iter().filter(|n| !n.read).count();

    Ok(NotificationsTemplate {
        notifications,
        unread_count,
    })
}

pub async fn mark_read(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(notification_id): Path<Uuid>,
) -> Result<Redirect, AppError> {
    let current_user = require_user(&cookies, &state).await?;

    let updated = sqlx::query(
        "UPDATE notifications SET read = true WHERE id = $1 AND destination_id = $2",
    )
    .bind(notification_id)
    .bind(current_user.id)
    .execute(&state.db)
    .await?
    .rows_affected();
    if updated == 0 {
        return Err(AppError::NotFound("notification"));
    }

    Ok(Redirect::to("/notifications"))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Redirect, AppError> {
    let current_user = require_user(&cookies, &state).await?;

    sqlx::query("UPDATE notifications SET read = true WHERE destination_id = $1 AND read = false")
        .bind(current_user.id)
        .execute(&state.db)
        .await?;

    Ok(Redirect::to("/notifications"))
}
