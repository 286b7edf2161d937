//! Push channel endpoints used by `static/js/sse.js`.

use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        Json,
    },
};
use serde_json::{json, Value};
use tokio_stream::{Stream, StreamExt};
use tower_cookies::Cookies;

use crate::{
    error::AppError,
    middleware::require_user,
    services::{user_channel, PushChannel, PushMessage},
    state::AppState,
};

/// GET /stock/channel/register/
///
/// Tells the browser which channel to subscribe to.
pub async fn register_channel(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<Value>, AppError> {
    let user = require_user(&cookies, &state).await?;
    Ok(Json(json!({ "channel": user_channel(user.id) })))
}

/// GET /stock/sse/
///
/// Sends a fixed test message to the caller's own channel.
pub async fn hello(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<&'static str, AppError> {
    let user = require_user(&cookies, &state).await?;

    if let Err(e) = state
        .hub
        .publish(&user_channel(user.id), PushMessage::text("hello world"))
    {
        log::debug!("test message not delivered: {}", e);
    }

    Ok("Ok")
}

/// GET /events/:channel/
///
/// Streams the channel as server-sent events. Notifications that could not
/// be delivered earlier come first, then live messages. The subscription is
/// opened before the backlog is read so nothing falls in between.
pub async fn subscribe(
    State(state): State<AppState>,
    cookies: Cookies,
    Path(channel): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, AppError> {
    let user = require_user(&cookies, &state).await?;
    if channel != user_channel(user.id) {
        return Err(AppError::Forbidden);
    }

    let rx = state.hub.subscribe(&channel);
    log::debug!(
        "{} subscribed; {} open stream(s) on the channel",
        user.email,
        state.hub.subscriber_count(&channel)
    );
    let stream = state
        .dispatcher
        .pending_then_live(user.id, rx)
        .await?
        .map(|m| Ok::<_, Infallible>(SseEvent::default().event(m.event).data(m.data.to_string())));

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
