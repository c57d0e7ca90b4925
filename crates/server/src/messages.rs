//! Broadcast message endpoints.

use api_types::{
    PageQuery, Paginated,
    message::{BroadcastResponse, MessageNew, MessageView},
};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use engine::PageRequest;

use crate::{
    CurrentUser, ServerError,
    extract::{Json, Query},
    notify::broadcast_text,
    server::ServerState,
    views,
};

/// Records a broadcast, then hands it to the notifier once committed.
pub async fn send_all(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<MessageNew>,
) -> Result<(StatusCode, Json<BroadcastResponse>), ServerError> {
    let broadcast = state
        .engine
        .broadcast_message(&payload.title, &payload.content, current.user.id, Utc::now())
        .await?;

    let text = broadcast_text(&broadcast.message.title, &broadcast.message.content);
    let delivered = state.notifier.deliver(&broadcast.recipients, &text).await;
    let delivered_count = state
        .engine
        .record_delivery(broadcast.message.id, &delivered, Utc::now())
        .await?;
    tracing::info!(
        message_id = broadcast.message.id,
        recipients = broadcast.recipients.len(),
        delivered = delivered_count,
        "broadcast sent"
    );

    let recipients_count = broadcast.message.recipients;
    Ok((
        StatusCode::CREATED,
        Json(BroadcastResponse {
            message: views::message(broadcast.message),
            recipients_count,
            delivered_count,
        }),
    ))
}

pub async fn list(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<MessageView>>, ServerError> {
    let request = PageRequest::new(query.page, query.limit)?;
    let page = state
        .engine
        .list_messages(request, current.user.id)
        .await?;
    Ok(Json(views::page(page, views::message)))
}
