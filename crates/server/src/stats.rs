//! Statistics endpoints

use api_types::stats::{GlobalStatsView, OperatorStatsView};
use axum::{Extension, extract::State};
use chrono::Utc;

use crate::{
    CurrentUser, ServerError,
    extract::{Json, Path},
    server::ServerState,
    views,
};

/// Whole-system counters.
pub async fn global(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<GlobalStatsView>, ServerError> {
    let stats = state.engine.global_stats(current.user.id).await?;
    Ok(Json(views::global_stats(stats)))
}

/// Today/month/total figures of one operator.
pub async fn operator(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(operator_id): Path<i64>,
) -> Result<Json<OperatorStatsView>, ServerError> {
    let stats = state
        .engine
        .operator_stats(operator_id, current.user.id, Utc::now())
        .await?;
    Ok(Json(views::operator_stats(stats)))
}
