//! Check (voucher) endpoints.

use api_types::{
    Paginated,
    check::{CheckListQuery, CheckNew, CheckReactivate, CheckView},
};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use engine::{CheckListFilter, CreateCheckCmd, CustomerInfo, EngineError, Liters, PageRequest};

use crate::{
    CurrentUser, ServerError,
    extract::{Json, Path, Query},
    server::ServerState,
    views,
};

pub async fn create(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<CheckNew>,
) -> Result<(StatusCode, Json<CheckView>), ServerError> {
    let amount: Liters = payload.amount_liters.to_string().parse()?;
    let operator_id = payload.operator_id.unwrap_or(current.user.id);
    let station_id = payload
        .station_id
        .or(current.user.station_id)
        .ok_or_else(|| EngineError::Validation("stationId is required".to_string()))?;

    let cmd = CreateCheckCmd {
        amount,
        operator_id,
        station_id,
        customer: CustomerInfo {
            name: payload.customer_name,
            phone: payload.customer_phone,
            address: payload.customer_address,
        },
    };
    let check = state
        .engine
        .create_check(cmd, current.user.id, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(views::check(check))))
}

pub async fn list(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<CheckListQuery>,
) -> Result<Json<Paginated<CheckView>>, ServerError> {
    let request = PageRequest::new(query.page, query.limit)?;
    let filter = CheckListFilter {
        station_id: query.station_id,
        status: query.status.map(views::parse_status),
        operator_id: query.operator_id,
        is_printed: query.is_printed,
        customer_id: query.customer_id,
    };
    let page = state
        .engine
        .list_checks(&filter, request, current.user.id)
        .await?;

    Ok(Json(views::page(page, views::check)))
}

pub async fn get(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<CheckView>, ServerError> {
    let check = state.engine.check(id, current.user.id).await?;
    Ok(Json(views::check(check)))
}

pub async fn confirm(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<CheckView>, ServerError> {
    let check = state
        .engine
        .confirm_check(id, current.user.id, Utc::now())
        .await?;
    Ok(Json(views::check(check)))
}

pub async fn print(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<CheckView>, ServerError> {
    let check = state.engine.mark_printed(id, current.user.id).await?;
    Ok(Json(views::check(check)))
}

pub async fn cancel(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<CheckView>, ServerError> {
    let check = state.engine.cancel_check(id, current.user.id).await?;
    Ok(Json(views::check(check)))
}

pub async fn reactivate(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<CheckReactivate>,
) -> Result<Json<CheckView>, ServerError> {
    let amount: Liters = payload.amount_liters.to_string().parse()?;
    let operator_id = payload.operator_id.unwrap_or(current.user.id);
    let check = state
        .engine
        .reactivate_check(id, amount, operator_id, current.user.id, Utc::now())
        .await?;
    Ok(Json(views::check(check)))
}

pub async fn delete(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .delete_check(id, current.user.id, Utc::now())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
