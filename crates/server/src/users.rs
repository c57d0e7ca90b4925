//! User management endpoints.

use api_types::{
    PageQuery, Paginated,
    user::{LedgerEntryView, UserListQuery, UserNew, UserUpdate as ApiUserUpdate, UserView},
};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use engine::{NewUser, PageRequest, UserListFilter, UserUpdate};

use crate::{
    CurrentUser, ServerError,
    extract::{Json, Path, Query},
    server::ServerState,
    views,
};

pub async fn list(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Paginated<UserView>>, ServerError> {
    let request = PageRequest::new(query.page, query.limit)?;
    let filter = UserListFilter {
        role: query.role.map(views::parse_role),
        station_id: query.station_id,
        is_active: query.is_active,
    };
    let page = state
        .engine
        .list_users(&filter, request, current.user.id)
        .await?;
    Ok(Json(views::page(page, views::user)))
}

pub async fn get(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<UserView>, ServerError> {
    let user = state.engine.user(id, current.user.id).await?;
    Ok(Json(views::user(user)))
}

pub async fn create(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<UserNew>,
) -> Result<(StatusCode, Json<UserView>), ServerError> {
    let new_user = NewUser {
        role: views::parse_role(payload.role),
        username: payload.username,
        password: payload.password,
        full_name: payload.full_name,
        phone: payload.phone,
        telegram_id: payload.telegram_id,
        telegram_username: None,
        station_id: payload.station_id,
    };
    let user = state
        .engine
        .create_user(new_user, current.user.id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(views::user(user))))
}

pub async fn update(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<ApiUserUpdate>,
) -> Result<Json<UserView>, ServerError> {
    let update = UserUpdate {
        full_name: payload.full_name,
        phone: payload.phone,
        telegram_id: payload.telegram_id,
        role: payload.role.map(views::parse_role),
        station_id: payload.station_id,
        is_active: payload.is_active,
        password: payload.password,
    };
    let user = state
        .engine
        .update_user(id, update, current.user.id)
        .await?;
    Ok(Json(views::user(user)))
}

pub async fn delete(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_user(id, current.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn station_customers(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(station_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<UserView>>, ServerError> {
    let request = PageRequest::new(query.page, query.limit)?;
    let page = state
        .engine
        .station_customers(station_id, request, current.user.id)
        .await?;
    Ok(Json(views::page(page, views::user)))
}

pub async fn ledger(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<LedgerEntryView>>, ServerError> {
    let entries = state.engine.customer_ledger(id, current.user.id).await?;
    Ok(Json(entries.into_iter().map(views::ledger_entry).collect()))
}
