//! Station endpoints.

use api_types::station::{StationNew, StationUpdate as ApiStationUpdate, StationView};
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use engine::{NewStation, StationUpdate};

use crate::{
    CurrentUser, ServerError,
    extract::{Json, Path},
    server::ServerState,
    views,
};

pub async fn list(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<Vec<StationView>>, ServerError> {
    let stations = state.engine.list_stations(current.user.id).await?;
    Ok(Json(
        stations
            .into_iter()
            .map(|s| views::station(s.station, Some((s.operators, s.checks))))
            .collect(),
    ))
}

pub async fn create(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<StationNew>,
) -> Result<(StatusCode, Json<StationView>), ServerError> {
    let new_station = NewStation {
        name: payload.name,
        address: payload.address,
        phone: payload.phone,
    };
    let station = state
        .engine
        .create_station(new_station, current.user.id, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(views::station(station, None))))
}

pub async fn update(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<ApiStationUpdate>,
) -> Result<Json<StationView>, ServerError> {
    if payload.name.is_none()
        && payload.address.is_none()
        && payload.phone.is_none()
        && payload.is_active.is_none()
    {
        return Err(ServerError::Generic(
            "provide at least one of name, address, phone or isActive".to_string(),
        ));
    }

    let update = StationUpdate {
        name: payload.name,
        address: payload.address,
        phone: payload.phone,
        is_active: payload.is_active,
    };
    let station = state
        .engine
        .update_station(id, update, current.user.id)
        .await?;
    Ok(Json(views::station(station, None)))
}

pub async fn delete(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_station(id, current.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
