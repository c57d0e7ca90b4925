//! Authentication endpoints.

use api_types::{
    auth::{LoginRequest, LoginResponse},
    user::UserView,
};
use axum::{Extension, extract::State, http::StatusCode};
use chrono::Utc;

use crate::{CurrentUser, ServerError, extract::Json, server::ServerState, views};

pub async fn login(
    State(state): State<ServerState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ServerError> {
    let session = state
        .engine
        .login(&payload.username, &payload.password, Utc::now())
        .await?;

    Ok(Json(LoginResponse {
        user: views::user(session.user),
        access_token: session.token,
        expires_at: session.expires_at,
    }))
}

pub async fn logout(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<StatusCode, ServerError> {
    state.engine.logout(&current.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<UserView> {
    Json(views::user(current.user))
}
