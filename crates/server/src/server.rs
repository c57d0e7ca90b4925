use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use chrono::Utc;
use engine::{Engine, EngineError, User};

use std::sync::Arc;

use crate::{
    LogNotifier, Notifier, ServerError, auth, checks, messages, reports, stations, stats, users,
};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub notifier: Arc<dyn Notifier>,
}

impl ServerState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

/// Authenticated caller, inserted by the auth middleware.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: User,
    pub token: String,
}

async fn require_session(
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let token = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .map(|header| header.token().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| EngineError::Unauthenticated("missing bearer token".to_string()))?;

    let user = state.engine.authenticate(&token, Utc::now()).await?;

    request.extensions_mut().insert(CurrentUser { user, token });
    Ok(next.run(request).await)
}

pub fn router(state: ServerState) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/checks", get(checks::list).post(checks::create))
        .route("/checks/export/excel", get(reports::export_checks))
        .route("/checks/{id}", get(checks::get).delete(checks::delete))
        .route("/checks/{id}/confirm", put(checks::confirm))
        .route("/checks/{id}/print", put(checks::print))
        .route("/checks/{id}/cancel", put(checks::cancel))
        .route("/checks/{id}/reactivate", put(checks::reactivate))
        .route("/stats", get(stats::global))
        .route("/stats/operator/{id}", get(stats::operator))
        .route("/users", get(users::list).post(users::create))
        .route("/users/top", get(reports::top_customers))
        .route("/users/report", get(reports::customers_report))
        .route("/users/export/excel", get(reports::export_customers))
        .route("/users/station/{id}/customers", get(users::station_customers))
        .route(
            "/users/{id}",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/users/{id}/ledger", get(users::ledger))
        .route("/stations", get(stations::list).post(stations::create))
        .route(
            "/stations/{id}",
            put(stations::update).delete(stations::delete),
        )
        .route("/messages", get(messages::list))
        .route("/messages/send-all", post(messages::send_all))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let api = Router::new()
        .route("/auth/login", post(auth::login))
        .merge(protected);

    Router::new().nest("/api", api).with_state(state)
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}
