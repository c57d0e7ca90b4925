use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use http_body_util::BodyExt;
use migration::MigratorTrait;
use sea_orm::{ConnectOptions, Database};
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::{Engine, Recipient};
use server::{Notifier, ServerState, router};

struct Echo;

#[async_trait]
impl Notifier for Echo {
    async fn deliver(&self, recipients: &[Recipient], _text: &str) -> Vec<i64> {
        recipients.iter().map(|r| r.user_id).collect()
    }
}

async fn state() -> ServerState {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    let engine = Engine::builder().database(db).build().await.unwrap();
    engine
        .bootstrap_moderator("admin", "secret-admin", Some("Admin"), Utc::now())
        .await
        .unwrap();
    ServerState::new(engine)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["accessToken"].as_str().unwrap().to_string()
}

/// Moderator token, a station and a logged-in operator assigned to it.
async fn staffed(app: &Router) -> (String, i64, String) {
    let admin = login(app, "admin", "secret-admin").await;
    let (status, station) = send(
        app,
        "POST",
        "/api/stations",
        Some(&admin),
        Some(json!({ "name": "Chilonzor", "phone": "+998 71 200-00-00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{station}");
    let station_id = station["id"].as_i64().unwrap();
    assert_eq!(station["phone"], "+998712000000");

    let (status, operator) = send(
        app,
        "POST",
        "/api/users",
        Some(&admin),
        Some(json!({
            "role": "operator",
            "username": "op1",
            "password": "secret-op",
            "fullName": "Operator One",
            "stationId": station_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{operator}");
    assert_eq!(operator["role"], "operator");
    assert!(operator.get("passwordHash").is_none());

    let op = login(app, "op1", "secret-op").await;
    (admin, station_id, op)
}

#[tokio::test]
async fn requests_without_valid_token_are_rejected() {
    let app = router(state().await);

    let (status, body) = send(&app, "GET", "/api/checks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");

    let (status, _) = send(&app, "GET", "/api/auth/me", Some("nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "admin", "password": "wrong-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "unauthenticated");
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = router(state().await);
    let token = login(&app, "admin", "secret-admin").await;

    let (status, me) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "admin");
    assert_eq!(me["role"], "moderator");

    let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn check_lifecycle_over_http() {
    let app = router(state().await);
    let (admin, station_id, op) = staffed(&app).await;

    let (status, check) = send(
        &app,
        "POST",
        "/api/checks",
        Some(&op),
        Some(json!({
            "amountLiters": 50,
            "customerName": "Aziz",
            "customerPhone": "+998 90 123 45 67",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{check}");
    assert_eq!(check["status"], "pending");
    assert_eq!(check["amountLiters"], "50.00");
    assert_eq!(check["isPrinted"], false);
    assert_eq!(check["stationId"], station_id);
    let id = check["id"].as_i64().unwrap();

    let (status, unprinted) = send(&app, "GET", "/api/checks?isPrinted=false", Some(&op), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unprinted["pagination"]["total"], 1);

    let (status, used) = send(&app, "PUT", &format!("/api/checks/{id}/confirm"), Some(&op), None).await;
    assert_eq!(status, StatusCode::OK, "{used}");
    assert_eq!(used["status"], "used");
    assert_eq!(used["isPrinted"], true);
    assert!(used["usedAt"].is_string());
    let customer_id = used["customerId"].as_i64().unwrap();

    let (status, body) = send(&app, "PUT", &format!("/api/checks/{id}/confirm"), Some(&op), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, body) = send(&app, "PUT", &format!("/api/checks/{id}/cancel"), Some(&op), None).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, customer) = send(&app, "GET", &format!("/api/users/{customer_id}"), Some(&op), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customer["balanceLiters"], "50.00");
    assert_eq!(customer["phone"], "+998901234567");

    let (status, reactivated) = send(
        &app,
        "PUT",
        &format!("/api/checks/{id}/reactivate"),
        Some(&op),
        Some(json!({ "amountLiters": "20.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{reactivated}");
    assert_eq!(reactivated["amountLiters"], "50.00");
    assert_eq!(reactivated["status"], "used");

    let (status, body) = send(&app, "DELETE", &format!("/api/checks/{id}"), Some(&op), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "authorization_error");

    let (status, _) = send(&app, "DELETE", &format!("/api/checks/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &format!("/api/checks/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, ledger) = send(
        &app,
        "GET",
        &format!("/api/users/{customer_id}/ledger"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = ledger
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["confirm_credit", "reactivate_credit", "delete_reversal"]);
    assert_eq!(ledger[2]["balanceAfterLiters"], "20.00");
}

#[tokio::test]
async fn invalid_input_maps_to_422() {
    let app = router(state().await);
    let (_admin, _station, op) = staffed(&app).await;

    let (status, body) = send(&app, "GET", "/api/checks?page=0", Some(&op), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");

    let (status, body) = send(
        &app,
        "POST",
        "/api/checks",
        Some(&op),
        Some(json!({ "amountLiters": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");

    let (status, body) = send(
        &app,
        "POST",
        "/api/checks",
        Some(&op),
        Some(json!({ "amountLiters": "1.234" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");
}

#[tokio::test]
async fn malformed_requests_get_error_body() {
    let app = router(state().await);
    let (_admin, station, op) = staffed(&app).await;

    let (status, body) = send(&app, "GET", "/api/checks?status=bogus", Some(&op), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");

    let (status, body) = send(&app, "GET", "/api/checks?page=-1", Some(&op), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");

    let (status, body) = send(
        &app,
        "POST",
        "/api/checks",
        Some(&op),
        Some(json!({ "stationId": station })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");
    assert!(body["message"].as_str().unwrap().contains("amountLiters"));

    let (status, body) = send(&app, "PUT", "/api/checks/abc/confirm", Some(&op), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "validation_error");
}

#[tokio::test]
async fn reports_require_view_reports() {
    let app = router(state().await);
    let (admin, _station, op) = staffed(&app).await;

    for amount in [10, 30] {
        let (_, check) = send(
            &app,
            "POST",
            "/api/checks",
            Some(&op),
            Some(json!({ "amountLiters": amount, "customerPhone": format!("+99890000{amount:04}") })),
        )
        .await;
        let id = check["id"].as_i64().unwrap();
        let (status, _) = send(&app, "PUT", &format!("/api/checks/{id}/confirm"), Some(&op), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = send(&app, "GET", "/api/stats", Some(&op), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, stats) = send(&app, "GET", "/api/stats", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["usedChecks"], 2);
    assert_eq!(stats["usedLiters"], "40.00");
    assert_eq!(stats["totalCustomers"], 2);

    let (status, top) = send(&app, "GET", "/api/users/top?limit=1", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(top.as_array().unwrap().len(), 1);
    assert_eq!(top[0]["balanceLiters"], "30.00");
    assert_eq!(top[0]["usedChecks"], 1);

    let (status, bottom) = send(&app, "GET", "/api/users/top?order=bottom", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bottom[0]["balanceLiters"], "10.00");

    let (status, report) = send(&app, "GET", "/api/users/report?page=2&limit=1", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["pagination"]["totalPages"], 2);
    assert_eq!(report["data"][0]["balanceLiters"], "10.00");

    let me = send(&app, "GET", "/api/auth/me", Some(&op), None).await.1;
    let op_id = me["id"].as_i64().unwrap();
    let (status, own) = send(&app, "GET", &format!("/api/stats/operator/{op_id}"), Some(&op), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["total"]["checks"], 2);
    assert_eq!(own["total"]["liters"], "40.00");
}

#[tokio::test]
async fn exports_are_csv() {
    let state = state().await;
    let app = router(state.clone());
    let (admin, _station, op) = staffed(&app).await;
    send(
        &app,
        "POST",
        "/api/checks",
        Some(&op),
        Some(json!({ "amountLiters": 5, "customerName": "Ali, Vali" })),
    )
    .await;

    let today = Utc::now().with_timezone(&state.engine.timezone()).date_naive();
    let request = Request::builder()
        .uri(format!(
            "/api/checks/export/excel?startDate={today}&endDate={today}"
        ))
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("id,code,amount_liters,status"));
    let row = lines.next().unwrap();
    assert!(row.contains("5.00,pending"));
    assert!(row.contains("\"Ali, Vali\""));
    assert!(lines.next().is_none());

    let request = Request::builder()
        .uri("/api/users/export/excel")
        .header(header::AUTHORIZATION, format!("Bearer {op}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn broadcast_is_recorded_and_delivered() {
    let state = state().await.with_notifier(Arc::new(Echo));
    let app = router(state);
    let (admin, _station, op) = staffed(&app).await;

    for (phone, telegram) in [("+998911111111", Some("1001")), ("+998922222222", None)] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/users",
            Some(&admin),
            Some(json!({ "role": "customer", "phone": phone, "telegramId": telegram })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    let message = json!({ "title": "Narx", "content": "AI-92 narxi o'zgardi" });
    let (status, _) = send(&app, "POST", "/api/messages/send-all", Some(&op), Some(message.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, sent) = send(&app, "POST", "/api/messages/send-all", Some(&admin), Some(message)).await;
    assert_eq!(status, StatusCode::CREATED, "{sent}");
    assert_eq!(sent["recipientsCount"], 1);
    assert_eq!(sent["deliveredCount"], 1);

    let (status, list) = send(&app, "GET", "/api/messages", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["pagination"]["total"], 1);
    assert_eq!(list["data"][0]["title"], "Narx");
    assert_eq!(list["data"][0]["recipientsCount"], 1);
}

#[tokio::test]
async fn stations_and_station_customers() {
    let app = router(state().await);
    let (admin, station_id, op) = staffed(&app).await;

    let (status, stations) = send(&app, "GET", "/api/stations", Some(&op), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stations[0]["operatorsCount"], 1);
    assert_eq!(stations[0]["checksCount"], 0);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/stations/{station_id}"),
        Some(&op),
        Some(json!({ "name": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "PUT", &format!("/api/stations/{station_id}"), Some(&admin), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "DELETE", &format!("/api/stations/{station_id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (_, check) = send(
        &app,
        "POST",
        "/api/checks",
        Some(&op),
        Some(json!({ "amountLiters": 12.5, "customerPhone": "+998933333333" })),
    )
    .await;
    let id = check["id"].as_i64().unwrap();
    send(&app, "PUT", &format!("/api/checks/{id}/confirm"), Some(&op), None).await;

    let (status, customers) = send(
        &app,
        "GET",
        &format!("/api/users/station/{station_id}/customers"),
        Some(&op),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customers["pagination"]["total"], 1);
    assert_eq!(customers["data"][0]["balanceLiters"], "12.50");
}
