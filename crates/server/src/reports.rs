//! Customer rankings and spreadsheet exports.
//!
//! Exports are CSV files; spreadsheet programs open them directly.

use api_types::{
    Paginated,
    check::ExportQuery,
    user::{CustomerRankView, RankQuery, ReportQuery},
};
use axum::{
    Extension,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use engine::{Check, CustomerRank, PageRequest, RankOrder};
use serde::Serialize;

use crate::{
    CurrentUser, ServerError,
    extract::{Json, Query},
    server::ServerState,
    views,
};

fn rank_order(order: Option<&str>) -> Result<RankOrder, ServerError> {
    Ok(order
        .map(RankOrder::try_from)
        .transpose()?
        .unwrap_or_default())
}

pub async fn top_customers(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<RankQuery>,
) -> Result<Json<Vec<CustomerRankView>>, ServerError> {
    let order = rank_order(query.order.as_deref())?;
    let ranks = state
        .engine
        .top_customers(order, query.limit, current.user.id)
        .await?;
    Ok(Json(ranks.into_iter().map(views::customer_rank).collect()))
}

pub async fn customers_report(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Paginated<CustomerRankView>>, ServerError> {
    let order = rank_order(query.order.as_deref())?;
    let request = PageRequest::new(query.page, query.limit)?;
    let page = state
        .engine
        .customers_report(order, request, current.user.id)
        .await?;
    Ok(Json(views::page(page, views::customer_rank)))
}

#[derive(Serialize)]
struct CheckRow {
    id: i64,
    code: String,
    amount_liters: String,
    status: &'static str,
    is_printed: bool,
    operator_id: i64,
    station_id: i64,
    customer_id: Option<i64>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    customer_address: Option<String>,
    created_at: String,
    used_at: Option<String>,
}

impl CheckRow {
    fn new(check: Check, tz: chrono_tz::Tz) -> Self {
        let local = |at: chrono::DateTime<chrono::Utc>| {
            at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
        };
        Self {
            id: check.id,
            code: check.code,
            amount_liters: check.amount.to_string(),
            status: check.status.as_str(),
            is_printed: check.is_printed,
            operator_id: check.operator_id,
            station_id: check.station_id,
            customer_id: check.customer_id,
            customer_name: check.customer_name,
            customer_phone: check.customer_phone,
            customer_address: check.customer_address,
            created_at: local(check.created_at),
            used_at: check.used_at.map(local),
        }
    }
}

#[derive(Serialize)]
struct CustomerRow {
    rank: usize,
    id: i64,
    full_name: Option<String>,
    phone: Option<String>,
    telegram_id: Option<String>,
    balance_liters: String,
    used_checks: u64,
    station_id: Option<i64>,
    is_active: bool,
}

impl CustomerRow {
    fn new(rank: usize, row: CustomerRank) -> Self {
        let customer = row.customer;
        Self {
            rank,
            id: customer.id,
            full_name: customer.full_name,
            phone: customer.phone,
            telegram_id: customer.telegram_id,
            balance_liters: customer.balance.to_string(),
            used_checks: row.used_checks,
            station_id: customer.station_id,
            is_active: customer.is_active,
        }
    }
}

fn to_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<Vec<u8>, ServerError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|err| ServerError::Internal(format!("csv encoding failed: {err}")))?;
    }
    writer
        .into_inner()
        .map_err(|err| ServerError::Internal(format!("csv flush failed: {err}")))
}

fn csv_response(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

pub async fn export_checks(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ServerError> {
    let checks = state
        .engine
        .export_checks(query.start_date, query.end_date, current.user.id)
        .await?;
    let tz = state.engine.timezone();
    let body = to_csv(checks.into_iter().map(|c| CheckRow::new(c, tz)))?;
    tracing::info!(
        start = %query.start_date,
        end = %query.end_date,
        bytes = body.len(),
        "checks exported"
    );

    let filename = format!("checks_{}_{}.csv", query.start_date, query.end_date);
    Ok(csv_response(&filename, body))
}

pub async fn export_customers(
    Extension(current): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Response, ServerError> {
    let ranks = state.engine.export_customers(current.user.id).await?;
    let body = to_csv(
        ranks
            .into_iter()
            .enumerate()
            .map(|(i, row)| CustomerRow::new(i + 1, row)),
    )?;
    Ok(csv_response("customers.csv", body))
}
