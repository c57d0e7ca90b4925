//! Wire types shared by the HTTP server and its clients.
//!
//! JSON uses camelCase. Liter amounts are sent back as decimal strings
//! (`"50.00"`); requests accept either a JSON number or a string.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Liter amount as received from a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Number(f64),
    Text(String),
}

impl fmt::Display for AmountInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial updates.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

/// Envelope of every paginated list.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

/// Error body returned for every failed request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

pub mod auth {
    use super::*;
    use crate::user::UserView;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LoginRequest {
        pub username: String,
        pub password: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LoginResponse {
        pub user: UserView,
        pub access_token: String,
        pub expires_at: DateTime<Utc>,
    }
}

pub mod check {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum CheckStatus {
        Pending,
        Printed,
        Used,
        Cancelled,
        Expired,
    }

    /// Request body for issuing a check.
    ///
    /// Operators may omit `operatorId` and `stationId`: the server fills in
    /// the caller and its assigned station.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CheckNew {
        pub amount_liters: AmountInput,
        pub operator_id: Option<i64>,
        pub station_id: Option<i64>,
        pub customer_name: Option<String>,
        pub customer_phone: Option<String>,
        pub customer_address: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CheckReactivate {
        pub amount_liters: AmountInput,
        pub operator_id: Option<i64>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CheckListQuery {
        pub station_id: Option<i64>,
        pub status: Option<CheckStatus>,
        pub operator_id: Option<i64>,
        pub is_printed: Option<bool>,
        pub customer_id: Option<i64>,
        pub page: Option<u64>,
        pub limit: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ExportQuery {
        pub start_date: NaiveDate,
        pub end_date: NaiveDate,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CheckView {
        pub id: i64,
        pub code: String,
        pub qr_code: String,
        pub amount_liters: String,
        pub status: CheckStatus,
        pub is_printed: bool,
        pub operator_id: i64,
        pub station_id: i64,
        pub customer_id: Option<i64>,
        pub customer_name: Option<String>,
        pub customer_phone: Option<String>,
        pub customer_address: Option<String>,
        pub created_at: DateTime<Utc>,
        pub used_at: Option<DateTime<Utc>>,
        pub expires_at: DateTime<Utc>,
    }
}

pub mod user {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum Role {
        Moderator,
        Operator,
        Customer,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UserView {
        pub id: i64,
        pub role: Role,
        pub username: Option<String>,
        pub full_name: Option<String>,
        pub phone: Option<String>,
        pub telegram_id: Option<String>,
        pub telegram_username: Option<String>,
        pub balance_liters: String,
        pub station_id: Option<i64>,
        pub is_active: bool,
        pub created_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UserNew {
        pub role: Role,
        pub username: Option<String>,
        pub password: Option<String>,
        pub full_name: Option<String>,
        pub phone: Option<String>,
        pub telegram_id: Option<String>,
        pub station_id: Option<i64>,
    }

    /// Partial update. Omitted fields stay as they are; `null` clears a
    /// nullable field.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UserUpdate {
        #[serde(default, deserialize_with = "double_option")]
        pub full_name: Option<Option<String>>,
        #[serde(default, deserialize_with = "double_option")]
        pub phone: Option<Option<String>>,
        #[serde(default, deserialize_with = "double_option")]
        pub telegram_id: Option<Option<String>>,
        pub role: Option<Role>,
        #[serde(default, deserialize_with = "double_option")]
        pub station_id: Option<Option<i64>>,
        pub is_active: Option<bool>,
        pub password: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UserListQuery {
        pub role: Option<Role>,
        pub station_id: Option<i64>,
        pub is_active: Option<bool>,
        pub page: Option<u64>,
        pub limit: Option<u64>,
    }

    /// `order` is `desc`/`top` (default) or `asc`/`bottom`.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RankQuery {
        pub order: Option<String>,
        pub limit: Option<u64>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReportQuery {
        pub order: Option<String>,
        pub page: Option<u64>,
        pub limit: Option<u64>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CustomerRankView {
        #[serde(flatten)]
        pub customer: UserView,
        pub used_checks: u64,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LedgerEntryView {
        pub id: i64,
        pub customer_id: i64,
        pub check_id: Option<i64>,
        pub kind: String,
        pub amount_liters: String,
        pub balance_after_liters: String,
        pub created_by: i64,
        pub created_at: DateTime<Utc>,
    }
}

pub mod station {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StationNew {
        pub name: String,
        pub address: Option<String>,
        pub phone: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StationUpdate {
        pub name: Option<String>,
        #[serde(default, deserialize_with = "double_option")]
        pub address: Option<Option<String>>,
        #[serde(default, deserialize_with = "double_option")]
        pub phone: Option<Option<String>>,
        pub is_active: Option<bool>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct StationView {
        pub id: i64,
        pub name: String,
        pub address: Option<String>,
        pub phone: Option<String>,
        pub is_active: bool,
        pub created_at: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub operators_count: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub checks_count: Option<u64>,
    }
}

pub mod stats {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GlobalStatsView {
        pub total_customers: u64,
        pub total_operators: u64,
        pub total_stations: u64,
        pub total_checks: u64,
        pub used_checks: u64,
        pub pending_checks: u64,
        pub used_liters: String,
        pub pending_liters: String,
        pub total_liters: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PeriodStatsView {
        pub checks: u64,
        pub liters: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct OperatorStatsView {
        pub today: PeriodStatsView,
        pub month: PeriodStatsView,
        pub total: PeriodStatsView,
    }
}

pub mod message {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageNew {
        pub title: String,
        pub content: String,
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageView {
        pub id: i64,
        pub title: String,
        pub content: String,
        pub sender_id: i64,
        pub is_global: bool,
        pub created_at: DateTime<Utc>,
        pub recipients_count: u64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct BroadcastResponse {
        pub message: MessageView,
        pub recipients_count: u64,
        pub delivered_count: u64,
    }
}
