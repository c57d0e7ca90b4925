//! Users: staff accounts (moderators, operators) and customers.
//!
//! Customers never log in; their channel identity is the Telegram id and
//! their `balance` is the running liter credit. Staff authenticate with a
//! username and an argon2 password hash.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Liters};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Moderator,
    Operator,
    Customer,
}

/// What an authenticated user is allowed to do.
///
/// Every engine operation checks exactly one capability instead of comparing
/// role names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    IssueCheck,
    ConfirmCheck,
    DeleteCheck,
    ViewChecks,
    ViewReports,
    ManageUsers,
    ManageStations,
    BroadcastMessage,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Moderator => "moderator",
            Self::Operator => "operator",
            Self::Customer => "customer",
        }
    }

    pub fn is_staff(self) -> bool {
        matches!(self, Self::Moderator | Self::Operator)
    }

    pub fn can(self, capability: Capability) -> bool {
        match self {
            Self::Moderator => true,
            Self::Operator => matches!(
                capability,
                Capability::IssueCheck | Capability::ConfirmCheck | Capability::ViewChecks
            ),
            Self::Customer => false,
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "moderator" => Ok(Self::Moderator),
            "operator" => Ok(Self::Operator),
            "customer" => Ok(Self::Customer),
            other => Err(EngineError::Validation(format!("invalid role: {other}"))),
        }
    }
}

/// A user as exposed by the engine (the password hash never leaves it).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub role: Role,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub telegram_id: Option<String>,
    pub telegram_username: Option<String>,
    pub balance: Liters,
    /// Operators: assigned station. Customers: last station they used.
    pub station_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub role: String,
    #[sea_orm(unique)]
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub telegram_id: Option<String>,
    pub telegram_username: Option<String>,
    pub balance_minor: i64,
    pub station_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub(crate) fn role(&self) -> Result<Role, EngineError> {
        Role::try_from(self.role.as_str())
    }
}

impl TryFrom<Model> for User {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            role: Role::try_from(model.role.as_str())?,
            username: model.username,
            full_name: model.full_name,
            phone: model.phone,
            telegram_id: model.telegram_id,
            telegram_username: model.telegram_username,
            balance: Liters::new(model.balance_minor),
            station_id: model.station_id,
            is_active: model.is_active,
            created_at: model.created_at,
        })
    }
}
