//! Command structs for engine operations.
//!
//! These types group parameters for write operations and list filters,
//! keeping call sites readable and avoiding long argument lists.

use crate::{CheckStatus, Liters, Role};

/// Customer details typed by the operator when issuing a check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Issue a new check.
#[derive(Clone, Debug)]
pub struct CreateCheckCmd {
    pub amount: Liters,
    pub operator_id: i64,
    pub station_id: i64,
    pub customer: CustomerInfo,
}

impl CreateCheckCmd {
    #[must_use]
    pub fn new(amount: Liters, operator_id: i64, station_id: i64) -> Self {
        Self {
            amount,
            operator_id,
            station_id,
            customer: CustomerInfo::default(),
        }
    }

    #[must_use]
    pub fn customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn customer_phone(mut self, phone: impl Into<String>) -> Self {
        self.customer.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn customer_address(mut self, address: impl Into<String>) -> Self {
        self.customer.address = Some(address.into());
        self
    }
}

/// Filters for listing checks. `None` means "any".
#[derive(Clone, Debug, Default)]
pub struct CheckListFilter {
    pub station_id: Option<i64>,
    pub status: Option<CheckStatus>,
    pub operator_id: Option<i64>,
    pub is_printed: Option<bool>,
    pub customer_id: Option<i64>,
}

/// Filters for listing users.
#[derive(Clone, Debug, Default)]
pub struct UserListFilter {
    pub role: Option<Role>,
    pub station_id: Option<i64>,
    pub is_active: Option<bool>,
}

/// Create a user. Staff accounts need `username` and `password`.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub role: Role,
    pub username: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub telegram_id: Option<String>,
    pub telegram_username: Option<String>,
    pub station_id: Option<i64>,
}

impl NewUser {
    #[must_use]
    pub fn staff(role: Role, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            role,
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::customer()
        }
    }

    #[must_use]
    pub fn customer() -> Self {
        Self {
            role: Role::Customer,
            username: None,
            password: None,
            full_name: None,
            phone: None,
            telegram_id: None,
            telegram_username: None,
            station_id: None,
        }
    }

    #[must_use]
    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    #[must_use]
    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    #[must_use]
    pub fn telegram_id(mut self, telegram_id: impl Into<String>) -> Self {
        self.telegram_id = Some(telegram_id.into());
        self
    }

    #[must_use]
    pub fn station_id(mut self, station_id: i64) -> Self {
        self.station_id = Some(station_id);
        self
    }
}

/// Partial user update. Outer `None` leaves the field untouched; for
/// nullable fields `Some(None)` clears it.
#[derive(Clone, Debug, Default)]
pub struct UserUpdate {
    pub full_name: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub telegram_id: Option<Option<String>>,
    pub role: Option<Role>,
    pub station_id: Option<Option<i64>>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// Create a station.
#[derive(Clone, Debug, Default)]
pub struct NewStation {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Partial station update.
#[derive(Clone, Debug, Default)]
pub struct StationUpdate {
    pub name: Option<String>,
    pub address: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub is_active: Option<bool>,
}
