//! Checks (fuel vouchers).
//!
//! A `Check` entitles a customer to a fixed amount of liters. Its `status`
//! follows a small state machine (see [`CheckStatus::can_transition_to`]);
//! `is_printed` is an independent flag used by the operator print worklist.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Liters, ResultEngine};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pending,
    /// Legacy marker state. Printing is tracked by `is_printed`; rows in this
    /// state are still confirmable.
    Printed,
    Used,
    Cancelled,
    Expired,
}

impl CheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Printed => "printed",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Used | Self::Cancelled | Self::Expired)
    }

    /// Valid transitions of the check lifecycle.
    pub fn can_transition_to(self, next: CheckStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Used | Self::Cancelled | Self::Expired) => true,
            (Self::Printed, Self::Used) => true,
            _ => false,
        }
    }

    /// States a check may be confirmed from.
    pub(crate) fn confirmable() -> [CheckStatus; 2] {
        [Self::Pending, Self::Printed]
    }
}

impl TryFrom<&str> for CheckStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "printed" => Ok(Self::Printed),
            "used" => Ok(Self::Used),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(EngineError::Validation(format!(
                "invalid check status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub id: i64,
    pub code: String,
    pub qr_code: String,
    pub amount: Liters,
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

/// Characters used in check codes (no 0/O, 1/I lookalikes).
const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub(crate) const CODE_LEN: usize = 8;

/// Byte of a v4 uuid whose high nibble is the fixed version.
const UUID_VERSION_BYTE: usize = 6;

/// Generates a random human-readable check code.
pub(crate) fn generate_code() -> String {
    code_from_bytes(Uuid::new_v4().as_bytes())
}

fn code_from_bytes(bytes: &[u8; 16]) -> String {
    bytes
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != UUID_VERSION_BYTE)
        .take(CODE_LEN)
        .map(|(_, b)| CODE_ALPHABET[(*b & 0x1f) as usize] as char)
        .collect()
}

/// Content of a check QR code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub code: String,
    pub station_id: i64,
}

impl QrPayload {
    pub fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::Validation("invalid qr payload".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::Validation("invalid qr payload".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::Validation("invalid qr payload".to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "checks")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub code: String,
    pub qr_code: String,
    pub amount_minor: i64,
    pub status: String,
    pub is_printed: bool,
    pub operator_id: i64,
    pub station_id: i64,
    pub customer_id: Option<i64>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_address: Option<String>,
    pub created_at: DateTimeUtc,
    pub used_at: Option<DateTimeUtc>,
    pub expires_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub(crate) fn status(&self) -> ResultEngine<CheckStatus> {
        CheckStatus::try_from(self.status.as_str())
    }
}

impl TryFrom<Model> for Check {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            status: CheckStatus::try_from(model.status.as_str())?,
            code: model.code,
            qr_code: model.qr_code,
            amount: Liters::new(model.amount_minor),
            is_printed: model.is_printed,
            operator_id: model.operator_id,
            station_id: model.station_id,
            customer_id: model.customer_id,
            customer_name: model.customer_name,
            customer_phone: model.customer_phone,
            customer_address: model.customer_address,
            created_at: model.created_at,
            used_at: model.used_at,
            expires_at: model.expires_at,
        })
    }
}
