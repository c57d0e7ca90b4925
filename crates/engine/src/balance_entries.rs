//! Balance ledger.
//!
//! Every change to a customer balance appends exactly one immutable entry in
//! the same DB transaction that updates `users.balance_minor`, so the stored
//! balance is always the sum of the customer's entries.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{EngineError, Liters};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Credit applied when a check is confirmed.
    ConfirmCredit,
    /// Additive correction applied through reactivation.
    ReactivateCredit,
    /// Debit undoing a confirm credit when a used check is deleted.
    DeleteReversal,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfirmCredit => "confirm_credit",
            Self::ReactivateCredit => "reactivate_credit",
            Self::DeleteReversal => "delete_reversal",
        }
    }
}

impl TryFrom<&str> for EntryKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "confirm_credit" => Ok(Self::ConfirmCredit),
            "reactivate_credit" => Ok(Self::ReactivateCredit),
            "delete_reversal" => Ok(Self::DeleteReversal),
            other => Err(EngineError::Validation(format!(
                "invalid ledger entry kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub id: i64,
    pub customer_id: i64,
    /// The check that caused the entry. Kept after the check is deleted.
    pub check_id: Option<i64>,
    pub kind: EntryKind,
    /// Signed: credits are positive, reversals negative.
    pub amount: Liters,
    pub balance_after: Liters,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "balance_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub customer_id: i64,
    pub check_id: Option<i64>,
    pub kind: String,
    pub amount_minor: i64,
    pub balance_after_minor: i64,
    pub created_by: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for BalanceEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            customer_id: model.customer_id,
            check_id: model.check_id,
            kind: EntryKind::try_from(model.kind.as_str())?,
            amount: Liters::new(model.amount_minor),
            balance_after: Liters::new(model.balance_after_minor),
            created_by: model.created_by,
            created_at: model.created_at,
        })
    }
}
