//! Aggregated figures returned by the reporting operations.

use serde::{Deserialize, Serialize};

use crate::{EngineError, Liters, User};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_customers: u64,
    pub total_operators: u64,
    pub total_stations: u64,
    pub total_checks: u64,
    pub used_checks: u64,
    pub pending_checks: u64,
    pub used_liters: Liters,
    pub pending_liters: Liters,
    /// Every issued check, whatever its status.
    pub total_liters: Liters,
}

/// Count and liters of checks issued in one period.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub checks: u64,
    pub liters: Liters,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorStats {
    pub today: PeriodStats,
    pub month: PeriodStats,
    pub total: PeriodStats,
}

/// Ranking direction for customer balances. Ties always break by id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankOrder {
    #[default]
    Desc,
    Asc,
}

impl TryFrom<&str> for RankOrder {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "desc" | "top" => Ok(Self::Desc),
            "asc" | "bottom" => Ok(Self::Asc),
            other => Err(EngineError::Validation(format!("invalid order: {other}"))),
        }
    }
}

/// A customer in a balance ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRank {
    pub customer: User,
    pub used_checks: u64,
}
