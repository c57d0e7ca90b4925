use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, Statement, TransactionTrait,
    prelude::*, sea_query::Expr,
};

use crate::{
    BalanceEntry, Capability, EngineError, EntryKind, Liters, ResultEngine, balance_entries, users,
};

use super::{Engine, with_tx};

/// A customer whose stored balance did not match the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BalanceDrift {
    pub customer_id: i64,
    pub stored: Liters,
    pub ledger: Liters,
}

impl Engine {
    /// Adds `amount` (signed) to the customer balance and appends the ledger
    /// entry describing it. Must run inside the caller's transaction.
    ///
    /// The balance is bumped with `balance_minor = balance_minor + ?` so
    /// concurrent credits never overwrite each other.
    pub(super) async fn apply_balance_change(
        &self,
        db: &DatabaseTransaction,
        customer_id: i64,
        check_id: Option<i64>,
        kind: EntryKind,
        amount: Liters,
        created_by: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<Liters> {
        let res = users::Entity::update_many()
            .col_expr(
                users::Column::BalanceMinor,
                Expr::col(users::Column::BalanceMinor).add(amount.hundredths()),
            )
            .filter(users::Column::Id.eq(customer_id))
            .exec(db)
            .await?;
        if res.rows_affected == 0 {
            return Err(EngineError::NotFound("customer not exists".to_string()));
        }
        let balance_after = Liters::new(self.require_user(db, customer_id).await?.balance_minor);

        balance_entries::ActiveModel {
            id: ActiveValue::NotSet,
            customer_id: ActiveValue::Set(customer_id),
            check_id: ActiveValue::Set(check_id),
            kind: ActiveValue::Set(kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(amount.hundredths()),
            balance_after_minor: ActiveValue::Set(balance_after.hundredths()),
            created_by: ActiveValue::Set(created_by),
            created_at: ActiveValue::Set(now),
        }
        .insert(db)
        .await?;

        tracing::info!(
            customer_id,
            check_id,
            kind = kind.as_str(),
            amount = %amount,
            balance = %balance_after,
            "balance changed"
        );
        Ok(balance_after)
    }

    /// Ledger entries of one customer, oldest first.
    pub async fn customer_ledger(
        &self,
        customer_id: i64,
        actor_id: i64,
    ) -> ResultEngine<Vec<BalanceEntry>> {
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::ViewReports)
                .await?;
            self.require_user(&db_tx, customer_id).await?;
            let models = balance_entries::Entity::find()
                .filter(balance_entries::Column::CustomerId.eq(customer_id))
                .order_by_asc(balance_entries::Column::CreatedAt)
                .order_by_asc(balance_entries::Column::Id)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(BalanceEntry::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Rebuilds every stored balance from the ledger.
    ///
    /// Administrative: meant for the admin CLI, not exposed over HTTP.
    /// Returns the users whose stored balance had drifted (now fixed).
    pub async fn recompute_balances(&self) -> ResultEngine<Vec<BalanceDrift>> {
        with_tx!(self, |db_tx| {
            let backend = self.database.get_database_backend();
            let rows = db_tx
                .query_all(Statement::from_sql_and_values(
                    backend,
                    "SELECT customer_id, COALESCE(SUM(amount_minor), 0) AS total \
                     FROM balance_entries GROUP BY customer_id;",
                    vec![],
                ))
                .await?;
            let mut ledger: HashMap<i64, i64> = HashMap::with_capacity(rows.len());
            for row in rows {
                let customer_id: i64 = row.try_get("", "customer_id")?;
                let total: i64 = row.try_get("", "total")?;
                ledger.insert(customer_id, total);
            }

            let mut drifts = Vec::new();
            let models = users::Entity::find()
                .order_by_asc(users::Column::Id)
                .all(&db_tx)
                .await?;
            for model in models {
                let expected = ledger.get(&model.id).copied().unwrap_or(0);
                if expected == model.balance_minor {
                    continue;
                }
                drifts.push(BalanceDrift {
                    customer_id: model.id,
                    stored: Liters::new(model.balance_minor),
                    ledger: Liters::new(expected),
                });
                users::ActiveModel {
                    id: ActiveValue::Set(model.id),
                    balance_minor: ActiveValue::Set(expected),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
            }

            if !drifts.is_empty() {
                tracing::warn!(count = drifts.len(), "balances rebuilt from ledger");
            }
            Ok(drifts)
        })
    }
}
