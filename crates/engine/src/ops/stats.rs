use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use sea_orm::{
    DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Statement,
    TransactionTrait, Value, prelude::*, sea_query::Expr,
};

use crate::{
    Capability, Check, CheckStatus, CustomerRank, EngineError, GlobalStats, Liters,
    OperatorStats, Page, PageRequest, PeriodStats, RankOrder, ResultEngine, Role, User, checks,
    stations, users,
};

use super::{Engine, with_tx};

pub const DEFAULT_TOP_LIMIT: u64 = 10;
pub const MAX_TOP_LIMIT: u64 = 100;

/// UTC instant of local midnight starting `date` in `tz`.
fn local_day_start(tz: Tz, date: NaiveDate) -> ResultEngine<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| {
        EngineError::Validation(format!("invalid date: {date}"))
    })?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| EngineError::Validation(format!("invalid local date: {date}")))
}

fn customers_ranked(order: RankOrder) -> Select<users::Entity> {
    let query = users::Entity::find().filter(users::Column::Role.eq(Role::Customer.as_str()));
    let query = match order {
        RankOrder::Desc => query.order_by_desc(users::Column::BalanceMinor),
        RankOrder::Asc => query.order_by_asc(users::Column::BalanceMinor),
    };
    query.order_by_asc(users::Column::Id)
}

impl Engine {
    /// Global counters, computed fresh on every call.
    pub async fn global_stats(&self, actor_id: i64) -> ResultEngine<GlobalStats> {
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::ViewReports)
                .await?;
            let backend = self.database.get_database_backend();

            let total_customers = users::Entity::find()
                .filter(users::Column::Role.eq(Role::Customer.as_str()))
                .count(&db_tx)
                .await?;
            let total_operators = users::Entity::find()
                .filter(users::Column::Role.eq(Role::Operator.as_str()))
                .count(&db_tx)
                .await?;
            let total_stations = stations::Entity::find().count(&db_tx).await?;

            let stmt = Statement::from_sql_and_values(
                backend,
                "SELECT COUNT(*) AS total, \
                 COALESCE(SUM(CASE WHEN status = ? THEN 1 ELSE 0 END), 0) AS used_count, \
                 COALESCE(SUM(CASE WHEN status IN (?, ?) THEN 1 ELSE 0 END), 0) AS pending_count, \
                 COALESCE(SUM(CASE WHEN status = ? THEN amount_minor ELSE 0 END), 0) AS used_sum, \
                 COALESCE(SUM(CASE WHEN status IN (?, ?) THEN amount_minor ELSE 0 END), 0) AS pending_sum, \
                 COALESCE(SUM(amount_minor), 0) AS total_sum \
                 FROM checks;",
                vec![
                    CheckStatus::Used.as_str().into(),
                    CheckStatus::Pending.as_str().into(),
                    CheckStatus::Printed.as_str().into(),
                    CheckStatus::Used.as_str().into(),
                    CheckStatus::Pending.as_str().into(),
                    CheckStatus::Printed.as_str().into(),
                ],
            );
            let row = db_tx
                .query_one(stmt)
                .await?
                .ok_or_else(|| EngineError::NotFound("check totals".to_string()))?;
            let total_checks: i64 = row.try_get("", "total")?;
            let used_checks: i64 = row.try_get("", "used_count")?;
            let pending_checks: i64 = row.try_get("", "pending_count")?;
            let used_liters = Liters::new(row.try_get("", "used_sum")?);
            let pending_liters = Liters::new(row.try_get("", "pending_sum")?);
            let total_liters = Liters::new(row.try_get("", "total_sum")?);

            Ok(GlobalStats {
                total_customers,
                total_operators,
                total_stations,
                total_checks: total_checks as u64,
                used_checks: used_checks as u64,
                pending_checks: pending_checks as u64,
                used_liters,
                pending_liters,
                total_liters,
            })
        })
    }

    /// Checks issued by one operator today, this month and overall.
    ///
    /// Day and month start at local midnight in the engine timezone.
    /// Operators may only read their own figures.
    pub async fn operator_stats(
        &self,
        operator_id: i64,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<OperatorStats> {
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::ViewChecks)
                .await?;
            if actor.id != operator_id && !actor.role()?.can(Capability::ViewReports) {
                return Err(EngineError::Forbidden(
                    "operators only see their own stats".to_string(),
                ));
            }
            self.require_user(&db_tx, operator_id)
                .await?
                .role()
                .ok()
                .filter(|role| *role == Role::Operator)
                .ok_or_else(|| EngineError::NotFound("operator not exists".to_string()))?;

            let today = now.with_timezone(&self.timezone).date_naive();
            let day_start = local_day_start(self.timezone, today)?;
            let month_first = today.with_day(1).unwrap_or(today);
            let month_start = local_day_start(self.timezone, month_first)?;

            Ok(OperatorStats {
                today: self
                    .issued_between(&db_tx, operator_id, Some(day_start))
                    .await?,
                month: self
                    .issued_between(&db_tx, operator_id, Some(month_start))
                    .await?,
                total: self.issued_between(&db_tx, operator_id, None).await?,
            })
        })
    }

    async fn issued_between(
        &self,
        db: &DatabaseTransaction,
        operator_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> ResultEngine<PeriodStats> {
        let backend = self.database.get_database_backend();
        let (sql, values): (&str, Vec<Value>) = match since {
            Some(since) => (
                "SELECT COUNT(*) AS n, COALESCE(SUM(amount_minor), 0) AS liters \
                 FROM checks WHERE operator_id = ? AND created_at >= ?;",
                vec![operator_id.into(), since.into()],
            ),
            None => (
                "SELECT COUNT(*) AS n, COALESCE(SUM(amount_minor), 0) AS liters \
                 FROM checks WHERE operator_id = ?;",
                vec![operator_id.into()],
            ),
        };
        let row = db
            .query_one(Statement::from_sql_and_values(backend, sql, values))
            .await?;
        let (checks, liters) = match row {
            Some(row) => (
                row.try_get::<i64>("", "n")?,
                row.try_get::<i64>("", "liters")?,
            ),
            None => (0, 0),
        };
        Ok(PeriodStats {
            checks: checks as u64,
            liters: Liters::new(liters),
        })
    }

    /// Used-check counts keyed by customer id.
    async fn used_check_counts(
        &self,
        db: &DatabaseTransaction,
        customer_ids: &[i64],
    ) -> ResultEngine<HashMap<i64, u64>> {
        if customer_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Option<i64>, i64)> = checks::Entity::find()
            .select_only()
            .column(checks::Column::CustomerId)
            .column_as(Expr::col(checks::Column::Id).count(), "used")
            .filter(checks::Column::Status.eq(CheckStatus::Used.as_str()))
            .filter(checks::Column::CustomerId.is_in(customer_ids.iter().copied()))
            .group_by(checks::Column::CustomerId)
            .into_tuple()
            .all(db)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(id, used)| id.map(|id| (id, used as u64)))
            .collect())
    }

    async fn rank(
        &self,
        db: &DatabaseTransaction,
        models: Vec<users::Model>,
    ) -> ResultEngine<Vec<CustomerRank>> {
        let ids: Vec<i64> = models.iter().map(|m| m.id).collect();
        let used = self.used_check_counts(db, &ids).await?;
        models
            .into_iter()
            .map(|model| {
                let used_checks = used.get(&model.id).copied().unwrap_or(0);
                Ok(CustomerRank {
                    customer: User::try_from(model)?,
                    used_checks,
                })
            })
            .collect()
    }

    /// Top (or bottom) customers by balance, ties by id.
    pub async fn top_customers(
        &self,
        order: RankOrder,
        limit: Option<u64>,
        actor_id: i64,
    ) -> ResultEngine<Vec<CustomerRank>> {
        let limit = limit.unwrap_or(DEFAULT_TOP_LIMIT);
        if limit == 0 || limit > MAX_TOP_LIMIT {
            return Err(EngineError::Validation(format!(
                "limit must be between 1 and {MAX_TOP_LIMIT}"
            )));
        }
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::ViewReports)
                .await?;
            let models = customers_ranked(order).limit(limit).all(&db_tx).await?;
            self.rank(&db_tx, models).await
        })
    }

    /// The full customer ranking, paginated.
    pub async fn customers_report(
        &self,
        order: RankOrder,
        request: PageRequest,
        actor_id: i64,
    ) -> ResultEngine<Page<CustomerRank>> {
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::ViewReports)
                .await?;
            let total = customers_ranked(order).count(&db_tx).await?;
            let models = customers_ranked(order)
                .offset(request.offset())
                .limit(request.limit())
                .all(&db_tx)
                .await?;
            let items = self.rank(&db_tx, models).await?;
            Ok(Page::new(items, request, total))
        })
    }

    /// Checks created between `start` and `end` (whole local days, both
    /// inclusive), oldest first.
    pub async fn export_checks(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        actor_id: i64,
    ) -> ResultEngine<Vec<Check>> {
        if start > end {
            return Err(EngineError::Validation(
                "startDate must not be after endDate".to_string(),
            ));
        }
        let from = local_day_start(self.timezone, start)?;
        let to = local_day_start(self.timezone, end)? + Duration::days(1);
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::ViewReports)
                .await?;
            let models = checks::Entity::find()
                .filter(checks::Column::CreatedAt.gte(from))
                .filter(checks::Column::CreatedAt.lt(to))
                .order_by_asc(checks::Column::CreatedAt)
                .order_by_asc(checks::Column::Id)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(Check::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Every customer, ranked by balance descending.
    pub async fn export_customers(&self, actor_id: i64) -> ResultEngine<Vec<CustomerRank>> {
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::ViewReports)
                .await?;
            let models = customers_ranked(RankOrder::Desc).all(&db_tx).await?;
            self.rank(&db_tx, models).await
        })
    }
}
