use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait, prelude::*,
};

use crate::{
    Capability, Check, CheckListFilter, CheckStatus, CreateCheckCmd, EngineError, EntryKind,
    Liters, Page, PageRequest, QrPayload, ResultEngine, Role, balance_entries,
    checks::{self, generate_code},
    users,
    util::{normalize_optional_text, normalize_phone},
};

use super::{
    Engine,
    access::{require_station_scope, station_scope},
    with_tx,
};

const CODE_ATTEMPTS: usize = 8;

fn conflict(model: &checks::Model, action: &str) -> EngineError {
    EngineError::Conflict(format!(
        "cannot {action} check {}: status is {}",
        model.code, model.status
    ))
}

impl Engine {
    /// Issues a new pending, unprinted check. No balance effect.
    ///
    /// When a customer phone is given the customer is resolved (or created)
    /// and linked to the check right away.
    pub async fn create_check(
        &self,
        cmd: CreateCheckCmd,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<Check> {
        let amount = cmd.amount.require_positive("amount")?;
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::IssueCheck)
                .await?;
            if actor.role()? == Role::Operator && cmd.operator_id != actor.id {
                return Err(EngineError::Forbidden(
                    "operators issue checks only for themselves".to_string(),
                ));
            }
            require_station_scope(&actor, cmd.station_id)?;

            let station = self.require_station(&db_tx, cmd.station_id).await?;
            if !station.is_active {
                return Err(EngineError::NotFound("station not exists".to_string()));
            }
            let operator = users::Entity::find_by_id(cmd.operator_id)
                .one(&db_tx)
                .await?
                .filter(|u| {
                    u.is_active
                        && u.role == Role::Operator.as_str()
                        && u.station_id == Some(station.id)
                })
                .ok_or_else(|| EngineError::NotFound("operator not exists".to_string()))?;

            let customer_name = normalize_optional_text(cmd.customer.name.as_deref());
            let customer_phone = cmd.customer.phone.as_deref().and_then(normalize_phone);
            let customer_address = normalize_optional_text(cmd.customer.address.as_deref());
            let customer_id = match customer_phone.as_deref() {
                Some(phone) => Some(
                    self.resolve_customer(&db_tx, customer_name.as_deref(), phone, now)
                        .await?,
                ),
                None => None,
            };

            let code = self.unused_code(&db_tx).await?;
            let qr_code = QrPayload {
                code: code.clone(),
                station_id: station.id,
            }
            .encode()?;

            let model = checks::ActiveModel {
                id: ActiveValue::NotSet,
                code: ActiveValue::Set(code),
                qr_code: ActiveValue::Set(qr_code),
                amount_minor: ActiveValue::Set(amount.hundredths()),
                status: ActiveValue::Set(CheckStatus::Pending.as_str().to_string()),
                is_printed: ActiveValue::Set(false),
                operator_id: ActiveValue::Set(operator.id),
                station_id: ActiveValue::Set(station.id),
                customer_id: ActiveValue::Set(customer_id),
                customer_name: ActiveValue::Set(customer_name),
                customer_phone: ActiveValue::Set(customer_phone),
                customer_address: ActiveValue::Set(customer_address),
                created_at: ActiveValue::Set(now),
                used_at: ActiveValue::Set(None),
                expires_at: ActiveValue::Set(now + self.check_validity),
            }
            .insert(&db_tx)
            .await?;

            tracing::info!(
                check_id = model.id,
                code = %model.code,
                amount = %amount,
                station_id = model.station_id,
                "check issued"
            );
            Check::try_from(model)
        })
    }

    async fn unused_code(&self, db: &DatabaseTransaction) -> ResultEngine<String> {
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code();
            let taken = checks::Entity::find()
                .filter(checks::Column::Code.eq(code.as_str()))
                .count(db)
                .await?
                > 0;
            if !taken {
                return Ok(code);
            }
        }
        Err(EngineError::Conflict(
            "could not generate a unique check code".to_string(),
        ))
    }

    /// Confirms (prints and redeems) a check: `pending`/`printed` to `used`.
    ///
    /// Resolves the customer, credits the check amount with a
    /// `confirm_credit` ledger entry and records the check's station as the
    /// customer's last-used station. A check without any resolvable customer
    /// is closed without a credit.
    pub async fn confirm_check(
        &self,
        check_id: i64,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<Check> {
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::ConfirmCheck)
                .await?;
            let model = self.require_check(&db_tx, check_id).await?;
            require_station_scope(&actor, model.station_id)?;
            if !CheckStatus::confirmable().contains(&model.status()?) {
                return Err(conflict(&model, "confirm"));
            }

            let customer_id = self.resolve_check_customer(&db_tx, &model, now).await?;

            let res = checks::Entity::update_many()
                .set(checks::ActiveModel {
                    status: ActiveValue::Set(CheckStatus::Used.as_str().to_string()),
                    is_printed: ActiveValue::Set(true),
                    used_at: ActiveValue::Set(Some(now)),
                    customer_id: ActiveValue::Set(customer_id),
                    ..Default::default()
                })
                .filter(checks::Column::Id.eq(check_id))
                .filter(
                    checks::Column::Status
                        .is_in(CheckStatus::confirmable().map(CheckStatus::as_str)),
                )
                .exec(&db_tx)
                .await?;
            if res.rows_affected == 0 {
                return Err(conflict(&model, "confirm"));
            }

            if let Some(customer_id) = customer_id {
                self.apply_balance_change(
                    &db_tx,
                    customer_id,
                    Some(check_id),
                    EntryKind::ConfirmCredit,
                    Liters::new(model.amount_minor),
                    actor.id,
                    now,
                )
                .await?;
                users::ActiveModel {
                    id: ActiveValue::Set(customer_id),
                    station_id: ActiveValue::Set(Some(model.station_id)),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
            } else {
                tracing::warn!(check_id, "check confirmed without a customer");
            }

            tracing::info!(check_id, code = %model.code, "check confirmed");
            Check::try_from(self.require_check(&db_tx, check_id).await?)
        })
    }

    /// Cancels a pending check. No balance effect.
    pub async fn cancel_check(&self, check_id: i64, actor_id: i64) -> ResultEngine<Check> {
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::ConfirmCheck)
                .await?;
            let model = self.require_check(&db_tx, check_id).await?;
            require_station_scope(&actor, model.station_id)?;
            if !model.status()?.can_transition_to(CheckStatus::Cancelled) {
                return Err(conflict(&model, "cancel"));
            }

            let res = checks::Entity::update_many()
                .set(checks::ActiveModel {
                    status: ActiveValue::Set(CheckStatus::Cancelled.as_str().to_string()),
                    ..Default::default()
                })
                .filter(checks::Column::Id.eq(check_id))
                .filter(checks::Column::Status.eq(CheckStatus::Pending.as_str()))
                .exec(&db_tx)
                .await?;
            if res.rows_affected == 0 {
                return Err(conflict(&model, "cancel"));
            }

            tracing::info!(check_id, code = %model.code, "check cancelled");
            Check::try_from(self.require_check(&db_tx, check_id).await?)
        })
    }

    /// Flags a check as printed without touching its status.
    pub async fn mark_printed(&self, check_id: i64, actor_id: i64) -> ResultEngine<Check> {
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::ConfirmCheck)
                .await?;
            let model = self.require_check(&db_tx, check_id).await?;
            require_station_scope(&actor, model.station_id)?;
            if matches!(
                model.status()?,
                CheckStatus::Cancelled | CheckStatus::Expired
            ) {
                return Err(conflict(&model, "print"));
            }
            if model.is_printed {
                return Check::try_from(model);
            }

            let res = checks::Entity::update_many()
                .set(checks::ActiveModel {
                    is_printed: ActiveValue::Set(true),
                    ..Default::default()
                })
                .filter(checks::Column::Id.eq(check_id))
                .filter(checks::Column::Status.is_not_in([
                    CheckStatus::Cancelled.as_str(),
                    CheckStatus::Expired.as_str(),
                ]))
                .exec(&db_tx)
                .await?;
            if res.rows_affected == 0 {
                return Err(conflict(&model, "print"));
            }

            tracing::info!(check_id, "check printed");
            Check::try_from(self.require_check(&db_tx, check_id).await?)
        })
    }

    /// Credits `amount` to the check's customer as a correction.
    ///
    /// Works in any status and never changes the check's amount or status.
    /// Links the resolved customer to the check when it had none.
    pub async fn reactivate_check(
        &self,
        check_id: i64,
        amount: Liters,
        operator_id: i64,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<Check> {
        let amount = amount.require_positive("amount")?;
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::ConfirmCheck)
                .await?;
            let model = self.require_check(&db_tx, check_id).await?;
            require_station_scope(&actor, model.station_id)?;
            if actor.role()? == Role::Operator && operator_id != actor.id {
                return Err(EngineError::Forbidden(
                    "operators reactivate checks only as themselves".to_string(),
                ));
            }
            let operator = users::Entity::find_by_id(operator_id)
                .one(&db_tx)
                .await?
                .filter(|u| u.is_active && u.role().is_ok_and(Role::is_staff))
                .ok_or_else(|| EngineError::NotFound("operator not exists".to_string()))?;

            let customer_id = self
                .resolve_check_customer(&db_tx, &model, now)
                .await?
                .ok_or_else(|| {
                    EngineError::Validation("check has no customer to credit".to_string())
                })?;
            if model.customer_id != Some(customer_id) {
                checks::ActiveModel {
                    id: ActiveValue::Set(check_id),
                    customer_id: ActiveValue::Set(Some(customer_id)),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
            }

            self.apply_balance_change(
                &db_tx,
                customer_id,
                Some(check_id),
                EntryKind::ReactivateCredit,
                amount,
                operator.id,
                now,
            )
            .await?;

            tracing::info!(check_id, customer_id, amount = %amount, "check reactivated");
            Check::try_from(self.require_check(&db_tx, check_id).await?)
        })
    }

    /// Deletes a check. If it was used, the confirm credit is reversed with
    /// a `delete_reversal` entry in the same transaction.
    pub async fn delete_check(
        &self,
        check_id: i64,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::DeleteCheck)
                .await?;
            let model = self.require_check(&db_tx, check_id).await?;

            let res = checks::Entity::delete_many()
                .filter(checks::Column::Id.eq(check_id))
                .filter(checks::Column::Status.eq(model.status.as_str()))
                .exec(&db_tx)
                .await?;
            if res.rows_affected == 0 {
                return Err(conflict(&model, "delete"));
            }

            if model.status()? == CheckStatus::Used {
                let credits = balance_entries::Entity::find()
                    .filter(balance_entries::Column::CheckId.eq(check_id))
                    .filter(balance_entries::Column::Kind.eq(EntryKind::ConfirmCredit.as_str()))
                    .all(&db_tx)
                    .await?;
                for credit in credits {
                    self.apply_balance_change(
                        &db_tx,
                        credit.customer_id,
                        Some(check_id),
                        EntryKind::DeleteReversal,
                        -Liters::new(credit.amount_minor),
                        actor.id,
                        now,
                    )
                    .await?;
                }
            }

            tracing::info!(check_id, code = %model.code, status = %model.status, "check deleted");
            Ok(())
        })
    }

    pub async fn check(&self, check_id: i64, actor_id: i64) -> ResultEngine<Check> {
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::ViewChecks)
                .await?;
            let model = self.require_check(&db_tx, check_id).await?;
            require_station_scope(&actor, model.station_id)?;
            Check::try_from(model)
        })
    }

    /// Lists checks newest first (`created_at DESC, id DESC`).
    ///
    /// Operators only see their own station; asking for another station is
    /// forbidden.
    pub async fn list_checks(
        &self,
        filter: &CheckListFilter,
        request: PageRequest,
        actor_id: i64,
    ) -> ResultEngine<Page<Check>> {
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::ViewChecks)
                .await?;
            let station_id = match (station_scope(&actor)?, filter.station_id) {
                (Some(own), Some(asked)) if own != asked => {
                    return Err(EngineError::Forbidden(
                        "operator is not assigned to this station".to_string(),
                    ));
                }
                (Some(own), _) => Some(own),
                (None, asked) => asked,
            };

            let mut cond = Condition::all();
            if let Some(station_id) = station_id {
                cond = cond.add(checks::Column::StationId.eq(station_id));
            }
            if let Some(status) = filter.status {
                cond = cond.add(checks::Column::Status.eq(status.as_str()));
            }
            if let Some(operator_id) = filter.operator_id {
                cond = cond.add(checks::Column::OperatorId.eq(operator_id));
            }
            if let Some(is_printed) = filter.is_printed {
                cond = cond.add(checks::Column::IsPrinted.eq(is_printed));
            }
            if let Some(customer_id) = filter.customer_id {
                cond = cond.add(checks::Column::CustomerId.eq(customer_id));
            }

            let total = checks::Entity::find()
                .filter(cond.clone())
                .count(&db_tx)
                .await?;
            let models = checks::Entity::find()
                .filter(cond)
                .order_by_desc(checks::Column::CreatedAt)
                .order_by_desc(checks::Column::Id)
                .offset(request.offset())
                .limit(request.limit())
                .all(&db_tx)
                .await?;
            let items = models
                .into_iter()
                .map(Check::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;
            Ok(Page::new(items, request, total))
        })
    }

    /// Moves every pending check whose `expires_at` is before `now` to
    /// `expired`. Returns how many checks expired.
    ///
    /// Not exposed over HTTP: the app runs it periodically and the admin CLI
    /// on demand.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> ResultEngine<u64> {
        with_tx!(self, |db_tx| {
            let res = checks::Entity::update_many()
                .set(checks::ActiveModel {
                    status: ActiveValue::Set(CheckStatus::Expired.as_str().to_string()),
                    ..Default::default()
                })
                .filter(checks::Column::Status.eq(CheckStatus::Pending.as_str()))
                .filter(checks::Column::ExpiresAt.lt(now))
                .exec(&db_tx)
                .await?;
            if res.rows_affected > 0 {
                tracing::info!(count = res.rows_affected, "overdue checks expired");
            }
            Ok(res.rows_affected)
        })
    }
}
