use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};

use crate::{
    EngineError, ResultEngine, Role, checks, users,
    util::{normalize_optional_text, normalize_phone},
};

use super::Engine;

impl Engine {
    /// Customer resolver: finds the customer owning `phone` (compared in
    /// normalized form) or creates one with a zero balance.
    pub(super) async fn resolve_customer(
        &self,
        db: &DatabaseTransaction,
        name: Option<&str>,
        phone: &str,
        now: DateTime<Utc>,
    ) -> ResultEngine<i64> {
        let phone = normalize_phone(phone)
            .ok_or_else(|| EngineError::Validation("invalid customer phone".to_string()))?;
        let name = normalize_optional_text(name);

        let existing = users::Entity::find()
            .filter(users::Column::Role.eq(Role::Customer.as_str()))
            .filter(users::Column::Phone.eq(phone.as_str()))
            .order_by_asc(users::Column::Id)
            .one(db)
            .await?;
        if let Some(model) = existing {
            if model.full_name.is_none() && name.is_some() {
                users::ActiveModel {
                    id: ActiveValue::Set(model.id),
                    full_name: ActiveValue::Set(name),
                    ..Default::default()
                }
                .update(db)
                .await?;
            }
            return Ok(model.id);
        }

        let created = users::ActiveModel {
            id: ActiveValue::NotSet,
            role: ActiveValue::Set(Role::Customer.as_str().to_string()),
            username: ActiveValue::Set(None),
            password_hash: ActiveValue::Set(None),
            full_name: ActiveValue::Set(name),
            phone: ActiveValue::Set(Some(phone)),
            telegram_id: ActiveValue::Set(None),
            telegram_username: ActiveValue::Set(None),
            balance_minor: ActiveValue::Set(0),
            station_id: ActiveValue::Set(None),
            is_active: ActiveValue::Set(true),
            created_at: ActiveValue::Set(now),
        }
        .insert(db)
        .await?;
        tracing::info!(customer_id = created.id, "customer created");
        Ok(created.id)
    }

    /// The customer a check credits: its linked customer if it still exists,
    /// otherwise whoever the typed phone resolves to.
    pub(super) async fn resolve_check_customer(
        &self,
        db: &DatabaseTransaction,
        check: &checks::Model,
        now: DateTime<Utc>,
    ) -> ResultEngine<Option<i64>> {
        if let Some(customer_id) = check.customer_id
            && users::Entity::find_by_id(customer_id).one(db).await?.is_some()
        {
            return Ok(Some(customer_id));
        }
        match check.customer_phone.as_deref() {
            Some(phone) if normalize_phone(phone).is_some() => self
                .resolve_customer(db, check.customer_name.as_deref(), phone, now)
                .await
                .map(Some),
            _ => Ok(None),
        }
    }
}
