use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait, prelude::*,
};

use crate::{
    Capability, EngineError, NewUser, Page, PageRequest, ResultEngine, Role, User, UserListFilter,
    UserUpdate, balance_entries, checks, message_recipients, sessions, users,
    util::{normalize_optional_text, normalize_phone, normalize_username},
};

use super::{Engine, access::require_station_scope, sessions::hash_password, with_tx};

impl Engine {
    /// Reads one user. Staff may read customers and themselves; other staff
    /// accounts need the manage-users capability.
    pub async fn user(&self, user_id: i64, actor_id: i64) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::ViewChecks)
                .await?;
            let model = self.require_user(&db_tx, user_id).await?;
            let visible = model.id == actor.id
                || model.role()? == Role::Customer
                || actor.role()?.can(Capability::ManageUsers);
            if !visible {
                return Err(EngineError::Forbidden(
                    "not allowed to read this user".to_string(),
                ));
            }
            User::try_from(model)
        })
    }

    /// Lists users by ascending id.
    pub async fn list_users(
        &self,
        filter: &UserListFilter,
        request: PageRequest,
        actor_id: i64,
    ) -> ResultEngine<Page<User>> {
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::ManageUsers)
                .await?;
            let mut cond = Condition::all();
            if let Some(role) = filter.role {
                cond = cond.add(users::Column::Role.eq(role.as_str()));
            }
            if let Some(station_id) = filter.station_id {
                cond = cond.add(users::Column::StationId.eq(station_id));
            }
            if let Some(is_active) = filter.is_active {
                cond = cond.add(users::Column::IsActive.eq(is_active));
            }
            self.page_users(&db_tx, cond, request).await
        })
    }

    /// Customers whose last-used station is `station_id`.
    pub async fn station_customers(
        &self,
        station_id: i64,
        request: PageRequest,
        actor_id: i64,
    ) -> ResultEngine<Page<User>> {
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::ViewChecks)
                .await?;
            require_station_scope(&actor, station_id)?;
            self.require_station(&db_tx, station_id).await?;
            let cond = Condition::all()
                .add(users::Column::Role.eq(Role::Customer.as_str()))
                .add(users::Column::StationId.eq(station_id));
            self.page_users(&db_tx, cond, request).await
        })
    }

    async fn page_users(
        &self,
        db: &DatabaseTransaction,
        cond: Condition,
        request: PageRequest,
    ) -> ResultEngine<Page<User>> {
        let total = users::Entity::find()
            .filter(cond.clone())
            .count(db)
            .await?;
        let models = users::Entity::find()
            .filter(cond)
            .order_by_asc(users::Column::Id)
            .offset(request.offset())
            .limit(request.limit())
            .all(db)
            .await?;
        let items = models
            .into_iter()
            .map(User::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        Ok(Page::new(items, request, total))
    }

    pub async fn create_user(
        &self,
        new_user: NewUser,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::ManageUsers)
                .await?;
            let model = self.insert_user(&db_tx, new_user, now).await?;
            tracing::info!(user_id = model.id, role = %model.role, "user created");
            User::try_from(model)
        })
    }

    /// Creates a moderator without an acting user.
    ///
    /// Administrative: used by the admin CLI to bootstrap the first account.
    pub async fn bootstrap_moderator(
        &self,
        username: &str,
        password: &str,
        full_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> ResultEngine<User> {
        let mut new_user = NewUser::staff(Role::Moderator, username, password);
        new_user.full_name = full_name.map(ToString::to_string);
        with_tx!(self, |db_tx| {
            let model = self.insert_user(&db_tx, new_user, now).await?;
            tracing::info!(user_id = model.id, "moderator bootstrapped");
            User::try_from(model)
        })
    }

    async fn insert_user(
        &self,
        db: &DatabaseTransaction,
        new_user: NewUser,
        now: DateTime<Utc>,
    ) -> ResultEngine<users::Model> {
        let (username, password_hash) = if new_user.role.is_staff() {
            let username = new_user
                .username
                .as_deref()
                .ok_or_else(|| EngineError::Validation("username is required".to_string()))?;
            let password = new_user
                .password
                .as_deref()
                .ok_or_else(|| EngineError::Validation("password is required".to_string()))?;
            let username = normalize_username(username)?;
            self.require_username_free(db, &username, None).await?;
            (Some(username), Some(hash_password(password)?))
        } else {
            if new_user.username.is_some() || new_user.password.is_some() {
                return Err(EngineError::Validation(
                    "customers have no login".to_string(),
                ));
            }
            (None, None)
        };

        let phone = match new_user.phone.as_deref() {
            Some(raw) => Some(
                normalize_phone(raw)
                    .ok_or_else(|| EngineError::Validation("invalid phone".to_string()))?,
            ),
            None => None,
        };
        if new_user.role == Role::Customer
            && let Some(phone) = phone.as_deref()
        {
            self.require_customer_phone_free(db, phone, None).await?;
        }

        let station_id = self
            .validate_user_station(db, new_user.role, new_user.station_id)
            .await?;

        let model = users::ActiveModel {
            id: ActiveValue::NotSet,
            role: ActiveValue::Set(new_user.role.as_str().to_string()),
            username: ActiveValue::Set(username),
            password_hash: ActiveValue::Set(password_hash),
            full_name: ActiveValue::Set(normalize_optional_text(new_user.full_name.as_deref())),
            phone: ActiveValue::Set(phone),
            telegram_id: ActiveValue::Set(normalize_optional_text(
                new_user.telegram_id.as_deref(),
            )),
            telegram_username: ActiveValue::Set(normalize_optional_text(
                new_user.telegram_username.as_deref(),
            )),
            balance_minor: ActiveValue::Set(0),
            station_id: ActiveValue::Set(station_id),
            is_active: ActiveValue::Set(true),
            created_at: ActiveValue::Set(now),
        }
        .insert(db)
        .await?;
        Ok(model)
    }

    /// Operators must reference an existing station. Moderators carry none.
    async fn validate_user_station(
        &self,
        db: &DatabaseTransaction,
        role: Role,
        station_id: Option<i64>,
    ) -> ResultEngine<Option<i64>> {
        match (role, station_id) {
            (Role::Operator, None) => Err(EngineError::Validation(
                "operators require a station".to_string(),
            )),
            (Role::Moderator, _) => Ok(None),
            (_, Some(station_id)) => {
                self.require_station(db, station_id).await?;
                Ok(Some(station_id))
            }
            (Role::Customer, None) => Ok(None),
        }
    }

    async fn require_username_free(
        &self,
        db: &DatabaseTransaction,
        username: &str,
        except: Option<i64>,
    ) -> ResultEngine<()> {
        let mut query = users::Entity::find().filter(users::Column::Username.eq(username));
        if let Some(id) = except {
            query = query.filter(users::Column::Id.ne(id));
        }
        if query.count(db).await? > 0 {
            return Err(EngineError::Conflict(format!(
                "username {username} already taken"
            )));
        }
        Ok(())
    }

    async fn require_customer_phone_free(
        &self,
        db: &DatabaseTransaction,
        phone: &str,
        except: Option<i64>,
    ) -> ResultEngine<()> {
        let mut query = users::Entity::find()
            .filter(users::Column::Role.eq(Role::Customer.as_str()))
            .filter(users::Column::Phone.eq(phone));
        if let Some(id) = except {
            query = query.filter(users::Column::Id.ne(id));
        }
        if query.count(db).await? > 0 {
            return Err(EngineError::Conflict(format!(
                "a customer with phone {phone} already exists"
            )));
        }
        Ok(())
    }

    /// Applies a partial update. Users cannot demote or deactivate themselves.
    pub async fn update_user(
        &self,
        user_id: i64,
        update: UserUpdate,
        actor_id: i64,
    ) -> ResultEngine<User> {
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::ManageUsers)
                .await?;
            let model = self.require_user(&db_tx, user_id).await?;
            let current_role = model.role()?;
            let role = update.role.unwrap_or(current_role);
            if model.id == actor.id
                && (role != current_role || update.is_active == Some(false))
            {
                return Err(EngineError::Conflict(
                    "cannot demote or deactivate yourself".to_string(),
                ));
            }

            let mut active = users::ActiveModel {
                id: ActiveValue::Set(model.id),
                ..Default::default()
            };

            if let Some(full_name) = update.full_name {
                active.full_name = ActiveValue::Set(normalize_optional_text(full_name.as_deref()));
            }
            if let Some(phone) = update.phone {
                let phone = match phone.as_deref() {
                    Some(raw) => Some(
                        normalize_phone(raw)
                            .ok_or_else(|| EngineError::Validation("invalid phone".to_string()))?,
                    ),
                    None => None,
                };
                if role == Role::Customer
                    && let Some(phone) = phone.as_deref()
                {
                    self.require_customer_phone_free(&db_tx, phone, Some(model.id))
                        .await?;
                }
                active.phone = ActiveValue::Set(phone);
            }
            if let Some(telegram_id) = update.telegram_id {
                active.telegram_id =
                    ActiveValue::Set(normalize_optional_text(telegram_id.as_deref()));
            }
            if let Some(is_active) = update.is_active {
                active.is_active = ActiveValue::Set(is_active);
            }

            let password_hash = match update.password.as_deref() {
                Some(password) => Some(hash_password(password)?),
                None => None,
            };
            if role.is_staff() && !current_role.is_staff() {
                if model.username.is_none() {
                    return Err(EngineError::Validation(
                        "staff accounts need a username".to_string(),
                    ));
                }
                if model.password_hash.is_none() && password_hash.is_none() {
                    return Err(EngineError::Validation(
                        "staff accounts need a password".to_string(),
                    ));
                }
            }
            if let Some(hash) = password_hash {
                active.password_hash = ActiveValue::Set(Some(hash));
            }

            let station_id = update.station_id.unwrap_or(model.station_id);
            if update.role.is_some() || update.station_id.is_some() {
                let station_id = self.validate_user_station(&db_tx, role, station_id).await?;
                active.station_id = ActiveValue::Set(station_id);
            }
            if update.role.is_some() {
                active.role = ActiveValue::Set(role.as_str().to_string());
            }

            let updated = active.update(&db_tx).await?;
            if !updated.is_active || update.password.is_some() || role != current_role {
                sessions::Entity::delete_many()
                    .filter(sessions::Column::UserId.eq(updated.id))
                    .exec(&db_tx)
                    .await?;
            }
            tracing::info!(user_id = updated.id, "user updated");
            User::try_from(updated)
        })
    }

    /// Deletes a user with no history. Users who issued or hold checks, or
    /// appear in the ledger, can only be deactivated.
    pub async fn delete_user(&self, user_id: i64, actor_id: i64) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::ManageUsers)
                .await?;
            if actor.id == user_id {
                return Err(EngineError::Conflict("cannot delete yourself".to_string()));
            }
            self.require_user(&db_tx, user_id).await?;

            let checks_count = checks::Entity::find()
                .filter(
                    Condition::any()
                        .add(checks::Column::OperatorId.eq(user_id))
                        .add(checks::Column::CustomerId.eq(user_id)),
                )
                .count(&db_tx)
                .await?;
            let entries_count = balance_entries::Entity::find()
                .filter(
                    Condition::any()
                        .add(balance_entries::Column::CustomerId.eq(user_id))
                        .add(balance_entries::Column::CreatedBy.eq(user_id)),
                )
                .count(&db_tx)
                .await?;
            if checks_count > 0 || entries_count > 0 {
                return Err(EngineError::Conflict(
                    "user has checks or balance history".to_string(),
                ));
            }

            sessions::Entity::delete_many()
                .filter(sessions::Column::UserId.eq(user_id))
                .exec(&db_tx)
                .await?;
            message_recipients::Entity::delete_many()
                .filter(message_recipients::Column::UserId.eq(user_id))
                .exec(&db_tx)
                .await?;
            users::Entity::delete_by_id(user_id).exec(&db_tx).await?;
            tracing::info!(user_id, "user deleted");
            Ok(())
        })
    }
}
