use sea_orm::{DatabaseTransaction, prelude::*};

use crate::{Capability, EngineError, ResultEngine, Role, checks, stations, users};

use super::Engine;

impl Engine {
    /// Loads the acting user. Unknown or deactivated actors are not
    /// authenticated; customers never act through the API.
    pub(super) async fn require_actor(
        &self,
        db: &DatabaseTransaction,
        actor_id: i64,
    ) -> ResultEngine<users::Model> {
        let actor = users::Entity::find_by_id(actor_id)
            .one(db)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| EngineError::Unauthenticated("unknown user".to_string()))?;
        if !actor.role()?.is_staff() {
            return Err(EngineError::Forbidden("staff only".to_string()));
        }
        Ok(actor)
    }

    pub(super) async fn require_capability(
        &self,
        db: &DatabaseTransaction,
        actor_id: i64,
        capability: Capability,
    ) -> ResultEngine<users::Model> {
        let actor = self.require_actor(db, actor_id).await?;
        if !actor.role()?.can(capability) {
            return Err(EngineError::Forbidden(format!(
                "{} may not {capability:?}",
                actor.role
            )));
        }
        Ok(actor)
    }

    pub(super) async fn require_check(
        &self,
        db: &DatabaseTransaction,
        check_id: i64,
    ) -> ResultEngine<checks::Model> {
        checks::Entity::find_by_id(check_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("check not exists".to_string()))
    }

    pub(super) async fn require_station(
        &self,
        db: &DatabaseTransaction,
        station_id: i64,
    ) -> ResultEngine<stations::Model> {
        stations::Entity::find_by_id(station_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("station not exists".to_string()))
    }

    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        user_id: i64,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::NotFound("user not exists".to_string()))
    }
}

/// Operators only see and act on their own station.
pub(super) fn require_station_scope(actor: &users::Model, station_id: i64) -> ResultEngine<()> {
    if actor.role()? == Role::Operator && actor.station_id != Some(station_id) {
        return Err(EngineError::Forbidden(
            "operator is not assigned to this station".to_string(),
        ));
    }
    Ok(())
}

/// The station an operator is confined to, `None` for moderators.
pub(super) fn station_scope(actor: &users::Model) -> ResultEngine<Option<i64>> {
    match actor.role()? {
        Role::Operator => actor.station_id.map(Some).ok_or_else(|| {
            EngineError::Forbidden("operator is not assigned to a station".to_string())
        }),
        _ => Ok(None),
    }
}
