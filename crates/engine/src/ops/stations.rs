use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};

use crate::{
    Capability, EngineError, NewStation, ResultEngine, Role, Station, StationSummary,
    StationUpdate, checks, stations, users,
    util::{normalize_optional_text, normalize_phone, normalize_required_text},
};

use super::{Engine, with_tx};

fn optional_phone(value: Option<&str>) -> ResultEngine<Option<String>> {
    match value.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => normalize_phone(raw)
            .map(Some)
            .ok_or_else(|| EngineError::Validation("invalid phone".to_string())),
        None => Ok(None),
    }
}

impl Engine {
    /// Lists every station by id with its operator and check counts.
    pub async fn list_stations(&self, actor_id: i64) -> ResultEngine<Vec<StationSummary>> {
        with_tx!(self, |db_tx| {
            self.require_actor(&db_tx, actor_id).await?;
            let models = stations::Entity::find()
                .order_by_asc(stations::Column::Id)
                .all(&db_tx)
                .await?;
            let mut out = Vec::with_capacity(models.len());
            for model in models {
                let (operators, checks) = self.station_usage(&db_tx, model.id).await?;
                out.push(StationSummary {
                    station: Station::from(model),
                    operators,
                    checks,
                });
            }
            Ok(out)
        })
    }

    async fn station_usage(
        &self,
        db: &DatabaseTransaction,
        station_id: i64,
    ) -> ResultEngine<(u64, u64)> {
        let operators = users::Entity::find()
            .filter(users::Column::Role.eq(Role::Operator.as_str()))
            .filter(users::Column::StationId.eq(station_id))
            .count(db)
            .await?;
        let checks = checks::Entity::find()
            .filter(checks::Column::StationId.eq(station_id))
            .count(db)
            .await?;
        Ok((operators, checks))
    }

    pub async fn create_station(
        &self,
        new_station: NewStation,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<Station> {
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::ManageStations)
                .await?;
            let model = stations::ActiveModel {
                id: ActiveValue::NotSet,
                name: ActiveValue::Set(normalize_required_text(&new_station.name, "station name")?),
                address: ActiveValue::Set(normalize_optional_text(new_station.address.as_deref())),
                phone: ActiveValue::Set(optional_phone(new_station.phone.as_deref())?),
                is_active: ActiveValue::Set(true),
                created_at: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;
            tracing::info!(station_id = model.id, name = %model.name, "station created");
            Ok(Station::from(model))
        })
    }

    pub async fn update_station(
        &self,
        station_id: i64,
        update: StationUpdate,
        actor_id: i64,
    ) -> ResultEngine<Station> {
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::ManageStations)
                .await?;
            self.require_station(&db_tx, station_id).await?;

            let mut active = stations::ActiveModel {
                id: ActiveValue::Set(station_id),
                ..Default::default()
            };
            if let Some(name) = update.name.as_deref() {
                active.name = ActiveValue::Set(normalize_required_text(name, "station name")?);
            }
            if let Some(address) = update.address {
                active.address = ActiveValue::Set(normalize_optional_text(address.as_deref()));
            }
            if let Some(phone) = update.phone {
                active.phone = ActiveValue::Set(optional_phone(phone.as_deref())?);
            }
            if let Some(is_active) = update.is_active {
                active.is_active = ActiveValue::Set(is_active);
            }
            let model = active.update(&db_tx).await?;
            tracing::info!(station_id, "station updated");
            Ok(Station::from(model))
        })
    }

    /// Deletes a station nobody references. Stations with operators or
    /// checks can only be deactivated.
    pub async fn delete_station(&self, station_id: i64, actor_id: i64) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::ManageStations)
                .await?;
            self.require_station(&db_tx, station_id).await?;
            let (operators, checks) = self.station_usage(&db_tx, station_id).await?;
            if operators > 0 || checks > 0 {
                return Err(EngineError::Conflict(format!(
                    "station has {operators} operators and {checks} checks"
                )));
            }
            users::Entity::update_many()
                .set(users::ActiveModel {
                    station_id: ActiveValue::Set(None),
                    ..Default::default()
                })
                .filter(users::Column::StationId.eq(station_id))
                .exec(&db_tx)
                .await?;
            stations::Entity::delete_by_id(station_id)
                .exec(&db_tx)
                .await?;
            tracing::info!(station_id, "station deleted");
            Ok(())
        })
    }
}
