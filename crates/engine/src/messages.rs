//! Broadcast messages sent by moderators to customers.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub sender_id: i64,
    pub is_global: bool,
    pub created_at: DateTime<Utc>,
    pub recipients: u64,
}

/// Where a broadcast must be delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub user_id: i64,
    pub telegram_id: String,
}

/// A recorded broadcast and the customers it targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Broadcast {
    pub message: Message,
    pub recipients: Vec<Recipient>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    pub content: String,
    pub sender_id: i64,
    pub is_global: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Message {
    pub(crate) fn from_model(model: Model, recipients: u64) -> Self {
        Self {
            id: model.id,
            title: model.title,
            content: model.content,
            sender_id: model.sender_id,
            is_global: model.is_global,
            created_at: model.created_at,
            recipients,
        }
    }
}
