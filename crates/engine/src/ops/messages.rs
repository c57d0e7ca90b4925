use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};

use crate::{
    Broadcast, Capability, Message, Page, PageRequest, Recipient, ResultEngine, Role,
    message_recipients, messages, users, util::normalize_required_text,
};

use super::{Engine, with_tx};

impl Engine {
    /// Records a message for every active customer reachable on Telegram.
    ///
    /// Nothing is sent here: the caller delivers to the returned recipients
    /// after the commit and reports back with [`Engine::record_delivery`].
    pub async fn broadcast_message(
        &self,
        title: &str,
        content: &str,
        actor_id: i64,
        now: DateTime<Utc>,
    ) -> ResultEngine<Broadcast> {
        let title = normalize_required_text(title, "title")?;
        let content = normalize_required_text(content, "content")?;
        with_tx!(self, |db_tx| {
            let actor = self
                .require_capability(&db_tx, actor_id, Capability::BroadcastMessage)
                .await?;
            let message = messages::ActiveModel {
                id: ActiveValue::NotSet,
                title: ActiveValue::Set(title),
                content: ActiveValue::Set(content),
                sender_id: ActiveValue::Set(actor.id),
                is_global: ActiveValue::Set(true),
                created_at: ActiveValue::Set(now),
            }
            .insert(&db_tx)
            .await?;

            let customers = users::Entity::find()
                .filter(users::Column::Role.eq(Role::Customer.as_str()))
                .filter(users::Column::IsActive.eq(true))
                .filter(users::Column::TelegramId.is_not_null())
                .order_by_asc(users::Column::Id)
                .all(&db_tx)
                .await?;
            let recipients: Vec<Recipient> = customers
                .into_iter()
                .filter_map(|u| {
                    u.telegram_id.map(|telegram_id| Recipient {
                        user_id: u.id,
                        telegram_id,
                    })
                })
                .collect();

            if !recipients.is_empty() {
                let rows = recipients.iter().map(|r| message_recipients::ActiveModel {
                    message_id: ActiveValue::Set(message.id),
                    user_id: ActiveValue::Set(r.user_id),
                    delivered_at: ActiveValue::Set(None),
                });
                message_recipients::Entity::insert_many(rows)
                    .exec_without_returning(&db_tx)
                    .await?;
            }

            tracing::info!(
                message_id = message.id,
                recipients = recipients.len(),
                "message recorded"
            );
            Ok(Broadcast {
                message: Message::from_model(message, recipients.len() as u64),
                recipients,
            })
        })
    }

    /// Marks the given recipients of a message as delivered.
    pub async fn record_delivery(
        &self,
        message_id: i64,
        user_ids: &[i64],
        now: DateTime<Utc>,
    ) -> ResultEngine<u64> {
        if user_ids.is_empty() {
            return Ok(0);
        }
        with_tx!(self, |db_tx| {
            let res = message_recipients::Entity::update_many()
                .set(message_recipients::ActiveModel {
                    delivered_at: ActiveValue::Set(Some(now)),
                    ..Default::default()
                })
                .filter(message_recipients::Column::MessageId.eq(message_id))
                .filter(message_recipients::Column::UserId.is_in(user_ids.iter().copied()))
                .exec(&db_tx)
                .await?;
            Ok(res.rows_affected)
        })
    }

    /// Lists messages newest first with their recipient counts.
    pub async fn list_messages(
        &self,
        request: PageRequest,
        actor_id: i64,
    ) -> ResultEngine<Page<Message>> {
        with_tx!(self, |db_tx| {
            self.require_capability(&db_tx, actor_id, Capability::BroadcastMessage)
                .await?;
            let total = messages::Entity::find().count(&db_tx).await?;
            let models = messages::Entity::find()
                .order_by_desc(messages::Column::CreatedAt)
                .order_by_desc(messages::Column::Id)
                .offset(request.offset())
                .limit(request.limit())
                .all(&db_tx)
                .await?;
            let mut items = Vec::with_capacity(models.len());
            for model in models {
                let recipients = message_recipients::Entity::find()
                    .filter(message_recipients::Column::MessageId.eq(model.id))
                    .count(&db_tx)
                    .await?;
                items.push(Message::from_model(model, recipients));
            }
            Ok(Page::new(items, request, total))
        })
    }
}
