use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    commands::Command,
    db::{flatten_txn_error, DbPool},
    entities::reception,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::ReceptionStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelReceptionCommand {
    pub reception_id: Uuid,
    pub user_id: Uuid,
}

#[async_trait]
impl Command for CancelReceptionCommand {
    type Result = reception::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(reception_id = %self.reception_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let reception_id = self.reception_id;

        let cancelled = db_pool
            .transaction::<_, reception::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let found = reception::Entity::find_by_id(reception_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("Reception", reception_id))?;

                    if found.status != ReceptionStatus::Pending {
                        return Err(ServiceError::InvalidOperation(format!(
                            "Reception {} is {}; only PENDING receptions can be cancelled",
                            found.number, found.status
                        )));
                    }

                    let mut active: reception::ActiveModel = found.into();
                    active.status = Set(ReceptionStatus::Cancelled);
                    Ok(active.update(txn).await?)
                })
            })
            .await
            .map_err(flatten_txn_error)?;

        metrics::record_transition("reception", "cancel");
        info!(reception_id = %cancelled.id, "Reception cancelled");

        event_sender
            .send(Event::ReceptionCancelled {
                reception_id: cancelled.id,
                actor_id: self.user_id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(cancelled)
    }
}
