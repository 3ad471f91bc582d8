use async_trait::async_trait;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::stock::{apply_movement, MovementInput};
use crate::{
    commands::Command,
    db::{flatten_txn_error, DbPool},
    entities::{catalog_entry, movement},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::{CatalogKind, MovementOperation},
};

/// Manual stock adjustment.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterMovementCommand {
    pub article_id: Uuid,
    pub movement_type_id: Option<Uuid>,
    pub operation: MovementOperation,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub user_id: Uuid,
}

#[async_trait]
impl Command for RegisterMovementCommand {
    type Result = movement::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(article_id = %self.article_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let result = self.register_in_db(db_pool.as_ref()).await;
        let movement = match result {
            Ok(movement) => movement,
            Err(e) => {
                metrics::record_failure("movement", "register", metrics::error_type(&e));
                return Err(e);
            }
        };

        info!(
            movement_id = %movement.id,
            stock_after = movement.stock_after,
            "Movement registered"
        );

        event_sender
            .send(Event::MovementRegistered {
                movement_id: movement.id,
                article_id: movement.article_id,
                stock_after: movement.stock_after,
                actor_id: self.user_id,
            })
            .await
            .map_err(|e| {
                error!("Failed to send movement event: {}", e);
                ServiceError::EventError(e)
            })?;

        Ok(movement)
    }
}

impl RegisterMovementCommand {
    async fn register_in_db(&self, db: &DbPool) -> Result<movement::Model, ServiceError> {
        let input = MovementInput {
            article_id: self.article_id,
            operation: self.operation,
            quantity: self.quantity,
            movement_type_id: self.movement_type_id,
            reason: self.reason.clone(),
            reference_kind: Some("adjustment"),
            reference_id: None,
            user_id: self.user_id,
        };
        let movement_type_id = self.movement_type_id;

        db.transaction::<_, movement::Model, ServiceError>(|txn| {
            Box::pin(async move {
                if let Some(type_id) = movement_type_id {
                    catalog_entry::Entity::find_by_id(type_id)
                        .filter(catalog_entry::Column::Kind.eq(CatalogKind::MovementType))
                        .filter(catalog_entry::Column::Deleted.eq(false))
                        .one(txn)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("Movement type", type_id))?;
                }

                apply_movement(txn, input).await
            })
        })
        .await
        .map_err(flatten_txn_error)
    }
}
