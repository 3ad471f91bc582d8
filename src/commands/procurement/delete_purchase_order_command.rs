use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{ensure_no_pending_receptions, load_order};
use crate::{
    commands::Command,
    db::{flatten_txn_error, DbPool},
    entities::purchase_order,
    errors::ServiceError,
    events::{Event, EventSender},
    models::PurchaseOrderStatus,
};

/// Soft-deletes a PENDING order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletePurchaseOrderCommand {
    pub purchase_order_id: Uuid,
    pub user_id: Uuid,
}

#[async_trait]
impl Command for DeletePurchaseOrderCommand {
    type Result = ();

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_order_id = %self.purchase_order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let order_id = self.purchase_order_id;

        let deleted = db_pool
            .transaction::<_, purchase_order::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let order = load_order(txn, order_id).await?;
                    if order.status != PurchaseOrderStatus::Pending {
                        return Err(ServiceError::InvalidOperation(format!(
                            "Purchase order {} is {}; only PENDING orders can be deleted",
                            order.number, order.status
                        )));
                    }
                    ensure_no_pending_receptions(txn, &order).await?;

                    let mut active: purchase_order::ActiveModel = order.into();
                    active.deleted = Set(true);
                    Ok(active.update(txn).await?)
                })
            })
            .await
            .map_err(flatten_txn_error)?;

        info!(purchase_order_id = %deleted.id, "Purchase order deleted");

        event_sender
            .send(Event::RecordDeleted {
                entity: "purchase_order".to_string(),
                entity_id: deleted.id,
                actor_id: self.user_id,
            })
            .await
            .map_err(ServiceError::EventError)
    }
}
