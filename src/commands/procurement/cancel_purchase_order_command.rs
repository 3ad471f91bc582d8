use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{ensure_no_pending_receptions, load_order};
use crate::{
    commands::Command,
    db::{flatten_txn_error, DbPool},
    entities::purchase_order,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::PurchaseOrderStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CancelPurchaseOrderCommand {
    pub purchase_order_id: Uuid,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub user_id: Uuid,
}

#[async_trait]
impl Command for CancelPurchaseOrderCommand {
    type Result = purchase_order::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_order_id = %self.purchase_order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let order_id = self.purchase_order_id;
        let reason = self.reason.clone();

        let cancelled = db_pool
            .transaction::<_, purchase_order::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let order = load_order(txn, order_id).await?;
                    if !order.status.is_open() {
                        return Err(ServiceError::InvalidOperation(format!(
                            "Purchase order {} is already {}",
                            order.number, order.status
                        )));
                    }
                    ensure_no_pending_receptions(txn, &order).await?;

                    let notes = match (order.notes.clone(), reason) {
                        (Some(notes), Some(reason)) => Some(format!("{}\nCancelled: {}", notes, reason)),
                        (None, Some(reason)) => Some(format!("Cancelled: {}", reason)),
                        (notes, None) => notes,
                    };

                    let mut active: purchase_order::ActiveModel = order.into();
                    active.status = Set(PurchaseOrderStatus::Cancelled);
                    active.notes = Set(notes);
                    Ok(active.update(txn).await?)
                })
            })
            .await
            .map_err(flatten_txn_error)
            .map_err(|e| {
                metrics::record_failure("purchase_order", "cancel", metrics::error_type(&e));
                e
            })?;

        metrics::record_transition("purchase_order", "cancel");
        info!(purchase_order_id = %cancelled.id, number = %cancelled.number, "Purchase order cancelled");

        event_sender
            .send(Event::PurchaseOrderCancelled {
                purchase_order_id: cancelled.id,
                actor_id: self.user_id,
            })
            .await
            .map_err(|e| {
                error!("Failed to send purchase order cancelled event: {}", e);
                ServiceError::EventError(e)
            })?;

        Ok(cancelled)
    }
}
