use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{
    check_order, ensure_no_pending_receptions, insert_order_lines, load_order, order_totals,
    PurchaseOrderLineInput,
};
use crate::{
    commands::Command,
    db::{flatten_txn_error, DbPool},
    entities::{purchase_order, purchase_order_line},
    errors::ServiceError,
    events::{Event, EventSender},
    models::PurchaseOrderStatus,
};

/// Replaces the header and lines of a PENDING order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdatePurchaseOrderCommand {
    pub purchase_order_id: Uuid,
    pub supplier_id: Uuid,
    pub warehouse_id: Option<Uuid>,
    pub order_date: Option<NaiveDate>,
    pub expected_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub tax_rate: Option<Decimal>,
    #[validate(length(min = 1, message = "A purchase order needs at least one line"))]
    #[validate]
    pub lines: Vec<PurchaseOrderLineInput>,
    pub user_id: Uuid,
}

#[async_trait]
impl Command for UpdatePurchaseOrderCommand {
    type Result = purchase_order::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(purchase_order_id = %self.purchase_order_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let totals = order_totals(&self.lines, self.tax_rate)?;
        let cmd = self.clone();

        let updated = db_pool
            .transaction::<_, purchase_order::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let order = load_order(txn, cmd.purchase_order_id).await?;
                    if order.status != PurchaseOrderStatus::Pending {
                        return Err(ServiceError::InvalidOperation(format!(
                            "Purchase order {} is {}; only PENDING orders can be modified",
                            order.number, order.status
                        )));
                    }

                    ensure_no_pending_receptions(txn, &order).await?;
                    check_order(txn, cmd.supplier_id, cmd.warehouse_id, &cmd.lines).await?;

                    purchase_order_line::Entity::delete_many()
                        .filter(purchase_order_line::Column::PurchaseOrderId.eq(order.id))
                        .exec(txn)
                        .await?;
                    insert_order_lines(txn, order.id, &cmd.lines).await?;

                    let order_date = cmd.order_date.unwrap_or(order.order_date);
                    let mut active: purchase_order::ActiveModel = order.into();
                    active.supplier_id = Set(cmd.supplier_id);
                    active.warehouse_id = Set(cmd.warehouse_id);
                    active.order_date = Set(order_date);
                    active.expected_date = Set(cmd.expected_date);
                    active.notes = Set(cmd.notes.clone());
                    active.subtotal = Set(totals.subtotal);
                    active.tax = Set(totals.tax);
                    active.total = Set(totals.total);
                    Ok(active.update(txn).await?)
                })
            })
            .await
            .map_err(flatten_txn_error)?;

        info!(purchase_order_id = %updated.id, total = %updated.total, "Purchase order updated");

        event_sender
            .send(Event::RecordUpdated {
                entity: "purchase_order".to_string(),
                entity_id: updated.id,
                actor_id: self.user_id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }
}
