use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{check_order, insert_order_lines, order_totals, PurchaseOrderLineInput};
use crate::{
    commands::Command,
    common::next_document_number,
    db::{flatten_txn_error, DbPool},
    entities::purchase_order,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::PurchaseOrderStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseOrderCommand {
    pub supplier_id: Uuid,
    pub warehouse_id: Option<Uuid>,
    /// Defaults to today.
    pub order_date: Option<NaiveDate>,
    pub expected_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Percentage applied to the subtotal.
    pub tax_rate: Option<Decimal>,
    #[validate(length(min = 1, message = "A purchase order needs at least one line"))]
    #[validate]
    pub lines: Vec<PurchaseOrderLineInput>,
    pub created_by: Uuid,
}

#[async_trait]
impl Command for CreatePurchaseOrderCommand {
    type Result = purchase_order::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(supplier_id = %self.supplier_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let totals = order_totals(&self.lines, self.tax_rate)?;
        let cmd = self.clone();

        let created = db_pool
            .transaction::<_, purchase_order::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    check_order(txn, cmd.supplier_id, cmd.warehouse_id, &cmd.lines).await?;

                    let today = Utc::now().date_naive();
                    let number = next_document_number::<purchase_order::Entity, _>(
                        txn,
                        purchase_order::Column::Number,
                        "OC",
                        today,
                    )
                    .await?;

                    let order = purchase_order::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        number: Set(number),
                        supplier_id: Set(cmd.supplier_id),
                        warehouse_id: Set(cmd.warehouse_id),
                        status: Set(PurchaseOrderStatus::Pending),
                        order_date: Set(cmd.order_date.unwrap_or(today)),
                        expected_date: Set(cmd.expected_date),
                        notes: Set(cmd.notes.clone()),
                        subtotal: Set(totals.subtotal),
                        tax: Set(totals.tax),
                        total: Set(totals.total),
                        created_by: Set(cmd.created_by),
                        deleted: Set(false),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    insert_order_lines(txn, order.id, &cmd.lines).await?;
                    Ok(order)
                })
            })
            .await
            .map_err(flatten_txn_error)
            .map_err(|e| {
                metrics::record_failure("purchase_order", "create", metrics::error_type(&e));
                e
            })?;

        metrics::record_transition("purchase_order", "create");
        info!(purchase_order_id = %created.id, number = %created.number, total = %created.total, "Purchase order created");

        event_sender
            .send(Event::RecordCreated {
                entity: "purchase_order".to_string(),
                entity_id: created.id,
                actor_id: self.created_by,
            })
            .await
            .map_err(|e| {
                error!("Failed to send purchase order event: {}", e);
                ServiceError::EventError(e)
            })?;

        Ok(created)
    }
}
