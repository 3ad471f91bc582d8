use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::{load_order, load_order_lines};
use crate::{
    commands::{
        warehouse::{apply_movement, MovementInput},
        Command,
    },
    db::{flatten_txn_error, DbPool},
    entities::{purchase_order, purchase_order_line, reception, reception_line},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::{MovementOperation, PurchaseOrderStatus, ReceptionStatus},
};

/// Books a PENDING reception: stock entries, order received quantities, order status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmReceptionCommand {
    pub reception_id: Uuid,
    pub user_id: Uuid,
}

#[async_trait]
impl Command for ConfirmReceptionCommand {
    type Result = reception::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(reception_id = %self.reception_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let cmd = self.clone();

        let confirmed = db_pool
            .transaction::<_, reception::Model, ServiceError>(|txn| {
                Box::pin(async move { cmd.confirm_in_txn(txn).await })
            })
            .await
            .map_err(flatten_txn_error)
            .map_err(|e| {
                metrics::record_failure("reception", "confirm", metrics::error_type(&e));
                e
            })?;

        metrics::record_transition("reception", "confirm");
        info!(reception_id = %confirmed.id, number = %confirmed.number, "Reception confirmed");

        event_sender
            .send(Event::ReceptionConfirmed {
                reception_id: confirmed.id,
                actor_id: self.user_id,
            })
            .await
            .map_err(|e| {
                error!("Failed to send reception confirmed event: {}", e);
                ServiceError::EventError(e)
            })?;

        Ok(confirmed)
    }
}

impl ConfirmReceptionCommand {
    async fn confirm_in_txn<C: ConnectionTrait>(&self, txn: &C) -> Result<reception::Model, ServiceError> {
        let found = reception::Entity::find_by_id(self.reception_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Reception", self.reception_id))?;

        if found.status != ReceptionStatus::Pending {
            return Err(ServiceError::InvalidOperation(format!(
                "Reception {} is {} and cannot be confirmed",
                found.number, found.status
            )));
        }

        let order = match found.purchase_order_id {
            Some(order_id) => {
                let order = load_order(txn, order_id).await?;
                if !order.status.is_open() {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Purchase order {} is {} and cannot receive goods",
                        order.number, order.status
                    )));
                }
                Some(order)
            }
            None => None,
        };

        let lines = reception_line::Entity::find()
            .filter(reception_line::Column::ReceptionId.eq(found.id))
            .all(txn)
            .await?;

        for line in &lines {
            if let Some(article_id) = line.article_id {
                apply_movement(
                    txn,
                    MovementInput {
                        article_id,
                        operation: MovementOperation::Entry,
                        quantity: line.quantity,
                        movement_type_id: None,
                        reason: Some(format!("Reception {}", found.number)),
                        reference_kind: Some("reception"),
                        reference_id: Some(found.id),
                        user_id: self.user_id,
                    },
                )
                .await?;
            }

            if let Some(order_line_id) = line.purchase_order_line_id {
                let order_line = purchase_order_line::Entity::find_by_id(order_line_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("Purchase order line", order_line_id))?;

                let received = order_line.received_quantity + line.quantity;
                if received > order_line.quantity {
                    return Err(ServiceError::ValidationError(format!(
                        "Receiving {} would exceed the ordered quantity {} for order line {}",
                        line.quantity, order_line.quantity, order_line.id
                    )));
                }

                let mut active: purchase_order_line::ActiveModel = order_line.into();
                active.received_quantity = Set(received);
                active.update(txn).await?;
            }
        }

        if let Some(order) = order {
            let order_lines = load_order_lines(txn, order.id).await?;
            let status = order_status_after_reception(&order_lines);
            let mut active: purchase_order::ActiveModel = order.into();
            active.status = Set(status);
            active.update(txn).await?;
        }

        let mut active: reception::ActiveModel = found.into();
        active.status = Set(ReceptionStatus::Confirmed);
        active.confirmed_at = Set(Some(Utc::now()));
        Ok(active.update(txn).await?)
    }
}

pub(crate) fn order_status_after_reception(lines: &[purchase_order_line::Model]) -> PurchaseOrderStatus {
    if lines.iter().all(|l| l.received_quantity >= l.quantity) {
        PurchaseOrderStatus::Received
    } else {
        PurchaseOrderStatus::PartiallyReceived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn line(quantity: i32, received: i32) -> purchase_order_line::Model {
        purchase_order_line::Model {
            id: Uuid::new_v4(),
            purchase_order_id: Uuid::new_v4(),
            article_id: Some(Uuid::new_v4()),
            asset_id: None,
            description: None,
            quantity,
            unit_price: Decimal::ONE,
            subtotal: Decimal::from(quantity),
            received_quantity: received,
        }
    }

    #[test]
    fn order_is_received_only_when_every_line_is_complete() {
        assert_eq!(
            order_status_after_reception(&[line(5, 5), line(2, 2)]),
            PurchaseOrderStatus::Received
        );
        assert_eq!(
            order_status_after_reception(&[line(5, 5), line(2, 1)]),
            PurchaseOrderStatus::PartiallyReceived
        );
    }
}
