use async_trait::async_trait;
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::{ensure_dispatchable_request, load_details, mark_dispatched, DispatchedLine, LineQuantity};
use crate::{
    commands::{
        warehouse::{
            create_delivery_command::{insert_delivery, DeliveryDraft},
            DeliveryLineInput,
        },
        Command,
    },
    db::{flatten_txn_error, DbPool},
    entities::{delivery, request, request_detail},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DispatchRequestCommand {
    pub request_id: Uuid,
    pub dispatcher_id: Uuid,
    /// Defaults to the requester.
    pub received_by: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Lines left out are dispatched for their remaining approved quantity.
    #[validate]
    pub lines: Vec<LineQuantity>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchRequestResult {
    pub request: request::Model,
    pub delivery: delivery::Model,
}

#[async_trait]
impl Command for DispatchRequestCommand {
    type Result = DispatchRequestResult;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let result = match self.dispatch_in_db(db_pool.as_ref()).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Request dispatch refused");
                metrics::record_failure("request", "dispatch", metrics::error_type(&e));
                return Err(e);
            }
        };

        metrics::record_transition("request", "dispatch");
        info!(
            request_id = %result.request.id,
            delivery = %result.delivery.number,
            "Request dispatched"
        );

        event_sender
            .send(Event::DeliveryCreated {
                delivery_id: result.delivery.id,
                actor_id: self.dispatcher_id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        event_sender
            .send(Event::RequestDispatched {
                request_id: result.request.id,
                delivery_id: result.delivery.id,
                actor_id: self.dispatcher_id,
            })
            .await
            .map_err(|e| {
                error!("Failed to send request dispatched event: {}", e);
                ServiceError::EventError(e)
            })?;

        Ok(result)
    }
}

impl DispatchRequestCommand {
    async fn dispatch_in_db(&self, db: &DbPool) -> Result<DispatchRequestResult, ServiceError> {
        let cmd = self.clone();

        db.transaction::<_, DispatchRequestResult, ServiceError>(|txn| {
            Box::pin(async move {
                let request = ensure_dispatchable_request(txn, cmd.request_id).await?;
                let details = load_details(txn, request.id).await?;
                let lines = dispatch_lines(&request.number, &details, &cmd.lines)?;

                if lines.is_empty() {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Request {} has nothing left to dispatch",
                        request.number
                    )));
                }

                let delivery_lines: Vec<DeliveryLineInput> = lines
                    .iter()
                    .map(|line| DeliveryLineInput {
                        article_id: line.article_id,
                        asset_id: line.asset_id,
                        quantity: line.quantity,
                        request_detail_id: Some(line.detail_id),
                        notes: None,
                    })
                    .collect();

                let draft = DeliveryDraft {
                    kind: request.kind,
                    warehouse_id: request.warehouse_id,
                    delivered_by: cmd.dispatcher_id,
                    received_by: cmd.received_by.or(Some(request.requester_id)),
                    reason: format!("Dispatch of request {}", request.number),
                    department_id: request.department_id,
                    notes: cmd.notes.clone(),
                    request_id: Some(request.id),
                };
                let delivery = insert_delivery(txn, draft, &delivery_lines).await?;

                let request =
                    mark_dispatched(txn, request, &lines, cmd.dispatcher_id, cmd.notes.clone())
                        .await?;

                Ok(DispatchRequestResult { request, delivery })
            })
        })
        .await
        .map_err(flatten_txn_error)
    }
}

/// Quantity to deliver per line; zero-quantity lines are left out.
fn dispatch_lines(
    number: &str,
    details: &[request_detail::Model],
    explicit: &[LineQuantity],
) -> Result<Vec<DispatchedLine>, ServiceError> {
    let mut chosen: HashMap<Uuid, i32> = HashMap::new();
    for line in explicit {
        if !details.iter().any(|d| d.id == line.detail_id) {
            return Err(ServiceError::ValidationError(format!(
                "Line {} does not belong to request {}",
                line.detail_id, number
            )));
        }
        chosen.insert(line.detail_id, line.quantity);
    }

    let mut lines = Vec::new();
    for detail in details {
        let remaining = detail.approved_quantity - detail.dispatched_quantity;
        let quantity = chosen.get(&detail.id).copied().unwrap_or(remaining);

        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Dispatched quantity cannot be negative".to_string(),
            ));
        }
        if quantity > remaining {
            return Err(ServiceError::ValidationError(format!(
                "Dispatching {} would exceed the approved quantity {} for line {}",
                quantity, detail.approved_quantity, detail.id
            )));
        }
        if quantity == 0 {
            continue;
        }

        lines.push(DispatchedLine {
            detail_id: detail.id,
            article_id: detail.article_id,
            asset_id: detail.asset_id,
            quantity,
        });
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(requested: i32, approved: i32, dispatched: i32) -> request_detail::Model {
        request_detail::Model {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            article_id: Some(Uuid::new_v4()),
            asset_id: None,
            requested_quantity: requested,
            approved_quantity: approved,
            dispatched_quantity: dispatched,
            notes: None,
            deleted: false,
        }
    }

    #[test]
    fn omitted_lines_take_the_remaining_quantity() {
        let details = vec![detail(5, 4, 1), detail(3, 0, 0)];
        let lines = dispatch_lines("SOL-1", &details, &[]).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].detail_id, details[0].id);
        assert_eq!(lines[0].quantity, 3);
    }

    #[test]
    fn dispatch_beyond_approved_is_refused() {
        let details = vec![detail(5, 4, 0)];
        let explicit = vec![LineQuantity {
            detail_id: details[0].id,
            quantity: 5,
        }];
        let err = dispatch_lines("SOL-1", &details, &explicit).unwrap_err();
        assert!(err.to_string().contains("exceed the approved quantity 4"));
    }
}
