use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::{load_details, load_request, load_request_type, record_history, LineQuantity};
use crate::{
    commands::Command,
    db::{flatten_txn_error, DbPool},
    entities::{request, request_detail},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::RequestStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApproveRequestCommand {
    pub request_id: Uuid,
    pub approver_id: Uuid,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Lines left out are approved for their full requested quantity.
    #[validate]
    pub lines: Vec<LineQuantity>,
}

#[async_trait]
impl Command for ApproveRequestCommand {
    type Result = request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;

        let approved = match self.approve_in_db(db_pool.as_ref()).await {
            Ok(approved) => approved,
            Err(e) => {
                warn!(error = %e, "Request approval refused");
                metrics::record_failure("request", "approve", metrics::error_type(&e));
                return Err(e);
            }
        };

        metrics::record_transition("request", "approve");
        info!(request_id = %approved.id, number = %approved.number, "Request approved");

        event_sender
            .send(Event::RequestApproved {
                request_id: approved.id,
                actor_id: self.approver_id,
            })
            .await
            .map_err(|e| {
                error!("Failed to send request approved event: {}", e);
                ServiceError::EventError(e)
            })?;

        Ok(approved)
    }
}

impl ApproveRequestCommand {
    async fn approve_in_db(&self, db: &DbPool) -> Result<request::Model, ServiceError> {
        let cmd = self.clone();

        db.transaction::<_, request::Model, ServiceError>(|txn| {
            Box::pin(async move {
                let request = load_request(txn, cmd.request_id).await?;

                if request.approver_id.is_some() || request.status == RequestStatus::Approved {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Request {} is already approved",
                        request.number
                    )));
                }
                if request.status.is_final() {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Request {} is {} and can no longer be approved",
                        request.number, request.status
                    )));
                }

                let request_type = load_request_type(txn, request.request_type_id).await?;
                if !request_type.requires_approval {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Requests of type {} do not require approval",
                        request_type.code
                    )));
                }

                let details = load_details(txn, request.id).await?;
                let decided = approved_quantities(&request.number, &details, &cmd.lines)?;

                for detail in details {
                    let quantity = decided
                        .get(&detail.id)
                        .copied()
                        .unwrap_or(detail.requested_quantity);
                    let mut active: request_detail::ActiveModel = detail.into();
                    active.approved_quantity = Set(quantity);
                    active.update(txn).await?;
                }

                let previous = request.status;
                let mut active: request::ActiveModel = request.into();
                active.status = Set(RequestStatus::Approved);
                active.approver_id = Set(Some(cmd.approver_id));
                active.approved_at = Set(Some(Utc::now()));
                active.approval_notes = Set(cmd.notes.clone());
                let approved = active.update(txn).await?;

                record_history(
                    txn,
                    approved.id,
                    Some(previous),
                    RequestStatus::Approved,
                    cmd.approver_id,
                    cmd.notes.clone(),
                )
                .await?;

                Ok(approved)
            })
        })
        .await
        .map_err(flatten_txn_error)
    }
}

/// Explicit approved quantities keyed by line, checked against what was requested.
fn approved_quantities(
    number: &str,
    details: &[request_detail::Model],
    lines: &[LineQuantity],
) -> Result<HashMap<Uuid, i32>, ServiceError> {
    let mut decided = HashMap::new();

    for line in lines {
        let detail = details
            .iter()
            .find(|d| d.id == line.detail_id)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Line {} does not belong to request {}",
                    line.detail_id, number
                ))
            })?;

        if line.quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Approved quantity cannot be negative".to_string(),
            ));
        }
        if line.quantity > detail.requested_quantity {
            return Err(ServiceError::ValidationError(format!(
                "Approved quantity {} exceeds requested quantity {} for line {}",
                line.quantity, detail.requested_quantity, detail.id
            )));
        }

        decided.insert(detail.id, line.quantity);
    }

    Ok(decided)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(requested: i32) -> request_detail::Model {
        request_detail::Model {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            article_id: Some(Uuid::new_v4()),
            asset_id: None,
            requested_quantity: requested,
            approved_quantity: 0,
            dispatched_quantity: 0,
            notes: None,
            deleted: false,
        }
    }

    #[test]
    fn over_approval_is_a_validation_error() {
        let details = vec![detail(5)];
        let lines = vec![LineQuantity {
            detail_id: details[0].id,
            quantity: 6,
        }];
        let err = approved_quantities("SOL-1", &details, &lines).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
        assert!(err.to_string().contains("exceeds requested quantity 5"));
    }

    #[test]
    fn partial_approval_is_kept_per_line() {
        let details = vec![detail(5), detail(2)];
        let lines = vec![LineQuantity {
            detail_id: details[0].id,
            quantity: 3,
        }];
        let decided = approved_quantities("SOL-1", &details, &lines).unwrap();
        assert_eq!(decided.get(&details[0].id), Some(&3));
        assert_eq!(decided.get(&details[1].id), None);
    }

    #[test]
    fn foreign_lines_are_refused() {
        let details = vec![detail(1)];
        let lines = vec![LineQuantity {
            detail_id: Uuid::new_v4(),
            quantity: 1,
        }];
        assert!(approved_quantities("SOL-1", &details, &lines).is_err());
    }
}
