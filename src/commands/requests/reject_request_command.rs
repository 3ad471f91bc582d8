use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::{load_request, record_history};
use crate::{
    commands::Command,
    db::{flatten_txn_error, DbPool},
    entities::request,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::RequestStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RejectRequestCommand {
    pub request_id: Uuid,
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 1000, message = "A rejection reason is required"))]
    pub reason: String,
}

#[async_trait]
impl Command for RejectRequestCommand {
    type Result = request::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let reason = self.reason.trim().to_string();
        if reason.is_empty() {
            return Err(ServiceError::ValidationError(
                "A rejection reason is required".to_string(),
            ));
        }

        let rejected = match self.reject_in_db(db_pool.as_ref(), reason.clone()).await {
            Ok(rejected) => rejected,
            Err(e) => {
                metrics::record_failure("request", "reject", metrics::error_type(&e));
                return Err(e);
            }
        };

        metrics::record_transition("request", "reject");
        info!(request_id = %rejected.id, number = %rejected.number, "Request rejected");

        event_sender
            .send(Event::RequestRejected {
                request_id: rejected.id,
                actor_id: self.user_id,
                reason,
            })
            .await
            .map_err(|e| {
                error!("Failed to send request rejected event: {}", e);
                ServiceError::EventError(e)
            })?;

        Ok(rejected)
    }
}

impl RejectRequestCommand {
    async fn reject_in_db(&self, db: &DbPool, reason: String) -> Result<request::Model, ServiceError> {
        let request_id = self.request_id;
        let user_id = self.user_id;

        db.transaction::<_, request::Model, ServiceError>(|txn| {
            Box::pin(async move {
                let request = load_request(txn, request_id).await?;

                if !request.status.can_transition_to(RequestStatus::Rejected) {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Request {} is already {} and cannot be rejected",
                        request.number, request.status
                    )));
                }

                let previous = request.status;
                let mut active: request::ActiveModel = request.into();
                active.status = Set(RequestStatus::Rejected);
                active.rejected_by = Set(Some(user_id));
                active.rejected_at = Set(Some(Utc::now()));
                active.rejection_reason = Set(Some(reason.clone()));
                let rejected = active.update(txn).await?;

                record_history(
                    txn,
                    rejected.id,
                    Some(previous),
                    RequestStatus::Rejected,
                    user_id,
                    Some(reason),
                )
                .await?;

                Ok(rejected)
            })
        })
        .await
        .map_err(flatten_txn_error)
    }
}
