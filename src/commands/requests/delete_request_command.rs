use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use super::load_request;
use crate::{
    commands::Command,
    db::{flatten_txn_error, DbPool},
    entities::request,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
};

/// Soft-deletes a request that is still in its initial status.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeleteRequestCommand {
    pub request_id: Uuid,
    pub user_id: Uuid,
    /// Caller holds `requests:delete_any`.
    pub can_delete_any: bool,
}

#[async_trait]
impl Command for DeleteRequestCommand {
    type Result = ();

    #[instrument(skip(self, db_pool, event_sender), fields(request_id = %self.request_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let request_id = self.request_id;
        let user_id = self.user_id;
        let can_delete_any = self.can_delete_any;

        let result = db_pool
            .transaction::<_, request::Model, ServiceError>(|txn| {
                Box::pin(async move {
                    let request = load_request(txn, request_id).await?;

                    if request.requester_id != user_id && !can_delete_any {
                        return Err(ServiceError::Forbidden(
                            "Only the requester can delete this request".to_string(),
                        ));
                    }
                    if !request.status.is_initial() {
                        return Err(ServiceError::InvalidOperation(format!(
                            "Request {} is {}; only PENDING requests can be deleted",
                            request.number, request.status
                        )));
                    }

                    let mut active: request::ActiveModel = request.into();
                    active.deleted = Set(true);
                    Ok(active.update(txn).await?)
                })
            })
            .await
            .map_err(flatten_txn_error);

        let deleted = match result {
            Ok(deleted) => deleted,
            Err(e) => {
                metrics::record_failure("request", "delete", metrics::error_type(&e));
                return Err(e);
            }
        };

        metrics::record_transition("request", "delete");
        info!(request_id = %deleted.id, number = %deleted.number, "Request deleted");

        event_sender
            .send(Event::RequestDeleted {
                request_id: deleted.id,
                actor_id: user_id,
            })
            .await
            .map_err(|e| {
                error!("Failed to send request deleted event: {}", e);
                ServiceError::EventError(e)
            })
    }
}
