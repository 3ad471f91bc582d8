use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{fetch_page, PageRequest};
use crate::{db::DbPool, entities::audit_log, errors::ServiceError, PaginatedResponse};

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditFilter {
    pub entity: Option<String>,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<String>,
}

/// Read side of the audit trail written by the event processor.
#[derive(Clone)]
pub struct AuditService {
    db_pool: Arc<DbPool>,
}

impl AuditService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Newest entries first.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: AuditFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<audit_log::Model>, ServiceError> {
        let mut query = audit_log::Entity::find();
        if let Some(entity) = filter.entity.filter(|e| !e.trim().is_empty()) {
            query = query.filter(audit_log::Column::Entity.eq(entity.trim().to_string()));
        }
        if let Some(entity_id) = filter.entity_id {
            query = query.filter(audit_log::Column::EntityId.eq(entity_id));
        }
        if let Some(actor_id) = filter.actor_id {
            query = query.filter(audit_log::Column::ActorId.eq(actor_id));
        }
        if let Some(action) = filter.action.filter(|a| !a.trim().is_empty()) {
            query = query.filter(audit_log::Column::Action.eq(action.trim().to_string()));
        }

        let query = query
            .order_by_desc(audit_log::Column::CreatedAt)
            .order_by_desc(audit_log::Column::Id);
        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    /// Entries for one record, oldest first.
    #[instrument(skip(self))]
    pub async fn for_entity(
        &self,
        entity: &str,
        entity_id: Uuid,
    ) -> Result<Vec<audit_log::Model>, ServiceError> {
        Ok(audit_log::Entity::find()
            .filter(audit_log::Column::Entity.eq(entity))
            .filter(audit_log::Column::EntityId.eq(entity_id))
            .order_by_asc(audit_log::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await?)
    }
}
