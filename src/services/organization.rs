use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{fetch_page, PageRequest};
use crate::{
    db::DbPool,
    entities::{delivery, org_unit, request, user, warehouse},
    errors::ServiceError,
    events::{Event, EventSender},
    models::OrgUnitKind,
    PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct OrgUnitRequest {
    #[validate(length(min = 1, max = 50, message = "Code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub responsible_id: Option<Uuid>,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrgUnitFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
}

fn default_active() -> bool {
    true
}

/// Locations, workshops, areas and departments.
#[derive(Clone)]
pub struct OrganizationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl OrganizationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        kind: OrgUnitKind,
        filter: OrgUnitFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<org_unit::Model>, ServiceError> {
        let mut query = org_unit::Entity::find()
            .filter(org_unit::Column::Kind.eq(kind))
            .filter(org_unit::Column::Deleted.eq(false))
            .order_by_asc(org_unit::Column::Code);

        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(org_unit::Column::Code.contains(term))
                    .add(org_unit::Column::Name.contains(term)),
            );
        }
        if let Some(active) = filter.active {
            query = query.filter(org_unit::Column::Active.eq(active));
        }

        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, kind: OrgUnitKind, id: Uuid) -> Result<org_unit::Model, ServiceError> {
        find_unit(self.db_pool.as_ref(), kind, id).await
    }

    /// Re-creating a code that was soft-deleted revives the old row.
    #[instrument(skip(self, payload), fields(code = %payload.code))]
    pub async fn create(
        &self,
        actor_id: Uuid,
        kind: OrgUnitKind,
        payload: OrgUnitRequest,
    ) -> Result<org_unit::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();
        ensure_user(db, payload.responsible_id).await?;

        let code = payload.code.trim().to_uppercase();
        let existing = org_unit::Entity::find()
            .filter(org_unit::Column::Kind.eq(kind))
            .filter(org_unit::Column::Code.eq(code.as_str()))
            .one(db)
            .await?;

        let saved = match existing {
            Some(found) if !found.deleted => {
                return Err(ServiceError::Conflict(format!(
                    "{} with code {} already exists",
                    label(kind),
                    code
                )))
            }
            Some(found) => {
                let mut active: org_unit::ActiveModel = found.into();
                active.name = Set(payload.name.trim().to_string());
                active.description = Set(payload.description.clone());
                active.responsible_id = Set(payload.responsible_id);
                active.active = Set(payload.active);
                active.deleted = Set(false);
                active.update(db).await?
            }
            None => {
                org_unit::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    kind: Set(kind),
                    code: Set(code),
                    name: Set(payload.name.trim().to_string()),
                    description: Set(payload.description.clone()),
                    responsible_id: Set(payload.responsible_id),
                    active: Set(payload.active),
                    deleted: Set(false),
                    ..Default::default()
                }
                .insert(db)
                .await?
            }
        };

        info!(org_unit_id = %saved.id, kind = %kind.slug(), "Organisational unit saved");
        self.send(Event::RecordCreated {
            entity: kind.slug().to_string(),
            entity_id: saved.id,
            actor_id,
        })
        .await?;
        Ok(saved)
    }

    #[instrument(skip(self, payload))]
    pub async fn update(
        &self,
        actor_id: Uuid,
        kind: OrgUnitKind,
        id: Uuid,
        payload: OrgUnitRequest,
    ) -> Result<org_unit::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();
        let found = find_unit(db, kind, id).await?;
        ensure_user(db, payload.responsible_id).await?;

        let code = payload.code.trim().to_uppercase();
        if code != found.code {
            let taken = org_unit::Entity::find()
                .filter(org_unit::Column::Kind.eq(kind))
                .filter(org_unit::Column::Code.eq(code.as_str()))
                .filter(org_unit::Column::Id.ne(id))
                .count(db)
                .await?;
            if taken > 0 {
                return Err(ServiceError::Conflict(format!(
                    "{} with code {} already exists",
                    label(kind),
                    code
                )));
            }
        }

        let mut active: org_unit::ActiveModel = found.into();
        active.code = Set(code);
        active.name = Set(payload.name.trim().to_string());
        active.description = Set(payload.description.clone());
        active.responsible_id = Set(payload.responsible_id);
        active.active = Set(payload.active);
        let updated = active.update(db).await?;

        self.send(Event::RecordUpdated {
            entity: kind.slug().to_string(),
            entity_id: id,
            actor_id,
        })
        .await?;
        Ok(updated)
    }

    /// Soft delete, refused while active records still point at the unit.
    #[instrument(skip(self))]
    pub async fn delete(&self, actor_id: Uuid, kind: OrgUnitKind, id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let found = find_unit(db, kind, id).await?;

        let references = count_references(db, kind, id).await?;
        if references > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "{} {} is still referenced by {} record(s)",
                label(kind),
                found.code,
                references
            )));
        }

        let mut active: org_unit::ActiveModel = found.into();
        active.deleted = Set(true);
        active.active = Set(false);
        active.update(db).await?;

        info!(org_unit_id = %id, "Organisational unit deleted");
        self.send(Event::RecordDeleted {
            entity: kind.slug().to_string(),
            entity_id: id,
            actor_id,
        })
        .await
    }

    async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)
    }
}

fn label(kind: OrgUnitKind) -> &'static str {
    match kind {
        OrgUnitKind::Location => "Location",
        OrgUnitKind::Workshop => "Workshop",
        OrgUnitKind::Area => "Area",
        OrgUnitKind::Department => "Department",
    }
}

async fn find_unit<C: ConnectionTrait>(
    db: &C,
    kind: OrgUnitKind,
    id: Uuid,
) -> Result<org_unit::Model, ServiceError> {
    org_unit::Entity::find_by_id(id)
        .filter(org_unit::Column::Kind.eq(kind))
        .filter(org_unit::Column::Deleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found(label(kind), id))
}

async fn ensure_user<C: ConnectionTrait>(db: &C, user_id: Option<Uuid>) -> Result<(), ServiceError> {
    if let Some(id) = user_id {
        user::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))?;
    }
    Ok(())
}

async fn count_references<C: ConnectionTrait>(
    db: &C,
    kind: OrgUnitKind,
    id: Uuid,
) -> Result<u64, ServiceError> {
    let count = match kind {
        OrgUnitKind::Location => {
            warehouse::Entity::find()
                .filter(warehouse::Column::LocationId.eq(id))
                .filter(warehouse::Column::Deleted.eq(false))
                .count(db)
                .await?
        }
        OrgUnitKind::Department => {
            let requests = request::Entity::find()
                .filter(request::Column::DepartmentId.eq(id))
                .filter(request::Column::Deleted.eq(false))
                .count(db)
                .await?;
            let deliveries = delivery::Entity::find()
                .filter(delivery::Column::DepartmentId.eq(id))
                .count(db)
                .await?;
            requests + deliveries
        }
        OrgUnitKind::Area => {
            request::Entity::find()
                .filter(request::Column::AreaId.eq(id))
                .filter(request::Column::Deleted.eq(false))
                .count(db)
                .await?
        }
        OrgUnitKind::Workshop => 0,
    };
    Ok(count)
}
