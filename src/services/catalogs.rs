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
    entities::{article, asset, catalog_entry, movement, reception, request},
    errors::ServiceError,
    events::{Event, EventSender},
    models::CatalogKind,
    PaginatedResponse,
};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CatalogEntryRequest {
    #[validate(length(min = 1, max = 50, message = "Code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    /// Request types only.
    #[serde(default)]
    pub requires_approval: bool,
    /// Reception types only.
    #[serde(default)]
    pub requires_order: bool,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFilter {
    pub search: Option<String>,
    pub active: Option<bool>,
}

fn default_active() -> bool {
    true
}

/// Fields written by both the CRUD endpoints and the CSV importer.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CatalogFields {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub requires_approval: bool,
    pub requires_order: bool,
    pub active: bool,
}

impl From<&CatalogEntryRequest> for CatalogFields {
    fn from(payload: &CatalogEntryRequest) -> Self {
        Self {
            code: payload.code.trim().to_uppercase(),
            name: payload.name.trim().to_string(),
            description: payload
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            requires_approval: payload.requires_approval,
            requires_order: payload.requires_order,
            active: payload.active,
        }
    }
}

#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        kind: CatalogKind,
        filter: CatalogFilter,
        page: PageRequest,
    ) -> Result<PaginatedResponse<catalog_entry::Model>, ServiceError> {
        let mut query = catalog_entry::Entity::find()
            .filter(catalog_entry::Column::Kind.eq(kind))
            .filter(catalog_entry::Column::Deleted.eq(false))
            .order_by_asc(catalog_entry::Column::Code);

        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(catalog_entry::Column::Code.contains(term))
                    .add(catalog_entry::Column::Name.contains(term)),
            );
        }
        if let Some(active) = filter.active {
            query = query.filter(catalog_entry::Column::Active.eq(active));
        }

        fetch_page(self.db_pool.as_ref(), query, page).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, kind: CatalogKind, id: Uuid) -> Result<catalog_entry::Model, ServiceError> {
        find_entry(self.db_pool.as_ref(), kind, id).await
    }

    #[instrument(skip(self, payload), fields(code = %payload.code))]
    pub async fn create(
        &self,
        actor_id: Uuid,
        kind: CatalogKind,
        payload: CatalogEntryRequest,
    ) -> Result<catalog_entry::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();
        let fields = CatalogFields::from(&payload);

        let existing = find_by_code(db, kind, &fields.code).await?;
        if existing.as_ref().is_some_and(|e| !e.deleted) {
            return Err(ServiceError::Conflict(format!(
                "{} with code {} already exists",
                kind.label(),
                fields.code
            )));
        }
        let (saved, _) = upsert_by_code(db, kind, fields).await?;

        info!(entry_id = %saved.id, catalog = %kind, "Catalog entry created");
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
        kind: CatalogKind,
        id: Uuid,
        payload: CatalogEntryRequest,
    ) -> Result<catalog_entry::Model, ServiceError> {
        payload.validate()?;
        let db = self.db_pool.as_ref();
        let found = find_entry(db, kind, id).await?;
        let fields = CatalogFields::from(&payload);

        if fields.code != found.code {
            if let Some(other) = find_by_code(db, kind, &fields.code).await? {
                return Err(ServiceError::Conflict(format!(
                    "{} with code {} already exists",
                    kind.label(),
                    other.code
                )));
            }
        }

        let mut active: catalog_entry::ActiveModel = found.into();
        apply_fields(&mut active, fields);
        let updated = active.update(db).await?;

        self.send(Event::RecordUpdated {
            entity: kind.slug().to_string(),
            entity_id: id,
            actor_id,
        })
        .await?;
        Ok(updated)
    }

    /// Soft delete, refused while live records use the entry.
    #[instrument(skip(self))]
    pub async fn delete(&self, actor_id: Uuid, kind: CatalogKind, id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let found = find_entry(db, kind, id).await?;

        let references = count_references(db, kind, id).await?;
        if references > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "{} {} is used by {} record(s) and cannot be deleted",
                kind.label(),
                found.code,
                references
            )));
        }

        let mut active: catalog_entry::ActiveModel = found.into();
        active.deleted = Set(true);
        active.active = Set(false);
        active.update(db).await?;

        info!(entry_id = %id, catalog = %kind, "Catalog entry deleted");
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

pub(crate) async fn find_entry<C: ConnectionTrait>(
    db: &C,
    kind: CatalogKind,
    id: Uuid,
) -> Result<catalog_entry::Model, ServiceError> {
    catalog_entry::Entity::find_by_id(id)
        .filter(catalog_entry::Column::Kind.eq(kind))
        .filter(catalog_entry::Column::Deleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::not_found(kind.label(), id))
}

/// Optional catalog reference that must point at a live entry of `kind`.
pub(crate) async fn ensure_entry<C: ConnectionTrait>(
    db: &C,
    kind: CatalogKind,
    id: Option<Uuid>,
) -> Result<(), ServiceError> {
    if let Some(id) = id {
        find_entry(db, kind, id).await?;
    }
    Ok(())
}

/// Looks up by code including soft-deleted rows; codes are unique per kind.
async fn find_by_code<C: ConnectionTrait>(
    db: &C,
    kind: CatalogKind,
    code: &str,
) -> Result<Option<catalog_entry::Model>, ServiceError> {
    Ok(catalog_entry::Entity::find()
        .filter(catalog_entry::Column::Kind.eq(kind))
        .filter(catalog_entry::Column::Code.eq(code))
        .one(db)
        .await?)
}

fn apply_fields(active: &mut catalog_entry::ActiveModel, fields: CatalogFields) {
    active.code = Set(fields.code);
    active.name = Set(fields.name);
    active.description = Set(fields.description);
    active.requires_approval = Set(fields.requires_approval);
    active.requires_order = Set(fields.requires_order);
    active.active = Set(fields.active);
    active.deleted = Set(false);
}

/// Inserts or overwrites the entry with `fields.code`; returns whether it was created.
pub(crate) async fn upsert_by_code<C: ConnectionTrait>(
    db: &C,
    kind: CatalogKind,
    fields: CatalogFields,
) -> Result<(catalog_entry::Model, bool), ServiceError> {
    match find_by_code(db, kind, &fields.code).await? {
        Some(found) => {
            let mut active: catalog_entry::ActiveModel = found.into();
            apply_fields(&mut active, fields);
            Ok((active.update(db).await?, false))
        }
        None => {
            let mut active = catalog_entry::ActiveModel {
                id: Set(Uuid::new_v4()),
                kind: Set(kind),
                ..Default::default()
            };
            apply_fields(&mut active, fields);
            Ok((active.insert(db).await?, true))
        }
    }
}

async fn count_references<C: ConnectionTrait>(
    db: &C,
    kind: CatalogKind,
    id: Uuid,
) -> Result<u64, ServiceError> {
    let count = match kind {
        CatalogKind::Category => {
            let articles = article::Entity::find()
                .filter(article::Column::CategoryId.eq(id))
                .filter(article::Column::Deleted.eq(false))
                .count(db)
                .await?;
            let assets = asset::Entity::find()
                .filter(asset::Column::CategoryId.eq(id))
                .filter(asset::Column::Deleted.eq(false))
                .count(db)
                .await?;
            articles + assets
        }
        CatalogKind::UnitOfMeasure => {
            article::Entity::find()
                .filter(article::Column::UnitId.eq(id))
                .filter(article::Column::Deleted.eq(false))
                .count(db)
                .await?
        }
        CatalogKind::Brand => {
            article::Entity::find()
                .filter(article::Column::BrandId.eq(id))
                .filter(article::Column::Deleted.eq(false))
                .count(db)
                .await?
        }
        CatalogKind::MovementType => {
            movement::Entity::find()
                .filter(movement::Column::MovementTypeId.eq(id))
                .count(db)
                .await?
        }
        CatalogKind::RequestType => {
            request::Entity::find()
                .filter(request::Column::RequestTypeId.eq(id))
                .filter(request::Column::Deleted.eq(false))
                .count(db)
                .await?
        }
        CatalogKind::ReceptionType => {
            reception::Entity::find()
                .filter(reception::Column::ReceptionTypeId.eq(id))
                .count(db)
                .await?
        }
    };
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_fields_are_normalised() {
        let payload = CatalogEntryRequest {
            code: " tools ".into(),
            name: " Hand tools ".into(),
            description: Some("   ".into()),
            requires_approval: false,
            requires_order: false,
            active: true,
        };
        let fields = CatalogFields::from(&payload);
        assert_eq!(fields.code, "TOOLS");
        assert_eq!(fields.name, "Hand tools");
        assert_eq!(fields.description, None);
    }
}
