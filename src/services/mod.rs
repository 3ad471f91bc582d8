//! Business services used by the HTTP handlers.
//!
//! Multi-step workflow mutations are delegated to [`crate::commands`]; services own the
//! reference-data CRUD and the read side.

pub mod accounts;
pub mod audit;
pub mod catalogs;
pub mod import_export;
pub mod organization;
pub mod procurement;
pub mod reports;
pub mod requests;
pub mod warehouse;

use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Select};

use crate::{errors::ServiceError, PaginatedResponse};

/// Page number (1-based) and page size of a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// Runs `query` as one page and counts the full result.
pub(crate) async fn fetch_page<'db, C, E>(
    db: &'db C,
    query: Select<E>,
    page: PageRequest,
) -> Result<PaginatedResponse<E::Model>, ServiceError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Sync + 'db,
{
    let paginator = query.paginate(db, page.limit);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.page - 1).await?;
    Ok(PaginatedResponse::new(items, total, page.page, page.limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_is_never_zero() {
        assert_eq!(PageRequest::new(0, 0), PageRequest { page: 1, limit: 1 });
    }
}
