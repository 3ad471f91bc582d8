pub mod accounts;
pub mod audit;
pub mod auth;
pub mod catalogs;
pub mod common;
pub mod import_export;
pub mod organization;
pub mod procurement;
pub mod reports;
pub mod requests;
pub mod warehouse;

use std::sync::Arc;

use crate::auth::AuthService;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    accounts::AccountService, audit::AuditService, catalogs::CatalogService,
    import_export::ImportService, organization::OrganizationService,
    procurement::ProcurementService, reports::ReportService, requests::RequestService,
    warehouse::WarehouseService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub accounts: Arc<AccountService>,
    pub organization: Arc<OrganizationService>,
    pub catalogs: Arc<CatalogService>,
    pub warehouse: Arc<WarehouseService>,
    pub procurement: Arc<ProcurementService>,
    pub requests: Arc<RequestService>,
    pub reports: Arc<ReportService>,
    pub import_export: Arc<ImportService>,
    pub audit: Arc<AuditService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth_service: Arc<AuthService>,
    ) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(
                db_pool.clone(),
                event_sender.clone(),
                auth_service,
            )),
            organization: Arc::new(OrganizationService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            catalogs: Arc::new(CatalogService::new(db_pool.clone(), event_sender.clone())),
            warehouse: Arc::new(WarehouseService::new(db_pool.clone(), event_sender.clone())),
            procurement: Arc::new(ProcurementService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            requests: Arc::new(RequestService::new(db_pool.clone(), event_sender.clone())),
            reports: Arc::new(ReportService::new(db_pool.clone())),
            import_export: Arc::new(ImportService::new(db_pool.clone(), event_sender)),
            audit: Arc::new(AuditService::new(db_pool)),
        }
    }
}
