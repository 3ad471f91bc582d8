//! Typed enums shared by entities, services and handlers.

pub mod kinds;
pub mod status;

pub use kinds::{CatalogKind, ItemKind, OrgUnitKind};
pub use status::{MovementOperation, PurchaseOrderStatus, ReceptionStatus, RequestStatus};
