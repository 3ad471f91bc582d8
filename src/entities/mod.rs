//! sea-orm entities, one module per table.

// Accounts
pub mod group;
pub mod group_permission;
pub mod permission;
pub mod user;
pub mod user_group;
pub mod user_permission;

// Organisation and catalogs
pub mod catalog_entry;
pub mod org_unit;

// Warehouse
pub mod article;
pub mod asset;
pub mod delivery;
pub mod delivery_line;
pub mod movement;
pub mod warehouse;

// Procurement
pub mod purchase_order;
pub mod purchase_order_line;
pub mod reception;
pub mod reception_line;
pub mod supplier;

// Requests
pub mod request;
pub mod request_detail;
pub mod request_history;

pub mod audit_log;
