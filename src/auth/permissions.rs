/*!
 * # Permissions
 *
 * Every grantable capability, as `module:action` codenames. The table is
 * upserted into `permissions` at startup so groups can reference it.
 */

/// Common permission string constants for compile-time safety
pub mod consts {
    // Accounts
    pub const USERS_READ: &str = "users:read";
    pub const USERS_MANAGE: &str = "users:manage";
    pub const GROUPS_MANAGE: &str = "groups:manage";
    pub const PERMISSIONS_READ: &str = "permissions:read";

    // Organisation
    pub const ORG_READ: &str = "org:read";
    pub const ORG_MANAGE: &str = "org:manage";

    // Catalogs
    pub const CATALOGS_READ: &str = "catalogs:read";
    pub const CATALOGS_MANAGE: &str = "catalogs:manage";

    // Warehouse
    pub const WAREHOUSE_READ: &str = "warehouse:read";
    pub const WAREHOUSE_MANAGE: &str = "warehouse:manage";
    pub const MOVEMENTS_CREATE: &str = "movements:create";
    pub const DELIVERIES_CREATE: &str = "deliveries:create";

    // Procurement
    pub const PROCUREMENT_READ: &str = "procurement:read";
    pub const SUPPLIERS_MANAGE: &str = "suppliers:manage";
    pub const PURCHASE_ORDERS_MANAGE: &str = "purchase_orders:manage";
    pub const RECEPTIONS_MANAGE: &str = "receptions:manage";
    pub const RECEPTIONS_CONFIRM: &str = "receptions:confirm";

    // Requests
    pub const REQUESTS_READ: &str = "requests:read";
    pub const REQUESTS_CREATE: &str = "requests:create";
    pub const REQUESTS_CHANGE_ANY: &str = "requests:change_any";
    pub const REQUESTS_DELETE_ANY: &str = "requests:delete_any";
    pub const REQUESTS_APPROVE: &str = "requests:approve";
    pub const REQUESTS_REJECT: &str = "requests:reject";
    pub const REQUESTS_DISPATCH: &str = "requests:dispatch";

    // Reports, import, audit
    pub const REPORTS_READ: &str = "reports:read";
    pub const IMPORT_RUN: &str = "import:run";
    pub const AUDIT_READ: &str = "audit:read";
}

/// `(codename, name, module)` for every known permission.
pub const ALL_PERMISSIONS: &[(&str, &str, &str)] = &[
    (consts::USERS_READ, "View users", "accounts"),
    (consts::USERS_MANAGE, "Create, edit and deactivate users", "accounts"),
    (consts::GROUPS_MANAGE, "Manage groups", "accounts"),
    (consts::PERMISSIONS_READ, "View permissions", "accounts"),
    (consts::ORG_READ, "View organisational units", "organization"),
    (consts::ORG_MANAGE, "Manage organisational units", "organization"),
    (consts::CATALOGS_READ, "View catalogs", "warehouse"),
    (consts::CATALOGS_MANAGE, "Manage catalogs", "warehouse"),
    (consts::WAREHOUSE_READ, "View warehouses, articles and movements", "warehouse"),
    (consts::WAREHOUSE_MANAGE, "Manage warehouses, articles and assets", "warehouse"),
    (consts::MOVEMENTS_CREATE, "Register stock movements", "warehouse"),
    (consts::DELIVERIES_CREATE, "Register deliveries", "warehouse"),
    (consts::PROCUREMENT_READ, "View procurement records", "procurement"),
    (consts::SUPPLIERS_MANAGE, "Manage suppliers", "procurement"),
    (consts::PURCHASE_ORDERS_MANAGE, "Manage purchase orders", "procurement"),
    (consts::RECEPTIONS_MANAGE, "Register receptions", "procurement"),
    (consts::RECEPTIONS_CONFIRM, "Confirm receptions", "procurement"),
    (consts::REQUESTS_READ, "View every request", "requests"),
    (consts::REQUESTS_CREATE, "Create and follow own requests", "requests"),
    (consts::REQUESTS_CHANGE_ANY, "Edit requests of other users", "requests"),
    (consts::REQUESTS_DELETE_ANY, "Delete requests of other users", "requests"),
    (consts::REQUESTS_APPROVE, "Approve requests", "requests"),
    (consts::REQUESTS_REJECT, "Reject requests", "requests"),
    (consts::REQUESTS_DISPATCH, "Dispatch requests", "requests"),
    (consts::REPORTS_READ, "View reports", "reports"),
    (consts::IMPORT_RUN, "Import catalogs from CSV", "import"),
    (consts::AUDIT_READ, "View audit log", "audit"),
];

/// Whether a granted permission covers the required one.
///
/// Supports exact matches, `module:*` and `*`.
pub fn permission_matches(granted: &str, required: &str) -> bool {
    if granted == required || granted == "*" {
        return true;
    }
    match granted.strip_suffix(":*") {
        Some(prefix) => required
            .split_once(':')
            .map(|(module, _)| module == prefix)
            .unwrap_or(false),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matching() {
        assert!(permission_matches("requests:approve", "requests:approve"));
        assert!(permission_matches("requests:*", "requests:dispatch"));
        assert!(permission_matches("*", "users:manage"));
        assert!(!permission_matches("requests:*", "reports:read"));
        assert!(!permission_matches("req:*", "requests:read"));
        assert!(!permission_matches("requests:read", "requests:approve"));
    }

    #[test]
    fn codenames_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for (codename, _, _) in ALL_PERMISSIONS {
            assert!(seen.insert(*codename), "duplicate {}", codename);
        }
    }
}
