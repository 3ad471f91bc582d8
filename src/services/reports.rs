use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Query, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    requests::request_summary,
    warehouse::{movement_query, total_stock, MovementFilter},
};
use crate::{
    common::DateRangeParams,
    db::DbPool,
    entities::{
        article, catalog_entry, delivery, movement, purchase_order, reception, supplier, user,
        warehouse,
    },
    errors::ServiceError,
    models::{CatalogKind, ItemKind, MovementOperation, PurchaseOrderStatus},
};

/// Dashboard scope; anything unrecognised shows every module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportModule {
    Warehouse,
    Procurement,
    Requests,
    All,
}

impl ReportModule {
    fn includes(&self, other: ReportModule) -> bool {
        *self == ReportModule::All || *self == other
    }
}

impl FromStr for ReportModule {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "warehouse" => ReportModule::Warehouse,
            "procurement" => ReportModule::Procurement,
            "requests" => ReportModule::Requests,
            _ => ReportModule::All,
        })
    }
}

impl fmt::Display for ReportModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReportModule::Warehouse => "warehouse",
            ReportModule::Procurement => "procurement",
            ReportModule::Requests => "requests",
            ReportModule::All => "all",
        })
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WarehouseStats {
    pub total_articles: u64,
    pub total_categories: u64,
    pub total_movements: u64,
    pub total_warehouses: u64,
    pub total_stock: i64,
    pub article_deliveries: u64,
    pub asset_deliveries: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProcurementStats {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub article_receptions: u64,
    pub asset_receptions: u64,
    pub total_suppliers: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestStats {
    pub total: u64,
    pub pending: u64,
    pub asset: u64,
    pub article: u64,
    pub mine: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Dashboard {
    pub module: ReportModule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<WarehouseStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procurement: Option<ProcurementStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<RequestStats>,
}

/// One dashboard counter as exported.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardRow {
    pub module: String,
    pub metric: String,
    pub value: i64,
}

impl Dashboard {
    /// Every counter as a `(module, metric, value)` row.
    pub fn rows(&self) -> Vec<DashboardRow> {
        let sections = [
            ("warehouse", self.warehouse.as_ref().map(serde_json::to_value)),
            ("procurement", self.procurement.as_ref().map(serde_json::to_value)),
            ("requests", self.requests.as_ref().map(serde_json::to_value)),
        ];

        let mut rows = Vec::new();
        for (module, section) in sections {
            let Some(Ok(serde_json::Value::Object(fields))) = section else {
                continue;
            };
            for (metric, value) in fields {
                rows.push(DashboardRow {
                    module: module.to_string(),
                    metric,
                    value: value.as_i64().unwrap_or_default(),
                });
            }
        }
        rows
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementReportParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub operation: Option<MovementOperation>,
    pub article_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
}

/// One movement as exported.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MovementRow {
    pub date: DateTime<Utc>,
    pub article_code: String,
    pub article_name: String,
    pub operation: MovementOperation,
    pub movement_type: String,
    pub quantity: i32,
    pub stock_before: i32,
    pub stock_after: i32,
    pub reason: String,
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MovementTypeStat {
    pub movement_type: String,
    pub total: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MovementReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub rows: Vec<MovementRow>,
    /// Counts per movement type, largest first.
    pub stats: Vec<MovementTypeStat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdleArticleParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub warehouse_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IdleArticleRow {
    pub code: String,
    pub name: String,
    pub category: String,
    pub warehouse: String,
    pub stock: i32,
    pub min_stock: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IdleArticleReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub rows: Vec<IdleArticleRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LateOrderParams {
    pub supplier_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LateOrderRow {
    pub supplier: String,
    pub number: String,
    pub status: PurchaseOrderStatus,
    pub order_date: NaiveDate,
    pub expected_date: NaiveDate,
    pub days_late: i64,
    #[schema(value_type = String)]
    pub total: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SupplierLateOrders {
    pub supplier_id: Uuid,
    pub supplier: String,
    pub count: usize,
    pub orders: Vec<LateOrderRow>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LateOrderReport {
    pub today: NaiveDate,
    pub total: usize,
    pub suppliers: Vec<SupplierLateOrders>,
}

impl LateOrderReport {
    /// Flattened rows for export.
    pub fn rows(&self) -> Vec<LateOrderRow> {
        self.suppliers
            .iter()
            .flat_map(|group| group.orders.iter().cloned())
            .collect()
    }
}

#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, module: ReportModule, user_id: Uuid) -> Result<Dashboard, ServiceError> {
        let db = self.db_pool.as_ref();
        let mut dashboard = Dashboard {
            module,
            warehouse: None,
            procurement: None,
            requests: None,
        };

        if module.includes(ReportModule::Warehouse) {
            dashboard.warehouse = Some(warehouse_stats(db).await?);
        }
        if module.includes(ReportModule::Procurement) {
            dashboard.procurement = Some(procurement_stats(db).await?);
        }
        if module.includes(ReportModule::Requests) {
            let summary = request_summary(db, user_id).await?;
            dashboard.requests = Some(RequestStats {
                total: summary.total,
                pending: summary.pending,
                asset: summary.asset,
                article: summary.article,
                mine: summary.mine,
            });
        }

        Ok(dashboard)
    }

    /// Movements in the window, defaulting to the last thirty days.
    #[instrument(skip(self))]
    pub async fn movements(&self, params: MovementReportParams) -> Result<MovementReport, ServiceError> {
        let db = self.db_pool.as_ref();
        let (from, to) = DateRangeParams::new(params.from.as_deref(), params.to.as_deref())
            .resolve(Utc::now().date_naive())?;

        let filter = MovementFilter {
            article_id: params.article_id,
            warehouse_id: params.warehouse_id,
            operation: params.operation,
            movement_type_id: None,
            from: Some(from.date_naive().to_string()),
            to: Some(to.date_naive().to_string()),
        };
        let movements = movement_query(&filter)?.all(db).await?;

        let article_ids: Vec<Uuid> = movements.iter().map(|m| m.article_id).collect();
        let user_ids: Vec<Uuid> = movements.iter().map(|m| m.user_id).collect();
        let articles: HashMap<Uuid, article::Model> = if article_ids.is_empty() {
            HashMap::new()
        } else {
            article::Entity::find()
                .filter(article::Column::Id.is_in(article_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|a| (a.id, a))
                .collect()
        };
        let users = user_names(db, user_ids).await?;
        let types = catalog_names(db, CatalogKind::MovementType).await?;

        let rows: Vec<MovementRow> = movements
            .into_iter()
            .map(|m| {
                let (article_code, article_name) = articles
                    .get(&m.article_id)
                    .map(|a| (a.code.clone(), a.name.clone()))
                    .unwrap_or_default();
                MovementRow {
                    date: m.created_at,
                    article_code,
                    article_name,
                    operation: m.operation,
                    movement_type: movement_type_label(&m, &types),
                    quantity: m.quantity,
                    stock_before: m.stock_before,
                    stock_after: m.stock_after,
                    reason: m.reason.unwrap_or_default(),
                    user: users.get(&m.user_id).cloned().unwrap_or_default(),
                }
            })
            .collect();

        let stats = movement_type_stats(&rows);
        Ok(MovementReport {
            from,
            to,
            rows,
            stats,
        })
    }

    /// Active articles with no movement inside the window.
    #[instrument(skip(self))]
    pub async fn idle_articles(&self, params: IdleArticleParams) -> Result<IdleArticleReport, ServiceError> {
        let db = self.db_pool.as_ref();
        let (from, to) = DateRangeParams::new(params.from.as_deref(), params.to.as_deref())
            .resolve(Utc::now().date_naive())?;

        let mut query = article::Entity::find()
            .filter(article::Column::Deleted.eq(false))
            .filter(article::Column::Active.eq(true))
            .filter(
                article::Column::Id.not_in_subquery(
                    Query::select()
                        .column(movement::Column::ArticleId)
                        .from(movement::Entity)
                        .and_where(movement::Column::CreatedAt.between(from, to))
                        .to_owned(),
                ),
            )
            .order_by_asc(article::Column::Code);
        if let Some(id) = params.warehouse_id {
            query = query.filter(article::Column::WarehouseId.eq(id));
        }
        if let Some(id) = params.category_id {
            query = query.filter(article::Column::CategoryId.eq(id));
        }
        let articles = query.all(db).await?;

        let categories = catalog_names(db, CatalogKind::Category).await?;
        let warehouses: HashMap<Uuid, String> = warehouse::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|w| (w.id, w.name))
            .collect();

        let rows = articles
            .into_iter()
            .map(|a| IdleArticleRow {
                category: a
                    .category_id
                    .and_then(|id| categories.get(&id).cloned())
                    .unwrap_or_default(),
                warehouse: a
                    .warehouse_id
                    .and_then(|id| warehouses.get(&id).cloned())
                    .unwrap_or_default(),
                code: a.code,
                name: a.name,
                stock: a.stock,
                min_stock: a.min_stock,
            })
            .collect();

        Ok(IdleArticleReport { from, to, rows })
    }

    /// Open orders past their expected date, grouped by supplier.
    #[instrument(skip(self))]
    pub async fn late_orders(&self, params: LateOrderParams) -> Result<LateOrderReport, ServiceError> {
        let db = self.db_pool.as_ref();
        let today = Utc::now().date_naive();

        let mut query = purchase_order::Entity::find()
            .filter(purchase_order::Column::Deleted.eq(false))
            .filter(purchase_order::Column::ExpectedDate.lt(today))
            .filter(purchase_order::Column::Status.is_not_in([
                PurchaseOrderStatus::Received,
                PurchaseOrderStatus::Cancelled,
            ]))
            .order_by_asc(purchase_order::Column::ExpectedDate);
        if let Some(id) = params.supplier_id {
            query = query.filter(purchase_order::Column::SupplierId.eq(id));
        }
        if let Some(id) = params.warehouse_id {
            query = query.filter(purchase_order::Column::WarehouseId.eq(id));
        }
        let orders = query.all(db).await?;

        let suppliers: HashMap<Uuid, String> = supplier::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|s| (s.id, s.business_name))
            .collect();

        Ok(group_late_orders(orders, &suppliers, today))
    }
}

async fn warehouse_stats<C: ConnectionTrait>(db: &C) -> Result<WarehouseStats, ServiceError> {
    let live_articles = || article::Entity::find().filter(article::Column::Deleted.eq(false));
    let deliveries = |kind: ItemKind| delivery::Entity::find().filter(delivery::Column::Kind.eq(kind));

    Ok(WarehouseStats {
        total_articles: live_articles().count(db).await?,
        total_categories: catalog_entry::Entity::find()
            .filter(catalog_entry::Column::Kind.eq(CatalogKind::Category))
            .filter(catalog_entry::Column::Deleted.eq(false))
            .count(db)
            .await?,
        total_movements: movement::Entity::find().count(db).await?,
        total_warehouses: warehouse::Entity::find()
            .filter(warehouse::Column::Deleted.eq(false))
            .filter(warehouse::Column::Active.eq(true))
            .count(db)
            .await?,
        total_stock: total_stock(db, live_articles()).await?,
        article_deliveries: deliveries(ItemKind::Article).count(db).await?,
        asset_deliveries: deliveries(ItemKind::Asset).count(db).await?,
    })
}

async fn procurement_stats<C: ConnectionTrait>(db: &C) -> Result<ProcurementStats, ServiceError> {
    let live_orders =
        || purchase_order::Entity::find().filter(purchase_order::Column::Deleted.eq(false));
    let receptions = |kind: ItemKind| reception::Entity::find().filter(reception::Column::Kind.eq(kind));

    Ok(ProcurementStats {
        total_orders: live_orders().count(db).await?,
        pending_orders: live_orders()
            .filter(purchase_order::Column::Status.eq(PurchaseOrderStatus::Pending))
            .count(db)
            .await?,
        article_receptions: receptions(ItemKind::Article).count(db).await?,
        asset_receptions: receptions(ItemKind::Asset).count(db).await?,
        total_suppliers: supplier::Entity::find()
            .filter(supplier::Column::Deleted.eq(false))
            .count(db)
            .await?,
    })
}

async fn catalog_names<C: ConnectionTrait>(
    db: &C,
    kind: CatalogKind,
) -> Result<HashMap<Uuid, String>, ServiceError> {
    Ok(catalog_entry::Entity::find()
        .filter(catalog_entry::Column::Kind.eq(kind))
        .all(db)
        .await?
        .into_iter()
        .map(|entry| (entry.id, entry.name))
        .collect())
}

async fn user_names<C: ConnectionTrait>(
    db: &C,
    ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, String>, ServiceError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect())
}

/// Catalog name, else the document that produced the movement.
fn movement_type_label(m: &movement::Model, types: &HashMap<Uuid, String>) -> String {
    m.movement_type_id
        .and_then(|id| types.get(&id).cloned())
        .or_else(|| m.reference_kind.clone())
        .unwrap_or_else(|| m.operation.to_string())
}

pub(crate) fn movement_type_stats(rows: &[MovementRow]) -> Vec<MovementTypeStat> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for row in rows {
        *counts.entry(row.movement_type.as_str()).or_default() += 1;
    }
    let mut stats: Vec<MovementTypeStat> = counts
        .into_iter()
        .map(|(movement_type, total)| MovementTypeStat {
            movement_type: movement_type.to_string(),
            total,
        })
        .collect();
    stats.sort_by(|a, b| b.total.cmp(&a.total));
    stats
}

pub(crate) fn group_late_orders(
    orders: Vec<purchase_order::Model>,
    suppliers: &HashMap<Uuid, String>,
    today: NaiveDate,
) -> LateOrderReport {
    let mut groups: BTreeMap<String, SupplierLateOrders> = BTreeMap::new();
    let total = orders.len();

    for order in orders {
        let Some(expected_date) = order.expected_date else {
            continue;
        };
        let supplier = suppliers
            .get(&order.supplier_id)
            .cloned()
            .unwrap_or_else(|| order.supplier_id.to_string());
        let group = groups
            .entry(supplier.clone())
            .or_insert_with(|| SupplierLateOrders {
                supplier_id: order.supplier_id,
                supplier: supplier.clone(),
                count: 0,
                orders: Vec::new(),
            });
        group.count += 1;
        group.orders.push(LateOrderRow {
            supplier,
            number: order.number,
            status: order.status,
            order_date: order.order_date,
            expected_date,
            days_late: (today - expected_date).num_days(),
            total: order.total,
        });
    }

    let mut suppliers: Vec<SupplierLateOrders> = groups.into_values().collect();
    suppliers.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.supplier.cmp(&b.supplier)));

    LateOrderReport {
        today,
        total,
        suppliers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(movement_type: &str) -> MovementRow {
        MovementRow {
            date: Utc::now(),
            article_code: "A-1".into(),
            article_name: "Gloves".into(),
            operation: MovementOperation::Exit,
            movement_type: movement_type.into(),
            quantity: 1,
            stock_before: 2,
            stock_after: 1,
            reason: String::new(),
            user: "admin".into(),
        }
    }

    #[test]
    fn movement_stats_are_sorted_by_count() {
        let rows = vec![row("delivery"), row("adjustment"), row("delivery"), row("reception"), row("delivery")];
        let stats = movement_type_stats(&rows);
        assert_eq!(stats[0].movement_type, "delivery");
        assert_eq!(stats[0].total, 3);
        assert_eq!(stats.len(), 3);
    }

    #[test]
    fn dashboard_rows_skip_missing_sections() {
        let dashboard = Dashboard {
            module: ReportModule::Requests,
            warehouse: None,
            procurement: None,
            requests: Some(RequestStats {
                total: 4,
                pending: 1,
                asset: 1,
                article: 3,
                mine: 2,
            }),
        };
        let rows = dashboard.rows();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.module == "requests"));
        let pending = rows.iter().find(|r| r.metric == "pending").unwrap();
        assert_eq!(pending.value, 1);
    }

    #[test]
    fn unknown_module_means_everything() {
        assert_eq!("warehouse".parse::<ReportModule>().unwrap(), ReportModule::Warehouse);
        assert_eq!("bajas".parse::<ReportModule>().unwrap(), ReportModule::All);
        assert!(ReportModule::All.includes(ReportModule::Requests));
        assert!(!ReportModule::Warehouse.includes(ReportModule::Requests));
    }

    #[test]
    fn late_orders_group_by_supplier() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let acme = Uuid::new_v4();
        let globex = Uuid::new_v4();
        let order = |supplier_id: Uuid, number: &str, expected: NaiveDate| purchase_order::Model {
            id: Uuid::new_v4(),
            number: number.into(),
            supplier_id,
            warehouse_id: None,
            status: PurchaseOrderStatus::Pending,
            order_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            expected_date: Some(expected),
            notes: None,
            subtotal: Decimal::ZERO,
            tax: Decimal::ZERO,
            total: Decimal::ZERO,
            created_by: Uuid::new_v4(),
            deleted: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let suppliers = HashMap::from([(acme, "Acme".to_string()), (globex, "Globex".to_string())]);
        let report = group_late_orders(
            vec![
                order(acme, "OC-1", NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()),
                order(globex, "OC-2", NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()),
                order(acme, "OC-3", NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()),
            ],
            &suppliers,
            today,
        );

        assert_eq!(report.total, 3);
        assert_eq!(report.suppliers[0].supplier, "Acme");
        assert_eq!(report.suppliers[0].count, 2);
        assert_eq!(report.suppliers[0].orders[0].days_late, 5);
        assert_eq!(report.rows().len(), 3);
    }
}
