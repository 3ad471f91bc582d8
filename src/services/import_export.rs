use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::catalogs::{upsert_by_code, CatalogFields};
use crate::{
    db::{flatten_txn_error, DbPool},
    entities::catalog_entry,
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::CatalogKind,
};

/// Errors echoed back to the caller; the rest are only counted.
pub const MAX_REPORTED_ERRORS: usize = 10;
/// Existing entries written into a template.
pub const TEMPLATE_ROWS: u64 = 10;

const TRUTHY: [&str; 8] = ["SI", "S", "YES", "Y", "TRUE", "1", "ACTIVE", "ACTIVO"];

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ImportResult {
    pub catalog: String,
    pub created: usize,
    pub updated: usize,
    pub errors: Vec<String>,
    pub error_count: usize,
    pub message: String,
}

/// Resolves the `:catalog` path segment of the import routes.
pub fn import_catalog(slug: &str) -> Result<CatalogKind, ServiceError> {
    if slug == "subjects" {
        return Err(ServiceError::BadRequest(
            "Import of subjects is not supported".to_string(),
        ));
    }
    slug.parse::<CatalogKind>().map_err(ServiceError::NotFound)
}

/// Header row expected for `kind`.
pub fn columns(kind: CatalogKind) -> Vec<&'static str> {
    let mut columns = vec!["Code", "Name", "Description", "Active"];
    match kind {
        CatalogKind::RequestType => columns.push("RequiresApproval"),
        CatalogKind::ReceptionType => columns.push("RequiresOrder"),
        _ => {}
    }
    columns
}

pub fn parse_bool(raw: &str) -> bool {
    let value = raw.trim().to_uppercase();
    TRUTHY.contains(&value.as_str())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

/// A data row with its 1-based line number in the file (headers are row 1).
#[derive(Debug, PartialEq)]
pub(crate) struct ParsedRow {
    pub row: usize,
    pub fields: Result<CatalogFields, String>,
}

/// Reads and validates rows; fails the whole file only when columns are missing.
pub(crate) fn parse_catalog_csv(kind: CatalogKind, body: &[u8]) -> Result<Vec<ParsedRow>, ServiceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();

    let expected = columns(kind);
    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == &column.to_lowercase()))
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "Missing columns in file: {}",
            missing.join(", ")
        )));
    }

    let position = |column: &str| headers.iter().position(|h| h == &column.to_lowercase());
    let code_at = position("Code");
    let name_at = position("Name");
    let description_at = position("Description");
    let active_at = position("Active");
    let approval_at = position("RequiresApproval");
    let order_at = position("RequiresOrder");

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                rows.push(ParsedRow {
                    row,
                    fields: Err(format!("Row {}: {}", row, e)),
                });
                continue;
            }
        };
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let cell = |at: Option<usize>| at.and_then(|i| record.get(i)).unwrap_or("").trim();
        let code = cell(code_at);
        let name = cell(name_at);

        let fields = if code.is_empty() {
            Err(format!("Row {}: Code is required", row))
        } else if name.is_empty() {
            Err(format!("Row {}: Name is required", row))
        } else {
            let description = cell(description_at);
            Ok(CatalogFields {
                code: code.to_uppercase(),
                name: name.to_string(),
                description: (!description.is_empty()).then(|| description.to_string()),
                requires_approval: kind == CatalogKind::RequestType && parse_bool(cell(approval_at)),
                requires_order: kind == CatalogKind::ReceptionType && parse_bool(cell(order_at)),
                active: parse_bool(cell(active_at)),
            })
        };
        rows.push(ParsedRow { row, fields });
    }

    Ok(rows)
}

/// Serialises rows as CSV with a header taken from the field names.
pub fn write_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, ServiceError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ServiceError::SerializationError(format!("Failed to flush CSV: {}", e)))
}

/// CSV templates and catalog imports.
#[derive(Clone)]
pub struct ImportService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ImportService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Header plus up to ten existing entries ordered by code.
    #[instrument(skip(self))]
    pub async fn template(&self, kind: CatalogKind) -> Result<Vec<u8>, ServiceError> {
        let entries = catalog_entry::Entity::find()
            .filter(catalog_entry::Column::Kind.eq(kind))
            .filter(catalog_entry::Column::Deleted.eq(false))
            .order_by_asc(catalog_entry::Column::Code)
            .limit(TEMPLATE_ROWS)
            .all(self.db_pool.as_ref())
            .await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(columns(kind))?;
        for entry in entries {
            let mut record = vec![
                entry.code,
                entry.name,
                entry.description.unwrap_or_default(),
                yes_no(entry.active).to_string(),
            ];
            match kind {
                CatalogKind::RequestType => record.push(yes_no(entry.requires_approval).to_string()),
                CatalogKind::ReceptionType => record.push(yes_no(entry.requires_order).to_string()),
                _ => {}
            }
            writer.write_record(&record)?;
        }
        writer
            .into_inner()
            .map_err(|e| ServiceError::SerializationError(format!("Failed to flush CSV: {}", e)))
    }

    /// Upserts every valid row by code in one transaction; invalid rows are reported, not fatal.
    #[instrument(skip(self, body), fields(bytes = body.len()))]
    pub async fn import(
        &self,
        actor_id: Uuid,
        kind: CatalogKind,
        body: Vec<u8>,
    ) -> Result<ImportResult, ServiceError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ServiceError::ValidationError("The file is empty".to_string()));
        }
        let rows = parse_catalog_csv(kind, &body)?;

        let (created, updated, errors) = self
            .db_pool
            .transaction::<_, (usize, usize, Vec<String>), ServiceError>(|txn| {
                Box::pin(async move {
                    let mut created = 0;
                    let mut updated = 0;
                    let mut errors = Vec::new();
                    for parsed in rows {
                        match parsed.fields {
                            Ok(fields) => {
                                let (_, was_created) = upsert_by_code(txn, kind, fields).await?;
                                if was_created {
                                    created += 1;
                                } else {
                                    updated += 1;
                                }
                            }
                            Err(message) => errors.push(message),
                        }
                    }
                    Ok((created, updated, errors))
                })
            })
            .await
            .map_err(flatten_txn_error)?;

        metrics::record_import_rows(kind.slug(), "created", created);
        metrics::record_import_rows(kind.slug(), "updated", updated);
        metrics::record_import_rows(kind.slug(), "error", errors.len());
        if !errors.is_empty() {
            warn!(catalog = %kind, errors = errors.len(), "Import finished with row errors");
        }
        info!(catalog = %kind, created, updated, "Catalog imported");

        self.event_sender
            .send(Event::CatalogImported {
                catalog: kind.slug().to_string(),
                created,
                updated,
                errors: errors.len(),
                actor_id,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(import_result(kind, created, updated, errors))
    }
}

fn import_result(kind: CatalogKind, created: usize, updated: usize, mut errors: Vec<String>) -> ImportResult {
    let error_count = errors.len();
    errors.truncate(MAX_REPORTED_ERRORS);

    let mut message = format!(
        "{} import finished: {} created, {} updated",
        kind.label(),
        created,
        updated
    );
    if error_count > 0 {
        message.push_str(&format!(", {} row(s) with errors", error_count));
    }

    ImportResult {
        catalog: kind.slug().to_string(),
        created,
        updated,
        errors,
        error_count,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("SI", true)]
    #[case("s", true)]
    #[case(" yes ", true)]
    #[case("Y", true)]
    #[case("true", true)]
    #[case("1", true)]
    #[case("Activo", true)]
    #[case("ACTIVE", true)]
    #[case("NO", false)]
    #[case("", false)]
    #[case("0", false)]
    fn booleans_accept_spanish_and_english(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(parse_bool(raw), expected);
    }

    #[test]
    fn missing_columns_fail_the_whole_file() {
        let err = parse_catalog_csv(CatalogKind::RequestType, b"Code,Name\nA,B\n").unwrap_err();
        assert_matches!(
            err,
            ServiceError::ValidationError(msg) if msg == "Missing columns in file: Description, Active, RequiresApproval"
        );
    }

    #[test]
    fn rows_are_numbered_from_two_and_blank_rows_skipped() {
        let body = b"Code,Name,Description,Active\nb-01,Bosch,,SI\n,,,\n,Nameless,,SI\nb-02,,,NO\n";
        let rows = parse_catalog_csv(CatalogKind::Brand, body).unwrap();

        assert_eq!(rows.len(), 3);
        let first = rows[0].fields.as_ref().unwrap();
        assert_eq!(first.code, "B-01");
        assert!(first.active);
        assert_eq!(first.description, None);
        assert_eq!(rows[1].fields, Err("Row 4: Code is required".to_string()));
        assert_eq!(rows[2].fields, Err("Row 5: Name is required".to_string()));
    }

    #[test]
    fn headers_match_case_insensitively() {
        let body = b"code,NAME,description,active,requiresorder\nRT,Direct,,1,yes\n";
        let rows = parse_catalog_csv(CatalogKind::ReceptionType, body).unwrap();
        let fields = rows[0].fields.as_ref().unwrap();
        assert!(fields.requires_order);
        assert!(!fields.requires_approval);
    }

    #[test]
    fn result_reports_first_ten_errors() {
        let errors: Vec<String> = (2..16).map(|row| format!("Row {}: Code is required", row)).collect();
        let result = import_result(CatalogKind::Category, 1, 2, errors);
        assert_eq!(result.errors.len(), MAX_REPORTED_ERRORS);
        assert_eq!(result.error_count, 14);
        assert!(result.message.contains("14 row(s) with errors"));
    }

    #[test]
    fn subjects_are_not_importable() {
        assert_matches!(import_catalog("subjects"), Err(ServiceError::BadRequest(_)));
        assert_matches!(import_catalog("brands"), Ok(CatalogKind::Brand));
        assert_matches!(import_catalog("colors"), Err(ServiceError::NotFound(_)));
    }
}
