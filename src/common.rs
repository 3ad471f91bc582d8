/// Common types and utilities shared across handlers, services and commands
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Value};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::errors::ServiceError;

/// Window used by reports when no dates are given.
pub const DEFAULT_REPORT_DAYS: i64 = 30;

/// Date range parameters for filtering queries; both ends inclusive, `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl DateRangeParams {
    pub fn new(from: Option<&str>, to: Option<&str>) -> Self {
        Self {
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        }
    }

    /// Resolves to a UTC window, defaulting to the last thirty days ending today.
    pub fn resolve(&self, today: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
        let to = match &self.to {
            Some(raw) => parse_date(raw, "end")?,
            None => today,
        };
        let from = match &self.from {
            Some(raw) => parse_date(raw, "start")?,
            None => to - Duration::days(DEFAULT_REPORT_DAYS),
        };

        if from > to {
            return Err(ServiceError::ValidationError(
                "Start date must not be after end date".to_string(),
            ));
        }

        let start = from
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ServiceError::ValidationError("Invalid start date time".to_string()))?;
        let end = to
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| ServiceError::ValidationError("Invalid end date time".to_string()))?;

        Ok((start.and_utc(), end.and_utc()))
    }
}

fn parse_date(raw: &str, which: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
        ServiceError::ValidationError(format!("Invalid {} date format: {}", which, e))
    })
}

/// Next `PREFIX-YYYYMMDD-NNNN` number for `date`, sequential per day.
///
/// Must run inside the transaction that inserts the document.
pub async fn next_document_number<E, C>(
    conn: &C,
    column: E::Column,
    prefix: &str,
    date: NaiveDate,
) -> Result<String, ServiceError>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let stem = format!("{}-{}-", prefix, date.format("%Y%m%d"));

    let last = E::find()
        .filter(column.starts_with(&stem))
        .order_by_desc(column)
        .one(conn)
        .await?;

    let sequence = match last.map(|model| model.get(column)) {
        Some(Value::String(Some(number))) => number
            .strip_prefix(&stem)
            .and_then(|suffix| suffix.parse::<u32>().ok())
            .unwrap_or(0),
        _ => 0,
    };

    Ok(format!("{}{:04}", stem, sequence + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn range_defaults_to_last_thirty_days() {
        let (from, to) = DateRangeParams::default().resolve(day("2024-03-31")).unwrap();
        assert_eq!(from.date_naive(), day("2024-03-01"));
        assert_eq!(to.date_naive(), day("2024-03-31"));
    }

    #[test]
    fn range_rejects_inverted_and_malformed_dates() {
        let today = day("2024-03-31");
        assert!(DateRangeParams::new(Some("2024-03-10"), Some("2024-03-01"))
            .resolve(today)
            .is_err());
        assert!(DateRangeParams::new(Some("10/03/2024"), None)
            .resolve(today)
            .is_err());
    }

    #[test]
    fn explicit_range_covers_whole_days() {
        let (from, to) = DateRangeParams::new(Some("2024-01-05"), Some("2024-01-05"))
            .resolve(day("2024-03-31"))
            .unwrap();
        assert_eq!((to - from).num_seconds(), 86_399);
    }
}
