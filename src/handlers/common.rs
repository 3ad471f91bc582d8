use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use crate::{config::AppConfig, services::PageRequest, ApiResponse};

/// Standard created response
pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Confirmation body for deletes and other actions without a payload
pub fn done(message: impl Into<String>) -> Json<ApiResponse<()>> {
    Json(ApiResponse::success(()).with_message(message))
}

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ListQuery {
    pub fn page_request(&self, config: &AppConfig) -> PageRequest {
        PageRequest::new(self.page.unwrap_or(1), config.page_size(self.limit))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
}

/// `?format=json|csv` on report endpoints
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FormatQuery {
    #[param(value_type = Option<String>)]
    #[serde(default)]
    pub format: ReportFormat,
}

/// CSV body served as a download.
pub fn csv_attachment(filename: &str, body: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_attachment_sets_download_headers() {
        let response = csv_attachment("movements.csv", b"a,b\n".to_vec());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"movements.csv\""
        );
    }
}
