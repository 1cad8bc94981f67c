use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("License limit reached")]
    LicenceLimit { current: i64, limit: i32 },

    #[error("{0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Validation(_) | ApiError::LicenceLimit { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upstream(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            ApiError::LicenceLimit { current, limit } => json!({
                "error": self.to_string(),
                "current_seniors": current,
                "license_limit": limit,
            }),
            ApiError::Upstream(message) => {
                error!("upstream failure: {message}");
                json!({ "error": self.to_string() })
            }
            ApiError::Internal(source) => {
                error!("internal error: {source:#}");
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_expected_status_codes() {
        assert_eq!(
            status_of(ApiError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(ApiError::NotFound("Senior")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(ApiError::Unauthorized("Unauthorized")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::LicenceLimit { current: 5, limit: 5 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Upstream("storage down".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApiError::Internal(anyhow::anyhow!("boom"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_the_entity() {
        assert_eq!(
            ApiError::NotFound("Organization").to_string(),
            "Organization not found"
        );
    }
}
