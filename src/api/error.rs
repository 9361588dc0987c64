// HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::domain::ClipOpsError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Wraps the domain error with its HTTP presentation. Provider-level
/// details (attempted model lists, raw provider messages) never reach
/// the response body.
pub struct ApiError(pub ClipOpsError);

impl From<ClipOpsError> for ApiError {
    fn from(error: ClipOpsError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            ClipOpsError::QuotaExceeded { needed, remaining } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({
                    "error_code": "QUOTA_EXCEEDED",
                    "message": self.0.to_string(),
                    "needed": needed,
                    "remaining": remaining,
                    "hint": "Purchase additional WTU or wait for the next plan month.",
                }),
            ),
            ClipOpsError::ExtractionFailed(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error_code": "EXTRACTION_FAILED",
                    "message": self.0.to_string(),
                }),
            ),
            ClipOpsError::Validation(_) | ClipOpsError::AgentValidationFailed(_) => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error_code": "VALIDATION_ERROR",
                    "message": self.0.to_string(),
                }),
            ),
            ClipOpsError::AllProvidersFailed { tier, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error_code": "AI_SERVICE_UNAVAILABLE",
                    "message": format!("All providers failed for tier '{tier}'"),
                }),
            ),
            ClipOpsError::Provider { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error_code": "AI_SERVICE_UNAVAILABLE",
                    "message": "The AI service is temporarily unavailable.",
                }),
            ),
            ClipOpsError::NoModelsForTier(_) | ClipOpsError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error_code": "CONFIGURATION_ERROR",
                    "message": self.0.to_string(),
                }),
            ),
            ClipOpsError::Cancelled => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error_code": "CANCELLED",
                    "message": "The operation was cancelled.",
                }),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error_code": "INTERNAL_ERROR",
                    "message": "Internal server error",
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_maps_to_429() {
        let response =
            ApiError(ClipOpsError::QuotaExceeded { needed: 2, remaining: 1 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_all_providers_failed_maps_to_503() {
        let error = ClipOpsError::AllProvidersFailed {
            tier: "light".into(),
            attempted: vec!["secret-model".into()],
        };
        let response = ApiError(error).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
