use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use bistro_core::DomainError;
use bistro_infra::ServiceError;

pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let code = err.code();
    match err {
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, code, msg),
        ServiceError::NotFound { .. } => json_error(StatusCode::NOT_FOUND, code, err.to_string()),
        ServiceError::InvalidTransition { .. } | ServiceError::DeletionForbidden { .. } => {
            json_error(StatusCode::CONFLICT, code, err.to_string())
        }
        ServiceError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, code, msg)
        }
        ServiceError::Conflict(_) => json_error(
            StatusCode::CONFLICT,
            code,
            "the order was modified concurrently; reload and retry",
        ),
        // Details were logged where the fault happened.
        ServiceError::Internal(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            code,
            "an unexpected error occurred",
        ),
    }
}

/// Malformed path/query/body input.
pub fn bad_request(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, VALIDATION_ERROR, message)
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    service_error_to_response(ServiceError::from(err))
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
