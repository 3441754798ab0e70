use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use payforge_auth::AuthzError;
use payforge_infra::queue::QueueServiceError;

pub fn queue_error_to_response(err: QueueServiceError) -> axum::response::Response {
    match err {
        QueueServiceError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        QueueServiceError::UnsupportedType(e) => {
            json_error(StatusCode::BAD_REQUEST, "unsupported_type", e.to_string())
        }
        QueueServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        QueueServiceError::FileLookup(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "file_lookup_error", msg),
        QueueServiceError::Store(e) => {
            tracing::error!(error = %e, "queue store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

pub fn forbidden(err: AuthzError) -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
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
