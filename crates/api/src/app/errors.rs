use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockrecon_infra::reconcile::ReconcileError;

/// Store failures: 503 when a retry may succeed, 500 otherwise.
pub fn reconcile_error_to_response(err: ReconcileError) -> axum::response::Response {
    let retryable = err.is_retryable();
    let (status, code) = if retryable {
        (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "store_error")
    };

    (
        status,
        axum::Json(json!({
            "error": code,
            "message": err.to_string(),
            "retryable": retryable,
        })),
    )
        .into_response()
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
