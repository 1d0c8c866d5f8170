use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockrecon_core::VariantId;
use stockrecon_infra::reconcile::{ReconcileEngine, ReconcileOptions};

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/reconcile", post(reconcile))
        .route("/orphans/collect", post(collect_orphans))
        .route("/verify", get(verify))
        .route("/orphans", get(list_orphans))
        .route("/summaries/:variant_id", get(get_summary))
        .route("/variants/:variant_id/inspect", get(inspect_variant))
}

/// Run one reconcile pass. The body is optional; an empty body means the
/// default options (collect orphans, not a dry run).
pub async fn reconcile(
    Extension(engine): Extension<ReconcileEngine>,
    body: Bytes,
) -> axum::response::Response {
    let options = if body.is_empty() {
        ReconcileOptions::default()
    } else {
        match serde_json::from_slice::<ReconcileOptions>(&body) {
            Ok(options) => options,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string());
            }
        }
    };

    match engine.reconcile(options).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn verify(Extension(engine): Extension<ReconcileEngine>) -> axum::response::Response {
    match engine.verify().await {
        Ok(discrepancies) => Json(dto::VerifyResponse::from(discrepancies)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn list_orphans(Extension(engine): Extension<ReconcileEngine>) -> axum::response::Response {
    match engine.scan_orphans().await {
        Ok(movements) => Json(dto::OrphansResponse::from(movements)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn collect_orphans(Extension(engine): Extension<ReconcileEngine>) -> axum::response::Response {
    match engine.collect_orphans().await {
        Ok(removed) => Json(serde_json::json!({ "movements_removed": removed })).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn get_summary(
    Extension(engine): Extension<ReconcileEngine>,
    Path(variant_id): Path<String>,
) -> axum::response::Response {
    let variant_id = match parse_variant_id(&variant_id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match engine.summary(variant_id).await {
        Ok(Some(summary)) => Json(summary).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "no summary for variant"),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

pub async fn inspect_variant(
    Extension(engine): Extension<ReconcileEngine>,
    Path(variant_id): Path<String>,
) -> axum::response::Response {
    let variant_id = match parse_variant_id(&variant_id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match engine.inspect_variant(variant_id).await {
        Ok(inspection) => Json(inspection).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}

fn parse_variant_id(raw: &str) -> Result<VariantId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid variant id"))
}
