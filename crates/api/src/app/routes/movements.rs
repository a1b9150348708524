use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query, rejection::{JsonRejection, QueryRejection}},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use stockledger_inventory::{HistoryQuery, MovementKind};

use crate::app::routes::products::body_rejection;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", get(list_movements).post(create_movement))
}

/// Record a stock movement by delta.
pub async fn create_movement(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateMovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return body_rejection(rejection),
    };

    let kind = match body.kind.as_deref() {
        Some(raw) => match raw.parse::<MovementKind>() {
            Ok(k) => k,
            Err(e) => return errors::domain_error_to_response(e),
        },
        None => MovementKind::for_delta(body.delta),
    };

    match services
        .engine
        .apply_delta(body.product_id, body.delta, body.reason, kind)
        .await
    {
        Ok(movement) => {
            (StatusCode::CREATED, Json(dto::movement_to_json(&movement))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Movements newest first, optionally for one product.
pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::MovementsQuery>, QueryRejection>,
) -> axum::response::Response {
    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                rejection.body_text(),
            );
        }
    };

    let limit = query.limit.or(Some(services.history_default_limit));
    let history_query = match HistoryQuery::new(query.product_id, limit) {
        Ok(q) => q,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.engine.list_history(history_query).await {
        Ok(movements) => {
            let items = movements.iter().map(dto::movement_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::Value::Array(items))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}
