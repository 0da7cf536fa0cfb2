use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use bistro_core::{OrderId, TableId};
use bistro_orders::OrderStatus;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/total", post(calculate_total))
        .route("/date-range", get(list_orders_by_date_range))
        .route("/status/:status", get(list_orders_by_status))
        .route("/table/:table_id", get(list_orders_by_table))
        .route("/:id", get(get_order).put(update_order).delete(delete_order))
        .route("/:id/status", put(update_order_status))
}

fn parse_order_id(raw: &str) -> Result<OrderId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

fn parse_table_id(raw: &str) -> Result<TableId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

fn parse_status(raw: &str) -> Result<OrderStatus, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(v)| v)
        .map_err(|rejection| errors::bad_request(rejection.body_text()))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.orders.create(body.into()).await {
        Ok(order) => (StatusCode::CREATED, Json(dto::order_to_json(&order))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn calculate_total(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CalculateTotalRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match json_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.orders.calculate_total(&body.items) {
        Ok(total) => Json(serde_json::json!({ "total": total.to_string() })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.orders.list().await {
        Ok(orders) => Json(dto::orders_to_json(&orders)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.orders.get(id).await {
        Ok(order) => Json(dto::order_to_json(&order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let body = match json_body(body) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.orders.update(id, body.into()).await {
        Ok(order) => Json(dto::order_to_json(&order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_order_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    let status = match json_body(body).and_then(|b| parse_status(&b.status)) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.orders.update_status(id, status).await {
        Ok(order) => Json(dto::order_to_json(&order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.orders.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_orders_by_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(status): Path<String>,
) -> axum::response::Response {
    let status = match parse_status(&status) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.orders.list_by_status(status).await {
        Ok(orders) => Json(dto::orders_to_json(&orders)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_orders_by_table(
    Extension(services): Extension<Arc<AppServices>>,
    Path(table_id): Path<String>,
) -> axum::response::Response {
    let table_id = match parse_table_id(&table_id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.orders.list_by_table(table_id).await {
        Ok(orders) => Json(dto::orders_to_json(&orders)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_orders_by_date_range(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<dto::DateRangeQuery>, QueryRejection>,
) -> axum::response::Response {
    let range = query
        .map_err(|rejection| rejection.body_text())
        .and_then(|Query(q)| q.parse());
    let (start, end) = match range {
        Ok(v) => v,
        Err(msg) => return errors::bad_request(msg),
    };

    match services.orders.list_by_date_range(start, end).await {
        Ok(orders) => Json(dto::orders_to_json(&orders)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
