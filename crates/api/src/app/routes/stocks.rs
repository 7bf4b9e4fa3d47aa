use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    response::Response,
    routing::post,
};

use cafekiosk_products::ProductNumber;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/new", post(register_stock))
}

pub async fn register_stock(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateStockRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    match services
        .products
        .register_stock(ProductNumber::new(body.product_number), body.quantity)
        .await
    {
        Ok(stock) => errors::ok(dto::StockResponse::from(&stock)),
        Err(e) => errors::product_error_to_response(e),
    }
}
