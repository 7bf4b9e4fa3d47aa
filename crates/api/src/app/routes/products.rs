use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    response::Response,
    routing::{get, post},
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/new", post(create_product))
        .route("/selling", get(selling_products))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateProductRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    match services.products.create_product(body.into()).await {
        Ok(product) => errors::ok(dto::ProductResponse::from(&product)),
        Err(e) => errors::product_error_to_response(e),
    }
}

pub async fn selling_products(Extension(services): Extension<Arc<AppServices>>) -> Response {
    match services.products.selling_products().await {
        Ok(products) => errors::ok(
            products
                .iter()
                .map(dto::ProductResponse::from)
                .collect::<Vec<_>>(),
        ),
        Err(e) => errors::product_error_to_response(e),
    }
}
