use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    response::Response,
    routing::post,
};
use chrono::Utc;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/new", post(create_order))
        .route("/statistics-mail", post(send_order_statistics_mail))
}

/// Places an order registered at the current time.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateOrderRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };

    match services
        .orders
        .create_order(&body.product_numbers(), Utc::now())
        .await
    {
        Ok(result) => errors::ok(dto::OrderResponse::from(result)),
        Err(e) => errors::placement_error_to_response(e),
    }
}

pub async fn send_order_statistics_mail(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::OrderStatisticsMailRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::rejection_to_response(rejection),
    };
    if let Err(e) = body.validate() {
        return errors::domain_error_to_response(e);
    }

    match services
        .statistics
        .send_order_statistics_mail(body.order_date, &body.email)
        .await
    {
        Ok(()) => errors::ok(true),
        Err(e) => errors::statistics_error_to_response(e),
    }
}
