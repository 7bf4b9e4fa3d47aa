use axum::response::Response;

use crate::app::errors;

pub async fn health() -> Response {
    errors::ok("UP")
}
