use axum::Router;

pub mod orders;
pub mod products;
pub mod stocks;
pub mod system;

/// Router for every `/api/v1` endpoint.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/stocks", stocks::router())
        .nest("/orders", orders::router())
}
