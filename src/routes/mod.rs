use axum::Router;

use crate::state::AppState;

pub mod accounts;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod doc;
pub mod health;
pub mod orders;
pub mod params;
pub mod products;
pub mod upload;
pub mod wishlist;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/accounts", accounts::router())
        .nest("/products", products::router())
        .nest("/vendor/products", products::vendor_router())
        .nest("/cart", cart::router())
        .nest("/wishlist", wishlist::router())
        .nest("/orders", orders::router())
        .nest("/admin", admin::router())
}
