use marketplace_api::routes::{doc::ApiDoc, health::health_check};
use utoipa::OpenApi;

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check().await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert_eq!(data.service, "marketplace-api");
}

#[test]
fn openapi_lists_every_router() {
    let doc = ApiDoc::openapi();
    for path in [
        "/api/auth/signup",
        "/api/accounts/vendor/profile",
        "/api/products/{id}",
        "/api/vendor/products/{id}",
        "/api/cart/{id}/{operation}",
        "/api/wishlist",
        "/api/orders/vendor/{item_id}",
        "/api/admin/vendors/{id}/verify",
    ] {
        assert!(doc.paths.paths.contains_key(path), "missing {path}");
    }
}
