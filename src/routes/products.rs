use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::products::{ProductForm, ProductList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Product,
    response::ApiResponse,
    routes::{
        params::{Pagination, ProductFilter},
        upload::FormData,
    },
    services::product_service,
    state::AppState,
};

/// Public catalog.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
}

/// The signed-in vendor's own listings.
pub fn vendor_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_vendor_products).post(create_product))
        .route(
            "/{id}",
            get(get_vendor_product)
                .put(replace_product)
                .delete(delete_product),
        )
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(Pagination, ProductFilter),
    responses(
        (status = 200, description = "List products", body = ApiResponse<ProductList>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_products(&state, filter, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product detail", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_product(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/vendor/products",
    params(Pagination),
    responses(
        (status = 200, description = "Own products", body = ApiResponse<ProductList>),
        (status = 404, description = "Vendor profile missing")
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor products"
)]
pub async fn list_vendor_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = product_service::list_vendor_products(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/vendor/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Own product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor products"
)]
pub async fn get_vendor_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::get_vendor_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/vendor/products",
    request_body(content = ProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Product created", body = ApiResponse<Product>),
        (status = 400, description = "Invalid fields or images"),
        (status = 502, description = "Image upload failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Product>>> {
    let form = FormData::read(multipart, state.config.max_upload_bytes).await?;
    let resp = product_service::create_product(&state, &user, form).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/api/vendor/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body(content = ProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Product replaced", body = ApiResponse<Product>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor products"
)]
pub async fn replace_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Product>>> {
    let form = FormData::read(multipart, state.config.max_upload_bytes).await?;
    let resp = product_service::replace_product(&state, &user, id, form).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/vendor/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Product has been ordered")
    ),
    security(("bearer_auth" = [])),
    tag = "Vendor products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = product_service::delete_product(&state, &user, id).await?;
    Ok(Json(resp))
}
