use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, patch},
};
use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, QuantityOperation},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Cart, CartItem},
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).post(add_to_cart))
        .route("/{id}", delete(remove_from_cart))
        .route("/{id}/{operation}", patch(adjust_quantity))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart with items", body = ApiResponse<Cart>),
        (status = 404, description = "Cart not provisioned")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Cart>>> {
    let resp = cart_service::get_cart(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added or quantity increased", body = ApiResponse<CartItem>),
        (status = 404, description = "Cart or product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let resp = cart_service::add_item(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/cart/{id}/{operation}",
    params(
        ("id" = Uuid, Path, description = "Cart item id"),
        ("operation" = QuantityOperation, Path, description = "increase or decrease")
    ),
    responses(
        (status = 200, description = "Quantity changed", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart item not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn adjust_quantity(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, operation)): Path<(Uuid, QuantityOperation)>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::adjust_item(&state, &user, id, operation).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{id}",
    params(("id" = Uuid, Path, description = "Cart item id")),
    responses(
        (status = 200, description = "Removed from cart", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart item not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = cart_service::remove_item(&state, &user, id).await?;
    Ok(Json(resp))
}
