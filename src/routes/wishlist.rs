use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};
use uuid::Uuid;

use crate::{
    dto::wishlist::AddWishlistItemRequest,
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Wishlist, WishlistItem},
    response::ApiResponse,
    services::wishlist_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_wishlist).post(add_to_wishlist))
        .route("/{id}", delete(remove_from_wishlist))
}

#[utoipa::path(
    get,
    path = "/api/wishlist",
    responses((status = 200, description = "Wishlist with items", body = ApiResponse<Wishlist>)),
    security(("bearer_auth" = [])),
    tag = "Wishlist"
)]
pub async fn get_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Wishlist>>> {
    let resp = wishlist_service::get_wishlist(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/wishlist",
    request_body = AddWishlistItemRequest,
    responses(
        (status = 200, description = "Product listed, or already listed", body = ApiResponse<WishlistItem>),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Wishlist"
)]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddWishlistItemRequest>,
) -> AppResult<Json<ApiResponse<WishlistItem>>> {
    let resp = wishlist_service::add_item(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/wishlist/{id}",
    params(("id" = Uuid, Path, description = "Wishlist item id")),
    responses(
        (status = 200, description = "Removed from wishlist", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Wishlist item not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Wishlist"
)]
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = wishlist_service::remove_item(&state, &user, id).await?;
    Ok(Json(resp))
}
