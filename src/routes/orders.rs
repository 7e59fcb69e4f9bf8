use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::orders::{
        CheckoutRequest, OrderList, OrderReceipt, UpdateOrderItemStatusRequest, VendorOrderList,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::OrderItem,
    response::ApiResponse,
    routes::params::{OrderItemFilter, Pagination},
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customer", get(list_customer_orders).post(checkout))
        .route("/customer/{id}", get(get_customer_order))
        .route("/vendor", get(list_vendor_orders))
        .route("/vendor/{item_id}", patch(update_order_item_status))
}

#[utoipa::path(
    post,
    path = "/api/orders/customer",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Order placed", body = ApiResponse<OrderReceipt>),
        (status = 400, description = "Cart is empty, invalid billing data or insufficient stock")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutRequest>,
) -> AppResult<Json<ApiResponse<OrderReceipt>>> {
    let resp = order_service::checkout(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/customer",
    params(Pagination),
    responses((status = 200, description = "Own orders", body = ApiResponse<OrderList>)),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_customer_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_customer_orders(&state, &user, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/customer/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order detail", body = ApiResponse<OrderReceipt>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_customer_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderReceipt>>> {
    let resp = order_service::get_customer_order(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/vendor",
    params(Pagination, OrderItemFilter),
    responses((status = 200, description = "Order items for own products", body = ApiResponse<VendorOrderList>)),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_vendor_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<OrderItemFilter>,
) -> AppResult<Json<ApiResponse<VendorOrderList>>> {
    let resp = order_service::list_vendor_order_items(&state, &user, filter, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/orders/vendor/{item_id}",
    params(("item_id" = Uuid, Path, description = "Order item id")),
    request_body = UpdateOrderItemStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<OrderItem>),
        (status = 400, description = "Transition not allowed"),
        (status = 404, description = "Order item not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order_item_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderItemStatusRequest>,
) -> AppResult<Json<ApiResponse<OrderItem>>> {
    let resp = order_service::update_order_item_status(&state, &user, item_id, payload).await?;
    Ok(Json(resp))
}
