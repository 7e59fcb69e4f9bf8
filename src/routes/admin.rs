use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch},
};
use uuid::Uuid;

use crate::{
    dto::accounts::{VendorFilter, VendorList, VerifyVendorRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Vendor,
    response::ApiResponse,
    routes::params::Pagination,
    services::account_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/vendors", get(list_vendors))
        .route("/vendors/{id}/verify", patch(verify_vendor))
}

#[utoipa::path(
    get,
    path = "/api/admin/vendors",
    params(Pagination, VendorFilter),
    responses(
        (status = 200, description = "Vendor profiles (admin only)", body = ApiResponse<VendorList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_vendors(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<VendorFilter>,
) -> AppResult<Json<ApiResponse<VendorList>>> {
    let resp = account_service::list_vendors(&state, &user, filter, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/admin/vendors/{id}/verify",
    params(("id" = Uuid, Path, description = "Vendor id")),
    request_body = VerifyVendorRequest,
    responses(
        (status = 200, description = "Verification flag set", body = ApiResponse<Vendor>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Vendor not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn verify_vendor(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<VerifyVendorRequest>,
) -> AppResult<Json<ApiResponse<Vendor>>> {
    let resp = account_service::verify_vendor(&state, &user, id, payload).await?;
    Ok(Json(resp))
}
