use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{get, patch},
};

use crate::{
    dto::accounts::{
        AddressList, CreateAddressRequest, UpdateAddressRequest, UpdateVendorProfileRequest,
        VendorProfileForm,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Address, AddressType, Vendor},
    response::ApiResponse,
    routes::upload::FormData,
    services::account_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/address", get(list_addresses).post(create_address))
        .route("/address/{kind}", patch(update_address).delete(delete_address))
        .route(
            "/vendor/profile",
            get(get_vendor_profile)
                .post(create_vendor_profile)
                .patch(update_vendor_profile)
                .delete(delete_vendor_profile),
        )
}

#[utoipa::path(
    get,
    path = "/api/accounts/address",
    responses((status = 200, description = "Own addresses", body = ApiResponse<AddressList>)),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn list_addresses(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AddressList>>> {
    let resp = account_service::list_addresses(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/accounts/address",
    request_body = CreateAddressRequest,
    responses(
        (status = 200, description = "Address added", body = ApiResponse<Address>),
        (status = 409, description = "Address with same type already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn create_address(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateAddressRequest>,
) -> AppResult<Json<ApiResponse<Address>>> {
    let resp = account_service::create_address(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/accounts/address/{kind}",
    params(("kind" = AddressType, Path, description = "default or billing")),
    request_body = UpdateAddressRequest,
    responses(
        (status = 200, description = "Address updated", body = ApiResponse<Address>),
        (status = 404, description = "No address of that type")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn update_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(kind): Path<AddressType>,
    Json(payload): Json<UpdateAddressRequest>,
) -> AppResult<Json<ApiResponse<Address>>> {
    let resp = account_service::update_address(&state, &user, kind, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/accounts/address/{kind}",
    params(("kind" = AddressType, Path, description = "default or billing")),
    responses(
        (status = 200, description = "Address deleted", body = ApiResponse<serde_json::Value>),
        (status = 409, description = "Address is referenced by an order")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn delete_address(
    State(state): State<AppState>,
    user: AuthUser,
    Path(kind): Path<AddressType>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = account_service::delete_address(&state, &user, kind).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/accounts/vendor/profile",
    responses(
        (status = 200, description = "Own vendor profile", body = ApiResponse<Vendor>),
        (status = 404, description = "No profile yet")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn get_vendor_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Vendor>>> {
    let resp = account_service::get_vendor_profile(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/accounts/vendor/profile",
    request_body(content = VendorProfileForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Profile created, or the existing one", body = ApiResponse<Vendor>),
        (status = 400, description = "Missing or invalid documents"),
        (status = 502, description = "Document upload failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn create_vendor_profile(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Vendor>>> {
    let form = FormData::read(multipart, state.config.max_upload_bytes).await?;
    let resp = account_service::create_vendor_profile(&state, &user, form).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/accounts/vendor/profile",
    request_body = UpdateVendorProfileRequest,
    responses((status = 200, description = "Profile updated", body = ApiResponse<Vendor>)),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn update_vendor_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateVendorProfileRequest>,
) -> AppResult<Json<ApiResponse<Vendor>>> {
    let resp = account_service::update_vendor_profile(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/accounts/vendor/profile",
    responses(
        (status = 200, description = "Profile, products and documents removed", body = ApiResponse<serde_json::Value>),
        (status = 409, description = "Products of this vendor have been ordered")
    ),
    security(("bearer_auth" = [])),
    tag = "Accounts"
)]
pub async fn delete_vendor_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = account_service::delete_vendor_profile(&state, &user).await?;
    Ok(Json(resp))
}
