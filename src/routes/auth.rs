use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::auth::{AccessToken, LoginRequest, RefreshRequest, SignupRequest, TokenPair},
    error::AppResult,
    models::User,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh/token", post(refresh_token))
        .route("/activate/{token}", get(activate).patch(activate))
}

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created, activation mail sent", body = ApiResponse<User>),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered"),
        (status = 502, description = "Activation mail could not be sent")
    ),
    tag = "Auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = auth_service::signup(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/auth/activate/{token}",
    params(("token" = String, Path, description = "Activation token from the signup mail")),
    responses(
        (status = 200, description = "Account activated or already active", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Unknown token")
    ),
    tag = "Auth"
)]
pub async fn activate(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = auth_service::activate(&state, &token).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access and refresh tokens", body = ApiResponse<TokenPair>),
        (status = 400, description = "Invalid credentials"),
        (status = 403, description = "Account not activated")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let resp = auth_service::login(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh/token",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = ApiResponse<AccessToken>),
        (status = 401, description = "Invalid refresh token")
    ),
    tag = "Auth"
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<AccessToken>>> {
    let resp = auth_service::refresh(&state, payload).await?;
    Ok(Json(resp))
}
