use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{
    dto::auth::{Claims, TokenType},
    error::AppError,
    models::Role,
    state::AppState,
};

/// Operations guarded by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageAddresses,
    ManageVendorProfile,
    ManageProducts,
    FulfilOrders,
    ShopCart,
    ShopWishlist,
    PlaceOrders,
    VerifyVendors,
}

impl Role {
    /// The permission table. Every protected operation asks this and nothing else.
    pub fn can(self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::Customer => matches!(
                capability,
                ManageAddresses | ShopCart | ShopWishlist | PlaceOrders
            ),
            Role::Vendor => matches!(
                capability,
                ManageAddresses | ManageVendorProfile | ManageProducts | FulfilOrders
            ),
            Role::Admin => matches!(capability, ManageAddresses | VerifyVendors),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.role.can(capability) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.user_id, role = %self.role, ?capability, "capability denied");
            Err(AppError::Forbidden)
        }
    }
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;
    Ok(decoded.claims)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized)?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::BadRequest("Invalid Authorization scheme".into()))?
            .trim();

        let claims = decode_claims(token, &state.config.jwt_secret)?;
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized);
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

        Ok(AuthUser {
            user_id,
            role: claims.role,
        })
    }
}
