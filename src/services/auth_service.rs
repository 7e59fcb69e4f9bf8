use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    Set, TransactionTrait, sea_query::OnConflict,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    config::AppConfig,
    dto::auth::{AccessToken, Claims, LoginRequest, RefreshRequest, SignupRequest, TokenPair, TokenType},
    entity::{
        Carts, Users, Wishlists, carts,
        users::{ActiveModel as UserActive, Column as UserCol, Model as UserModel},
        wishlists,
    },
    error::{AppError, AppResult},
    middleware::auth::decode_claims,
    models::{Role, User},
    response::{ApiResponse, Meta},
    services::mailer::{activation_body, activation_subject},
    state::AppState,
};

pub async fn signup(state: &AppState, payload: SignupRequest) -> AppResult<ApiResponse<User>> {
    payload.validate()?;
    if payload.role == Role::Admin {
        return Err(AppError::BadRequest(
            "Admin accounts cannot be created through signup".into(),
        ));
    }

    let email = normalize_email(&payload.email);
    let txn = state.orm.begin().await?;

    let exists = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&txn)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict(
            "User with this email already exists".into(),
        ));
    }

    let password_hash = hash_password(&payload.password)?;
    let email_token = Uuid::new_v4().to_string();

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name.trim().to_string()),
        email: Set(email),
        phone: Set(payload.phone),
        password_hash: Set(password_hash),
        role: Set(payload.role.as_str().to_string()),
        is_active: Set(false),
        email_token: Set(email_token.clone()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    // A failed send drops the transaction, so no inactive orphan account remains.
    let link = state.config.activation_link(&email_token);
    state
        .mailer
        .send(
            &user.email,
            activation_subject(),
            &activation_body(&user.name, &link),
        )
        .await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        user.id,
        "user_signup",
        "users",
        serde_json::json!({ "user_id": user.id, "role": user.role }),
    )
    .await;

    Ok(ApiResponse::success(
        "Account created, check your email to activate it",
        user_from_entity(user)?,
        Some(Meta::empty()),
    ))
}

pub async fn activate(
    state: &AppState,
    email_token: &str,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;

    let user = Users::find()
        .filter(UserCol::EmailToken.eq(email_token))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Activation token"))?;

    if user.is_active {
        return Ok(ApiResponse::done("Your account is already active"));
    }

    let role: Role = user.role.parse()?;
    let user_id = user.id;
    let mut active: UserActive = user.into();
    active.is_active = Set(true);
    active.updated_at = Set(Utc::now().into());
    active.update(&txn).await?;

    if role == Role::Customer {
        provision_shopping(&txn, user_id).await?;
    }

    txn.commit().await?;

    audit::record(
        &state.pool,
        user_id,
        "user_activate",
        "users",
        serde_json::json!({ "user_id": user_id }),
    )
    .await;

    Ok(ApiResponse::done("Your account has been activated"))
}

/// Creates the customer's cart and wishlist if they do not exist yet.
pub async fn provision_shopping<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<()> {
    Carts::insert(carts::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_price: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    })
    .on_conflict(
        OnConflict::column(carts::Column::UserId)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    Wishlists::insert(wishlists::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_price: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    })
    .on_conflict(
        OnConflict::column(wishlists::Column::UserId)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    Ok(())
}

pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<ApiResponse<TokenPair>> {
    let email = normalize_email(&payload.email);
    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid email or password".into()))?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    if !user.is_active {
        tracing::debug!(user_id = %user.id, "login refused for inactive account");
        return Err(AppError::Forbidden);
    }

    let role: Role = user.role.parse()?;
    let tokens = TokenPair {
        access: issue_token(&state.config, user.id, role, TokenType::Access)?,
        refresh: issue_token(&state.config, user.id, role, TokenType::Refresh)?,
    };

    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success("Logged in", tokens, Some(Meta::empty())))
}

pub async fn refresh(
    state: &AppState,
    payload: RefreshRequest,
) -> AppResult<ApiResponse<AccessToken>> {
    let claims = decode_claims(&payload.refresh, &state.config.jwt_secret)?;
    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized);
    }
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;

    let user = Users::find_by_id(user_id)
        .one(&state.orm)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthorized)?;
    let role: Role = user.role.parse()?;

    let access = issue_token(&state.config, user.id, role, TokenType::Access)?;
    Ok(ApiResponse::success(
        "Token refreshed",
        AccessToken { access },
        Some(Meta::empty()),
    ))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn issue_token(
    config: &AppConfig,
    user_id: Uuid,
    role: Role,
    token_type: TokenType,
) -> AppResult<String> {
    let ttl = match token_type {
        TokenType::Access => Duration::minutes(config.access_token_ttl_minutes),
        TokenType::Refresh => Duration::days(config.refresh_token_ttl_days),
    };
    let expiration = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role,
        token_type,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

/// Trims the address and lowercases the domain part.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

pub(crate) fn user_from_entity(model: UserModel) -> AppResult<User> {
    Ok(User {
        id: model.id,
        name: model.name,
        email: model.email,
        phone: model.phone,
        role: model.role.parse()?,
        is_active: model.is_active,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            database_url: String::new(),
            host: "127.0.0.1".into(),
            port: 3000,
            jwt_secret: "test-secret".into(),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 1,
            public_base_url: "http://localhost:3000".into(),
            max_upload_bytes: 1024,
            cloudinary: None,
            mailgun: None,
        }
    }

    #[test]
    fn normalizes_domain_only() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "Alice@example.com");
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
    }

    #[test]
    fn issued_tokens_carry_role_and_type() {
        let config = config();
        let id = Uuid::new_v4();
        let token = issue_token(&config, id, Role::Vendor, TokenType::Refresh).unwrap();
        let claims = decode_claims(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, Role::Vendor);
        assert_eq!(claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn tokens_signed_with_another_secret_are_rejected() {
        let token = issue_token(&config(), Uuid::new_v4(), Role::Customer, TokenType::Access).unwrap();
        assert!(matches!(
            decode_claims(&token, "other-secret"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("Secret#123").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"Secret#123", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"Wrong#123", &parsed).is_err());
    }
}
