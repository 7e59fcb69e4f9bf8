#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Bytes;
use marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, pool_of, run_migrations},
    dto::auth::SignupRequest,
    entity::users::ActiveModel as UserActive,
    middleware::auth::AuthUser,
    models::Role,
    routes::upload::FormData,
    services::{
        account_service, auth_service,
        image_store::{InMemoryImageStore, UploadFile},
        mailer::InMemoryMailer,
        product_service,
    },
    state::AppState,
};
use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, Set};
use uuid::Uuid;

pub const PASSWORD: &str = "Str0ng!pass";

pub struct TestApp {
    pub state: AppState,
    pub images: InMemoryImageStore,
    pub mailer: InMemoryMailer,
}

/// Connects to `TEST_DATABASE_URL` (or `DATABASE_URL`) and applies migrations.
/// Returns `None` when neither is set so the flow can be skipped.
pub async fn setup() -> anyhow::Result<Option<TestApp>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(None);
        }
    };

    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;
    let pool = pool_of(&orm);

    let images = InMemoryImageStore::new();
    let mailer = InMemoryMailer::new();
    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 3000,
        jwt_secret: "test-secret".into(),
        access_token_ttl_minutes: 60,
        refresh_token_ttl_days: 1,
        public_base_url: "http://localhost:3000".into(),
        max_upload_bytes: 1024 * 1024,
        cloudinary: None,
        mailgun: None,
    };

    let state = AppState {
        pool,
        orm,
        config: Arc::new(config),
        images: Arc::new(images.clone()),
        mailer: Arc::new(mailer.clone()),
    };
    Ok(Some(TestApp {
        state,
        images,
        mailer,
    }))
}

/// An address nobody else uses, so flows can share one database.
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

pub fn signup_request(email: &str, role: Role) -> SignupRequest {
    SignupRequest {
        name: "test user".into(),
        email: email.to_string(),
        phone: "9876543210".into(),
        password: PASSWORD.into(),
        role,
    }
}

/// The token at the end of the last activation link mailed to `email`.
pub fn activation_token(app: &TestApp, email: &str) -> Option<String> {
    let mail = app.mailer.last_to(email)?;
    mail.body.rsplit('/').next().map(|t| t.trim().to_string())
}

/// Signs up and activates an account of `role`.
pub async fn active_user(app: &TestApp, role: Role) -> anyhow::Result<AuthUser> {
    let email = unique_email(role.as_str());
    let user = auth_service::signup(&app.state, signup_request(&email, role))
        .await?
        .data
        .expect("signed up user");
    let token = activation_token(app, &email).expect("activation mail");
    auth_service::activate(&app.state, &token).await?;
    Ok(AuthUser {
        user_id: user.id,
        role,
    })
}

/// Admins cannot sign up, so they are inserted directly.
pub async fn admin(app: &TestApp) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set("admin".into()),
        email: Set(unique_email("admin")),
        phone: Set("9876543210".into()),
        password_hash: Set(auth_service::hash_password(PASSWORD)?),
        role: Set("admin".into()),
        is_active: Set(true),
        email_token: Set(String::new()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&app.state.orm)
    .await?;
    Ok(AuthUser {
        user_id: user.id,
        role: Role::Admin,
    })
}

pub fn image(field: &str, filename: &str) -> UploadFile {
    UploadFile {
        field: field.to_string(),
        filename: filename.to_string(),
        content_type: Some("image/png".into()),
        bytes: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
    }
}

pub fn form(fields: &[(&str, &str)], files: Vec<UploadFile>) -> FormData {
    let mut data = FormData::default();
    for (name, value) in fields {
        data.fields
            .entry((*name).to_string())
            .or_default()
            .push((*value).to_string());
    }
    data.files = files;
    data
}

pub fn vendor_profile_form(shop_name: &str) -> FormData {
    form(
        &[
            ("shop_name", shop_name),
            ("aadhar_number", "123456789012"),
            ("pancard_number", "ABCDE1234F"),
            ("gst_number", "22ABCDE1234F1Z5"),
        ],
        vec![
            image("aadhar_image", "aadhar.png"),
            image("pancard_image", "pan.png"),
            image("business_license", "license.png"),
        ],
    )
}

pub fn product_form(name: &str, price: i64, stock: i32, colors: &[&str], sizes: &[&str]) -> FormData {
    let price = price.to_string();
    let stock = stock.to_string();
    let mut fields = vec![
        ("name", name),
        ("category", "mens"),
        ("price", price.as_str()),
        ("stock", stock.as_str()),
        ("description", "A costume for testing"),
    ];
    fields.extend(colors.iter().map(|c| ("colors", *c)));
    fields.extend(sizes.iter().map(|s| ("sizes", *s)));
    form(&fields, vec![image("images", "front.png"), image("images", "back.png")])
}

/// An activated vendor with a profile on file.
pub async fn vendor(app: &TestApp) -> anyhow::Result<AuthUser> {
    let user = active_user(app, Role::Vendor).await?;
    let shop = format!("shop-{}", Uuid::new_v4().simple());
    account_service::create_vendor_profile(&app.state, &user, vendor_profile_form(&shop)).await?;
    Ok(user)
}

pub async fn product(
    app: &TestApp,
    vendor: &AuthUser,
    price: i64,
    stock: i32,
) -> anyhow::Result<marketplace_api::models::Product> {
    let name = format!("costume-{}", Uuid::new_v4().simple());
    let resp = product_service::create_product(
        &app.state,
        vendor,
        product_form(&name, price, stock, &["Red"], &["M"]),
    )
    .await?;
    Ok(resp.data.expect("created product"))
}
