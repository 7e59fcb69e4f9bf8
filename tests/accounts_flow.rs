mod common;

use common::PASSWORD;
use marketplace_api::{
    dto::{
        accounts::{AddressFields, CreateAddressRequest, VendorFilter, VerifyVendorRequest},
        auth::{LoginRequest, RefreshRequest},
    },
    error::AppError,
    middleware::auth::decode_claims,
    models::{AddressType, Role},
    routes::params::Pagination,
    services::{account_service, auth_service, cart_service, wishlist_service},
};

// Signup mails a link; activation provisions the cart and wishlist; tokens follow.
#[tokio::test]
async fn signup_activation_and_tokens() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };

    let email = common::unique_email("Shopper");
    let created = auth_service::signup(&app.state, common::signup_request(&email, Role::Customer))
        .await?
        .data
        .expect("user");
    assert!(!created.is_active);
    assert_eq!(created.role, Role::Customer);

    // Inactive accounts cannot log in yet.
    let early = auth_service::login(
        &app.state,
        LoginRequest {
            email: email.clone(),
            password: PASSWORD.into(),
        },
    )
    .await;
    assert!(matches!(early, Err(AppError::Forbidden)));

    let mail = app.mailer.last_to(&created.email).expect("activation mail");
    assert_eq!(mail.subject, "Costume Store Account Activation");
    assert!(mail.body.starts_with("Hi Test user"));

    let token = common::activation_token(&app, &created.email).expect("token");
    let activated = auth_service::activate(&app.state, &token).await?;
    assert_eq!(activated.message, "Your account has been activated");
    let again = auth_service::activate(&app.state, &token).await?;
    assert_eq!(again.message, "Your account is already active");

    let customer = marketplace_api::middleware::auth::AuthUser {
        user_id: created.id,
        role: Role::Customer,
    };
    let cart = cart_service::get_cart(&app.state, &customer).await?.data.expect("cart");
    assert_eq!(cart.total_price, 0);
    assert!(cart.items.is_empty());
    let wishlist = wishlist_service::get_wishlist(&app.state, &customer)
        .await?
        .data
        .expect("wishlist");
    assert_eq!(wishlist.total_price, 0);

    let tokens = auth_service::login(
        &app.state,
        LoginRequest {
            email: email.clone(),
            password: PASSWORD.into(),
        },
    )
    .await?
    .data
    .expect("tokens");
    let claims = decode_claims(&tokens.access, &app.state.config.jwt_secret)?;
    assert_eq!(claims.sub, created.id.to_string());

    let refreshed = auth_service::refresh(
        &app.state,
        RefreshRequest {
            refresh: tokens.refresh.clone(),
        },
    )
    .await?;
    assert!(refreshed.data.is_some());

    // An access token is not accepted as a refresh token.
    let wrong = auth_service::refresh(
        &app.state,
        RefreshRequest {
            refresh: tokens.access,
        },
    )
    .await;
    assert!(matches!(wrong, Err(AppError::Unauthorized)));

    let bad_password = auth_service::login(
        &app.state,
        LoginRequest {
            email,
            password: "Wr0ng!pass".into(),
        },
    )
    .await;
    assert!(matches!(bad_password, Err(AppError::BadRequest(_))));

    let duplicate =
        auth_service::signup(&app.state, common::signup_request(&created.email, Role::Vendor)).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    Ok(())
}

#[tokio::test]
async fn failed_activation_mail_leaves_no_account() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };

    let email = common::unique_email("unlucky");
    app.mailer.set_fail(true);
    let result = auth_service::signup(&app.state, common::signup_request(&email, Role::Customer)).await;
    assert!(matches!(result, Err(AppError::Upstream(_))));
    app.mailer.set_fail(false);

    // The email is still free.
    let retry = auth_service::signup(&app.state, common::signup_request(&email, Role::Customer)).await?;
    assert!(retry.data.is_some());

    let admin = auth_service::signup(
        &app.state,
        common::signup_request(&common::unique_email("boss"), Role::Admin),
    )
    .await;
    assert!(matches!(admin, Err(AppError::BadRequest(_))));

    Ok(())
}

#[tokio::test]
async fn addresses_are_one_per_type() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let customer = common::active_user(&app, Role::Customer).await?;

    let request = || CreateAddressRequest {
        fields: AddressFields {
            address: "221B Baker Street".into(),
            pin_code: "560001".into(),
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            country: "India".into(),
        },
        kind: AddressType::Default,
    };
    account_service::create_address(&app.state, &customer, request()).await?;
    let second = account_service::create_address(&app.state, &customer, request()).await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    let list = account_service::list_addresses(&app.state, &customer)
        .await?
        .data
        .expect("addresses");
    assert_eq!(list.items.len(), 1);

    account_service::delete_address(&app.state, &customer, AddressType::Default).await?;
    let missing = account_service::delete_address(&app.state, &customer, AddressType::Default).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    Ok(())
}

// A second onboarding request returns the profile on file without uploading again.
#[tokio::test]
async fn vendor_profile_is_created_once() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::active_user(&app, Role::Vendor).await?;

    let created = account_service::create_vendor_profile(
        &app.state,
        &vendor,
        common::vendor_profile_form("Masquerade"),
    )
    .await?;
    assert_eq!(created.message, "Vendor profile created");
    let profile = created.data.expect("profile");
    assert!(!profile.is_verified);
    assert!(profile.is_document_added);
    assert_eq!(app.images.upload_count(), 3);

    let held = app
        .images
        .get(&profile.aadhar_image.public_id)
        .expect("aadhar image");
    assert_eq!(held.folder, "Vendors/Masquerade/documents");
    assert_eq!(held.tags, vec!["documents".to_string()]);

    let repeat = account_service::create_vendor_profile(
        &app.state,
        &vendor,
        common::vendor_profile_form("Another name"),
    )
    .await?;
    assert_eq!(repeat.message, "Vendor profile already exists");
    assert_eq!(repeat.data.expect("profile").id, profile.id);
    assert_eq!(app.images.upload_count(), 3);

    // Customers have no vendor profile to manage.
    let customer = common::active_user(&app, Role::Customer).await?;
    let denied = account_service::create_vendor_profile(
        &app.state,
        &customer,
        common::vendor_profile_form("Nope"),
    )
    .await;
    assert!(matches!(denied, Err(AppError::Forbidden)));

    Ok(())
}

#[tokio::test]
async fn failed_document_upload_is_cleaned_up() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::active_user(&app, Role::Vendor).await?;

    app.images.fail_after(Some(2));
    let result = account_service::create_vendor_profile(
        &app.state,
        &vendor,
        common::vendor_profile_form("Halfway"),
    )
    .await;
    assert!(matches!(result, Err(AppError::Upstream(_))));
    assert_eq!(app.images.upload_count(), 2);
    assert_eq!(app.images.stored_count(), 0);

    let missing = account_service::get_vendor_profile(&app.state, &vendor).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    app.images.fail_after(None);
    let missing_file = {
        let mut form = common::vendor_profile_form("Halfway");
        form.files.retain(|f| f.field != "pancard_image");
        account_service::create_vendor_profile(&app.state, &vendor, form).await
    };
    assert!(matches!(missing_file, Err(AppError::BadRequest(_))));
    assert_eq!(app.images.stored_count(), 0);

    Ok(())
}

#[tokio::test]
async fn admin_verifies_vendors() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let admin = common::admin(&app).await?;
    let profile = account_service::get_vendor_profile(&app.state, &vendor)
        .await?
        .data
        .expect("profile");

    let pending = account_service::list_vendors(
        &app.state,
        &admin,
        VendorFilter {
            verified: Some(false),
        },
        Pagination {
            page: Some(1),
            per_page: Some(100),
        },
    )
    .await?;
    assert!(pending.data.is_some());

    let verified = account_service::verify_vendor(
        &app.state,
        &admin,
        profile.id,
        VerifyVendorRequest { is_verified: true },
    )
    .await?;
    assert_eq!(verified.message, "Vendor verified");
    assert!(verified.data.expect("vendor").is_verified);

    let denied = account_service::verify_vendor(
        &app.state,
        &vendor,
        profile.id,
        VerifyVendorRequest { is_verified: true },
    )
    .await;
    assert!(matches!(denied, Err(AppError::Forbidden)));

    Ok(())
}
