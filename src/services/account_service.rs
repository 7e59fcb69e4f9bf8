use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{LockType, OnConflict},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::accounts::{
        AddressList, CreateAddressRequest, UpdateAddressRequest, UpdateVendorProfileRequest,
        VendorFilter, VendorList, VerifyVendorRequest,
    },
    entity::{
        Addresses, BillingDetails, ProductImages, Products, Vendors,
        addresses::{ActiveModel as AddressActive, Column as AddressCol, Model as AddressModel},
        billing_details::Column as BillingCol,
        product_images::Column as ImageCol,
        products::Column as ProdCol,
        vendors::{ActiveModel as VendorActive, Column as VendorCol, Model as VendorModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Capability},
    models::{Address, AddressType, StoredImage, Vendor},
    response::{ApiResponse, Meta},
    routes::{params::Pagination, upload::FormData},
    services::{
        image_store::{UploadFile, discard_all},
        product_service::reprice_holders,
    },
    state::AppState,
};

const DOCUMENT_FIELDS: [&str; 3] = ["aadhar_image", "pancard_image", "business_license"];

pub async fn list_addresses(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AddressList>> {
    user.require(Capability::ManageAddresses)?;
    let items = Addresses::find()
        .filter(AddressCol::UserId.eq(user.user_id))
        .order_by_asc(AddressCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(address_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "OK",
        AddressList { items },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn create_address(
    state: &AppState,
    user: &AuthUser,
    payload: CreateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    user.require(Capability::ManageAddresses)?;
    payload.validate()?;

    let exists = Addresses::find()
        .filter(AddressCol::UserId.eq(user.user_id))
        .filter(AddressCol::Kind.eq(payload.kind.as_str()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict(
            "Address with same type already exists".into(),
        ));
    }

    let fields = payload.fields;
    let address = AddressActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        address: Set(fields.address),
        pin_code: Set(fields.pin_code.trim().to_string()),
        city: Set(fields.city),
        state: Set(fields.state),
        country: Set(fields.country),
        kind: Set(payload.kind.as_str().to_string()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|err| match AppError::from(err) {
        AppError::Conflict(_) => AppError::Conflict("Address with same type already exists".into()),
        other => other,
    })?;

    audit::record(
        &state.pool,
        user.user_id,
        "address_create",
        "addresses",
        serde_json::json!({ "address_id": address.id, "type": address.kind }),
    )
    .await;

    Ok(ApiResponse::success(
        "Address added",
        address_from_entity(address)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_address(
    state: &AppState,
    user: &AuthUser,
    kind: AddressType,
    payload: UpdateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    user.require(Capability::ManageAddresses)?;
    payload.validate()?;

    let existing = find_address(&state.orm, user.user_id, kind)
        .await?
        .ok_or(AppError::NotFound("Address"))?;

    let mut active: AddressActive = existing.into();
    if let Some(address) = payload.address {
        active.address = Set(address);
    }
    if let Some(pin_code) = payload.pin_code {
        active.pin_code = Set(pin_code.trim().to_string());
    }
    if let Some(city) = payload.city {
        active.city = Set(city);
    }
    if let Some(region) = payload.state {
        active.state = Set(region);
    }
    if let Some(country) = payload.country {
        active.country = Set(country);
    }
    active.updated_at = Set(Utc::now().into());
    let address = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "address_update",
        "addresses",
        serde_json::json!({ "address_id": address.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Address updated",
        address_from_entity(address)?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_address(
    state: &AppState,
    user: &AuthUser,
    kind: AddressType,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.require(Capability::ManageAddresses)?;

    let existing = find_address(&state.orm, user.user_id, kind)
        .await?
        .ok_or(AppError::NotFound("Address"))?;

    let referenced = BillingDetails::find()
        .filter(BillingCol::AddressId.eq(existing.id))
        .count(&state.orm)
        .await?;
    if referenced > 0 {
        return Err(AppError::Conflict(
            "Address is used by an order and cannot be deleted".into(),
        ));
    }

    Addresses::delete_by_id(existing.id).exec(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "address_delete",
        "addresses",
        serde_json::json!({ "address_id": existing.id }),
    )
    .await;

    Ok(ApiResponse::done("Address deleted"))
}

pub(crate) async fn find_address<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    kind: AddressType,
) -> AppResult<Option<AddressModel>> {
    Ok(Addresses::find()
        .filter(AddressCol::UserId.eq(user_id))
        .filter(AddressCol::Kind.eq(kind.as_str()))
        .one(conn)
        .await?)
}

/// The caller's vendor profile, required before any catalog or fulfilment work.
pub(crate) async fn vendor_for_user<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> AppResult<VendorModel> {
    Vendors::find()
        .filter(VendorCol::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Vendor profile"))
}

pub async fn get_vendor_profile(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<Vendor>> {
    user.require(Capability::ManageVendorProfile)?;
    let vendor = vendor_for_user(&state.orm, user.user_id).await?;
    Ok(ApiResponse::success(
        "OK",
        vendor_from_entity(vendor)?,
        Some(Meta::empty()),
    ))
}

/// Get-or-create. An existing profile is returned untouched and nothing is uploaded.
pub async fn create_vendor_profile(
    state: &AppState,
    user: &AuthUser,
    form: FormData,
) -> AppResult<ApiResponse<Vendor>> {
    user.require(Capability::ManageVendorProfile)?;

    if let Some(existing) = Vendors::find()
        .filter(VendorCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
    {
        return Ok(ApiResponse::success(
            "Vendor profile already exists",
            vendor_from_entity(existing)?,
            Some(Meta::empty()),
        ));
    }

    let fields = form.vendor_profile_fields()?;
    fields.validate()?;
    let files = DOCUMENT_FIELDS
        .iter()
        .map(|name| form.require_file(name))
        .collect::<AppResult<Vec<&UploadFile>>>()?;

    let folder = format!("Vendors/{}/documents", fields.shop_name);
    let tags = vec!["documents".to_string()];
    let mut uploaded: Vec<StoredImage> = Vec::with_capacity(files.len());
    for file in files {
        match state.images.store(file, &folder, &tags).await {
            Ok(image) => uploaded.push(image),
            Err(err) => {
                discard_all(state.images.as_ref(), &uploaded).await;
                return Err(err);
            }
        }
    }

    let [aadhar, pancard, license] = uploaded.as_slice() else {
        discard_all(state.images.as_ref(), &uploaded).await;
        return Err(AppError::BadRequest("Missing vendor documents".into()));
    };
    let documents = (image_json(aadhar)?, image_json(pancard)?, image_json(license)?);

    let id = Uuid::new_v4();
    let insert = Vendors::insert(VendorActive {
        id: Set(id),
        user_id: Set(user.user_id),
        shop_name: Set(fields.shop_name),
        aadhar_number: Set(fields.aadhar_number),
        aadhar_image: Set(documents.0),
        pancard_number: Set(fields.pancard_number),
        pancard_image: Set(documents.1),
        gst_number: Set(fields.gst_number),
        business_license: Set(documents.2),
        is_verified: Set(false),
        is_document_added: Set(true),
        bio: Set(fields.bio),
        description: Set(fields.description),
        created_at: NotSet,
        updated_at: NotSet,
    })
    .on_conflict(
        OnConflict::column(VendorCol::UserId)
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(&state.orm)
    .await;

    let inserted = match insert {
        Ok(rows) => rows,
        Err(err) => {
            discard_all(state.images.as_ref(), &uploaded).await;
            return Err(err.into());
        }
    };

    if inserted == 0 {
        // Another request created the profile first.
        discard_all(state.images.as_ref(), &uploaded).await;
        let existing = vendor_for_user(&state.orm, user.user_id).await?;
        return Ok(ApiResponse::success(
            "Vendor profile already exists",
            vendor_from_entity(existing)?,
            Some(Meta::empty()),
        ));
    }

    let vendor = Vendors::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Vendor profile"))?;

    audit::record(
        &state.pool,
        user.user_id,
        "vendor_profile_create",
        "vendors",
        serde_json::json!({ "vendor_id": vendor.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Vendor profile created",
        vendor_from_entity(vendor)?,
        Some(Meta::empty()),
    ))
}

pub async fn update_vendor_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateVendorProfileRequest,
) -> AppResult<ApiResponse<Vendor>> {
    user.require(Capability::ManageVendorProfile)?;
    payload.validate()?;

    let vendor = vendor_for_user(&state.orm, user.user_id).await?;
    let mut active: VendorActive = vendor.into();
    if let Some(shop_name) = payload.shop_name {
        active.shop_name = Set(shop_name);
    }
    if let Some(bio) = payload.bio {
        active.bio = Set(Some(bio));
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    active.updated_at = Set(Utc::now().into());
    let vendor = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "vendor_profile_update",
        "vendors",
        serde_json::json!({ "vendor_id": vendor.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Vendor profile updated",
        vendor_from_entity(vendor)?,
        Some(Meta::empty()),
    ))
}

/// Removes the profile with its products, then their images and the
/// documents from the image host. Carts and wishlists holding those
/// products lose the lines and their share of the total.
pub async fn delete_vendor_profile(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.require(Capability::ManageVendorProfile)?;

    let txn = state.orm.begin().await?;
    let vendor = Vendors::find()
        .filter(VendorCol::UserId.eq(user.user_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Vendor profile"))?;

    let products = Products::find()
        .filter(ProdCol::VendorId.eq(vendor.id))
        .lock(LockType::Update)
        .all(&txn)
        .await?;
    for product in &products {
        reprice_holders(&txn, product.id, -product.price).await?;
    }

    let product_ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
    let mut images: Vec<StoredImage> = ProductImages::find()
        .filter(ImageCol::ProductId.is_in(product_ids))
        .all(&txn)
        .await?
        .into_iter()
        .map(|img| StoredImage {
            url: img.url,
            public_id: img.public_id,
        })
        .collect();
    for document in [
        &vendor.aadhar_image,
        &vendor.pancard_image,
        &vendor.business_license,
    ] {
        images.push(image_from_json(document)?);
    }

    // Ordered products restrict the cascade, which rolls the repricing back too.
    Vendors::delete_by_id(vendor.id)
        .exec(&txn)
        .await
        .map_err(|err| match AppError::from(err) {
            AppError::Conflict(_) => AppError::Conflict(
                "Vendor has ordered products and cannot be deleted".into(),
            ),
            other => other,
        })?;
    txn.commit().await?;
    discard_all(state.images.as_ref(), &images).await;

    audit::record(
        &state.pool,
        user.user_id,
        "vendor_profile_delete",
        "vendors",
        serde_json::json!({ "vendor_id": vendor.id }),
    )
    .await;

    Ok(ApiResponse::done("Vendor profile deleted"))
}

pub async fn list_vendors(
    state: &AppState,
    user: &AuthUser,
    filter: VendorFilter,
    pagination: Pagination,
) -> AppResult<ApiResponse<VendorList>> {
    user.require(Capability::VerifyVendors)?;
    let (page, limit, offset) = pagination.normalize();

    let mut condition = Condition::all();
    if let Some(verified) = filter.verified {
        condition = condition.add(VendorCol::IsVerified.eq(verified));
    }
    let finder = Vendors::find()
        .filter(condition)
        .order_by_desc(VendorCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(vendor_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::success(
        "OK",
        VendorList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn verify_vendor(
    state: &AppState,
    user: &AuthUser,
    vendor_id: Uuid,
    payload: VerifyVendorRequest,
) -> AppResult<ApiResponse<Vendor>> {
    user.require(Capability::VerifyVendors)?;

    let vendor = Vendors::find_by_id(vendor_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Vendor"))?;

    let mut active: VendorActive = vendor.into();
    active.is_verified = Set(payload.is_verified);
    active.updated_at = Set(Utc::now().into());
    let vendor = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "vendor_verify",
        "vendors",
        serde_json::json!({ "vendor_id": vendor.id, "is_verified": vendor.is_verified }),
    )
    .await;

    let message = if vendor.is_verified {
        "Vendor verified"
    } else {
        "Vendor verification revoked"
    };
    Ok(ApiResponse::success(
        message,
        vendor_from_entity(vendor)?,
        Some(Meta::empty()),
    ))
}

fn image_json(image: &StoredImage) -> AppResult<serde_json::Value> {
    serde_json::to_value(image).map_err(|e| AppError::Internal(e.into()))
}

fn image_from_json(value: &serde_json::Value) -> AppResult<StoredImage> {
    serde_json::from_value(value.clone()).map_err(|e| AppError::Internal(e.into()))
}

pub(crate) fn address_from_entity(model: AddressModel) -> AppResult<Address> {
    Ok(Address {
        id: model.id,
        address: model.address,
        pin_code: model.pin_code,
        city: model.city,
        state: model.state,
        country: model.country,
        kind: model.kind.parse()?,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub(crate) fn vendor_from_entity(model: VendorModel) -> AppResult<Vendor> {
    Ok(Vendor {
        id: model.id,
        user_id: model.user_id,
        shop_name: model.shop_name,
        aadhar_number: model.aadhar_number,
        aadhar_image: image_from_json(&model.aadhar_image)?,
        pancard_number: model.pancard_number,
        pancard_image: image_from_json(&model.pancard_image)?,
        gst_number: model.gst_number,
        business_license: image_from_json(&model.business_license)?,
        is_verified: model.is_verified,
        is_document_added: model.is_document_added,
        bio: model.bio,
        description: model.description,
        created_at: model.created_at.with_timezone(&Utc),
    })
}
