use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, Condition, ConnectionTrait,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
    sea_query::{Expr, LockType, OnConflict, extension::postgres::PgExpr},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::products::{ProductFields, ProductList},
    entity::{
        CartItems, Carts, Colors, OrderItems, ProductColors, ProductImages, ProductSizes,
        Products, Sizes, WishlistItems, Wishlists, cart_items, carts, colors, order_items,
        product_colors, product_images, product_sizes,
        products::{ActiveModel as ProductActive, Column as ProdCol, Model as ProductModel},
        sizes, wishlist_items, wishlists,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Capability},
    models::{Product, ProductSummary, StoredImage},
    response::{ApiResponse, Meta},
    routes::{
        params::{Pagination, ProductFilter, ProductSortBy, SortOrder},
        upload::FormData,
    },
    services::{account_service::vendor_for_user, image_store::discard_all},
    state::AppState,
};

const DEFAULT_SUBCATEGORY: &str = "Clothing";
const FIND_OR_CREATE_ATTEMPTS: usize = 3;

pub async fn list_products(
    state: &AppState,
    filter: ProductFilter,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = pagination.normalize();

    let mut condition = Condition::all();
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{q}%");
        condition = condition.add(
            Condition::any()
                .add(Expr::col(ProdCol::Name).ilike(pattern.as_str()))
                .add(Expr::col(ProdCol::Description).ilike(pattern.as_str())),
        );
    }
    if let Some(category) = filter.category {
        condition = condition.add(ProdCol::Category.eq(category.as_str()));
    }
    if let Some(min_price) = filter.min_price {
        condition = condition.add(ProdCol::Price.gte(min_price));
    }
    if let Some(max_price) = filter.max_price {
        condition = condition.add(ProdCol::Price.lte(max_price));
    }

    let sort_column = match filter.sort_by.unwrap_or(ProductSortBy::CreatedAt) {
        ProductSortBy::CreatedAt => ProdCol::CreatedAt,
        ProductSortBy::Price => ProdCol::Price,
        ProductSortBy::Name => ProdCol::Name,
        ProductSortBy::Rating => ProdCol::Rating,
    };
    let sort_order = filter.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_column),
        SortOrder::Desc => finder.order_by_desc(sort_column),
    };
    finder = finder.order_by_asc(ProdCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_details(&state.orm, models).await?;

    Ok(ApiResponse::success(
        "OK",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let model = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    let product = single_with_details(&state.orm, model).await?;
    Ok(ApiResponse::success("OK", product, Some(Meta::empty())))
}

pub async fn list_vendor_products(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ProductList>> {
    user.require(Capability::ManageProducts)?;
    let vendor = vendor_for_user(&state.orm, user.user_id).await?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Products::find()
        .filter(ProdCol::VendorId.eq(vendor.id))
        .order_by_desc(ProdCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;
    let items = with_details(&state.orm, models).await?;

    Ok(ApiResponse::success(
        "OK",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_vendor_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    user.require(Capability::ManageProducts)?;
    let vendor = vendor_for_user(&state.orm, user.user_id).await?;
    let model = owned_product(&state.orm, vendor.id, id).await?;
    let product = single_with_details(&state.orm, model).await?;
    Ok(ApiResponse::success("OK", product, Some(Meta::empty())))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    form: FormData,
) -> AppResult<ApiResponse<Product>> {
    user.require(Capability::ManageProducts)?;
    let vendor = vendor_for_user(&state.orm, user.user_id).await?;
    let fields = product_input(&form)?;

    let uploaded = upload_images(state, &form, &vendor.shop_name, &fields).await?;

    let product_id = Uuid::new_v4();
    let result = async {
        let txn = state.orm.begin().await?;
        ProductActive {
            id: Set(product_id),
            vendor_id: Set(vendor.id),
            name: Set(fields.name.clone()),
            category: Set(fields.category.as_str().to_string()),
            subcategory: Set(fields.subcategory.clone()),
            rating: Set(fields.rating),
            price: Set(fields.price),
            discount: Set(fields.discount),
            stock: Set(fields.stock),
            description: Set(fields.description.clone()),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&txn)
        .await?;
        link_attributes(&txn, product_id, &fields).await?;
        insert_image_rows(&txn, product_id, &uploaded, state.images.provider()).await?;
        txn.commit().await?;
        Ok::<_, AppError>(())
    }
    .await;

    if let Err(err) = result {
        discard_all(state.images.as_ref(), &uploaded).await;
        return Err(err);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": product_id, "vendor_id": vendor.id }),
    )
    .await;

    let model = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    Ok(ApiResponse::success(
        "Product created",
        single_with_details(&state.orm, model).await?,
        Some(Meta::empty()),
    ))
}

/// Replaces every field, the color and size sets and the images of a
/// product while keeping its id.
pub async fn replace_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    form: FormData,
) -> AppResult<ApiResponse<Product>> {
    user.require(Capability::ManageProducts)?;
    let vendor = vendor_for_user(&state.orm, user.user_id).await?;
    owned_product(&state.orm, vendor.id, id).await?;
    let fields = product_input(&form)?;

    let uploaded = upload_images(state, &form, &vendor.shop_name, &fields).await?;

    let result = async {
        let txn = state.orm.begin().await?;
        let current = Products::find_by_id(id)
            .filter(ProdCol::VendorId.eq(vendor.id))
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound("Product"))?;
        let old_price = current.price;

        let mut active: ProductActive = current.into();
        active.name = Set(fields.name.clone());
        active.category = Set(fields.category.as_str().to_string());
        active.subcategory = Set(fields.subcategory.clone());
        active.rating = Set(fields.rating);
        active.price = Set(fields.price);
        active.discount = Set(fields.discount);
        active.stock = Set(fields.stock);
        active.description = Set(fields.description.clone());
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?;

        ProductColors::delete_many()
            .filter(product_colors::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        ProductSizes::delete_many()
            .filter(product_sizes::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;
        let old_images: Vec<StoredImage> = ProductImages::find()
            .filter(product_images::Column::ProductId.eq(id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|img| StoredImage {
                url: img.url,
                public_id: img.public_id,
            })
            .collect();
        ProductImages::delete_many()
            .filter(product_images::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;

        link_attributes(&txn, id, &fields).await?;
        insert_image_rows(&txn, id, &uploaded, state.images.provider()).await?;
        if fields.price != old_price {
            reprice_holders(&txn, id, fields.price - old_price).await?;
        }

        txn.commit().await?;
        Ok::<_, AppError>(old_images)
    }
    .await;

    let old_images = match result {
        Ok(old_images) => old_images,
        Err(err) => {
            discard_all(state.images.as_ref(), &uploaded).await;
            return Err(err);
        }
    };
    discard_all(state.images.as_ref(), &old_images).await;

    audit::record(
        &state.pool,
        user.user_id,
        "product_replace",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    let model = owned_product(&state.orm, vendor.id, id).await?;
    Ok(ApiResponse::success(
        "Product updated",
        single_with_details(&state.orm, model).await?,
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.require(Capability::ManageProducts)?;
    let vendor = vendor_for_user(&state.orm, user.user_id).await?;

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(id)
        .filter(ProdCol::VendorId.eq(vendor.id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Product"))?;

    let ordered = OrderItems::find()
        .filter(order_items::Column::ProductId.eq(id))
        .count(&txn)
        .await?;
    if ordered > 0 {
        return Err(AppError::Conflict(
            "Product has been ordered and cannot be deleted".into(),
        ));
    }

    let images: Vec<StoredImage> = ProductImages::find()
        .filter(product_images::Column::ProductId.eq(id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|img| StoredImage {
            url: img.url,
            public_id: img.public_id,
        })
        .collect();

    // Cart and wishlist rows go with the product, so their totals shrink first.
    reprice_holders(&txn, id, -product.price).await?;
    Products::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    discard_all(state.images.as_ref(), &images).await;

    audit::record(
        &state.pool,
        user.user_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::done("Product deleted"))
}

fn product_input(form: &FormData) -> AppResult<ProductFields> {
    let mut fields = form.product_fields()?;
    fields.validate()?;
    if fields.subcategory.is_none() {
        fields.subcategory = Some(DEFAULT_SUBCATEGORY.to_string());
    }
    fields.colors = dedup(fields.colors.iter().map(|c| c.trim().to_string()));
    let mut sizes = Vec::with_capacity(fields.sizes.len());
    for size in fields.sizes.drain(..) {
        if !sizes.contains(&size) {
            sizes.push(size);
        }
    }
    fields.sizes = sizes;
    if form.files_named("images").is_empty() {
        return Err(AppError::BadRequest("At least one image is required".into()));
    }
    Ok(fields)
}

fn dedup(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

async fn upload_images(
    state: &AppState,
    form: &FormData,
    shop_name: &str,
    fields: &ProductFields,
) -> AppResult<Vec<StoredImage>> {
    let folder = format!("Products/{}/{}/images", shop_name, fields.name);
    let mut tags = vec![fields.category.as_str().to_string()];
    if let Some(subcategory) = &fields.subcategory {
        tags.push(subcategory.clone());
    }

    let mut uploaded = Vec::new();
    for file in form.files_named("images") {
        match state.images.store(&file, &folder, &tags).await {
            Ok(image) => uploaded.push(image),
            Err(err) => {
                discard_all(state.images.as_ref(), &uploaded).await;
                return Err(err);
            }
        }
    }
    Ok(uploaded)
}

async fn owned_product<C: ConnectionTrait>(
    conn: &C,
    vendor_id: Uuid,
    id: Uuid,
) -> AppResult<ProductModel> {
    Products::find_by_id(id)
        .filter(ProdCol::VendorId.eq(vendor_id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Product"))
}

async fn link_attributes(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    fields: &ProductFields,
) -> AppResult<()> {
    for name in &fields.colors {
        let color_id = find_or_create_color(txn, name).await?;
        product_colors::ActiveModel {
            product_id: Set(product_id),
            color_id: Set(color_id),
        }
        .insert(txn)
        .await?;
    }
    for size in &fields.sizes {
        let size_id = find_or_create_size(txn, size.as_str()).await?;
        product_sizes::ActiveModel {
            product_id: Set(product_id),
            size_id: Set(size_id),
        }
        .insert(txn)
        .await?;
    }
    Ok(())
}

async fn insert_image_rows(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    images: &[StoredImage],
    location: &str,
) -> AppResult<()> {
    for image in images {
        product_images::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            url: Set(image.url.clone()),
            public_id: Set(image.public_id.clone()),
            location: Set(location.to_string()),
            created_at: NotSet,
        }
        .insert(txn)
        .await?;
    }
    Ok(())
}

/// Shifts the totals of every cart and wishlist holding the product by
/// `delta` per unit.
pub(crate) async fn reprice_holders(txn: &DatabaseTransaction, product_id: Uuid, delta: i64) -> AppResult<()> {
    let cart_rows = CartItems::find()
        .filter(cart_items::Column::ProductId.eq(product_id))
        .all(txn)
        .await?;
    for item in cart_rows {
        Carts::update_many()
            .col_expr(
                carts::Column::TotalPrice,
                Expr::col(carts::Column::TotalPrice).add(delta * item.quantity as i64),
            )
            .filter(carts::Column::Id.eq(item.cart_id))
            .exec(txn)
            .await?;
    }

    let wishlist_rows = WishlistItems::find()
        .filter(wishlist_items::Column::ProductId.eq(product_id))
        .all(txn)
        .await?;
    for item in wishlist_rows {
        Wishlists::update_many()
            .col_expr(
                wishlists::Column::TotalPrice,
                Expr::col(wishlists::Column::TotalPrice).add(delta),
            )
            .filter(wishlists::Column::Id.eq(item.wishlist_id))
            .exec(txn)
            .await?;
    }
    Ok(())
}

pub async fn find_or_create_color<C: ConnectionTrait>(conn: &C, name: &str) -> AppResult<Uuid> {
    for _ in 0..FIND_OR_CREATE_ATTEMPTS {
        if let Some(color) = Colors::find()
            .filter(colors::Column::Name.eq(name))
            .one(conn)
            .await?
        {
            return Ok(color.id);
        }
        Colors::insert(colors::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            created_at: NotSet,
        })
        .on_conflict(OnConflict::column(colors::Column::Name).do_nothing().to_owned())
        .exec_without_returning(conn)
        .await?;
    }
    Err(AppError::Internal(anyhow::anyhow!(
        "could not find or create color `{name}`"
    )))
}

pub async fn find_or_create_size<C: ConnectionTrait>(conn: &C, name: &str) -> AppResult<Uuid> {
    for _ in 0..FIND_OR_CREATE_ATTEMPTS {
        if let Some(size) = Sizes::find()
            .filter(sizes::Column::Name.eq(name))
            .one(conn)
            .await?
        {
            return Ok(size.id);
        }
        Sizes::insert(sizes::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            created_at: NotSet,
        })
        .on_conflict(OnConflict::column(sizes::Column::Name).do_nothing().to_owned())
        .exec_without_returning(conn)
        .await?;
    }
    Err(AppError::Internal(anyhow::anyhow!(
        "could not find or create size `{name}`"
    )))
}

async fn single_with_details<C: ConnectionTrait>(conn: &C, model: ProductModel) -> AppResult<Product> {
    with_details(conn, vec![model])
        .await?
        .pop()
        .ok_or(AppError::NotFound("Product"))
}

/// Attaches color names, size names and image urls, keeping the input order.
async fn with_details<C: ConnectionTrait>(
    conn: &C,
    models: Vec<ProductModel>,
) -> AppResult<Vec<Product>> {
    let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();

    let mut colors_by_product: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (link, color) in ProductColors::find()
        .filter(product_colors::Column::ProductId.is_in(ids.clone()))
        .find_also_related(Colors)
        .all(conn)
        .await?
    {
        if let Some(color) = color {
            colors_by_product
                .entry(link.product_id)
                .or_default()
                .push(color.name);
        }
    }

    let mut sizes_by_product: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (link, size) in ProductSizes::find()
        .filter(product_sizes::Column::ProductId.is_in(ids.clone()))
        .find_also_related(Sizes)
        .all(conn)
        .await?
    {
        if let Some(size) = size {
            sizes_by_product
                .entry(link.product_id)
                .or_default()
                .push(size.name);
        }
    }

    let mut images_by_product: HashMap<Uuid, Vec<String>> = HashMap::new();
    for image in ProductImages::find()
        .filter(product_images::Column::ProductId.is_in(ids))
        .order_by_asc(product_images::Column::CreatedAt)
        .all(conn)
        .await?
    {
        images_by_product
            .entry(image.product_id)
            .or_default()
            .push(image.url);
    }

    models
        .into_iter()
        .map(|model| {
            let mut colors = colors_by_product.remove(&model.id).unwrap_or_default();
            colors.sort();
            let mut sizes = sizes_by_product.remove(&model.id).unwrap_or_default();
            sizes.sort_by_key(|s| size_rank(s));
            let images = images_by_product.remove(&model.id).unwrap_or_default();
            product_from_entity(model, colors, sizes, images)
        })
        .collect()
}

fn size_rank(name: &str) -> usize {
    ["XS", "S", "M", "L", "XL", "XXL"]
        .iter()
        .position(|s| *s == name)
        .unwrap_or(usize::MAX)
}

fn product_from_entity(
    model: ProductModel,
    colors: Vec<String>,
    sizes: Vec<String>,
    images: Vec<String>,
) -> AppResult<Product> {
    Ok(Product {
        id: model.id,
        vendor_id: model.vendor_id,
        name: model.name,
        category: model.category.parse()?,
        subcategory: model.subcategory,
        rating: model.rating,
        price: model.price,
        discount: model.discount,
        stock: model.stock,
        description: model.description,
        colors,
        sizes,
        images,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

pub(crate) fn summary_from_entity(model: &ProductModel) -> ProductSummary {
    ProductSummary {
        id: model.id,
        name: model.name.clone(),
        price: model.price,
        discount: model.discount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_sort_by_garment_order() {
        let mut sizes = vec!["XL".to_string(), "S".to_string(), "XXL".to_string(), "M".to_string()];
        sizes.sort_by_key(|s| size_rank(s));
        assert_eq!(sizes, vec!["S", "M", "XL", "XXL"]);
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let colors = dedup(
            ["Red", "Blue", "Red", "Green"]
                .into_iter()
                .map(String::from),
        );
        assert_eq!(colors, vec!["Red", "Blue", "Green"]);
    }
}
