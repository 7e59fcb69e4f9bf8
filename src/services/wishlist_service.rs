use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, EntityTrait, QueryFilter, QuerySelect,
    Set, TransactionTrait,
    sea_query::{LockType, OnConflict},
};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    dto::wishlist::AddWishlistItemRequest,
    entity::{
        Products, WishlistItems, Wishlists,
        wishlist_items::{self, Column as WishItemCol},
        wishlists::{ActiveModel as WishlistActive, Column as WishlistCol, Model as WishlistModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Capability},
    models::{ProductSummary, Wishlist, WishlistItem},
    response::{ApiResponse, Meta},
    services::product_service::summary_from_entity,
    state::AppState,
};

#[derive(FromRow)]
struct WishlistRow {
    item_id: Uuid,
    created_at: DateTime<Utc>,
    product_id: Uuid,
    name: String,
    price: i64,
    discount: i32,
}

pub async fn get_wishlist(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Wishlist>> {
    user.require(Capability::ShopWishlist)?;
    let wishlist = Wishlists::find()
        .filter(WishlistCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Wishlist"))?;

    let rows = sqlx::query_as::<_, WishlistRow>(
        r#"
        SELECT wi.id AS item_id, wi.created_at,
               p.id AS product_id, p.name, p.price, p.discount
        FROM wishlist_items wi
        JOIN products p ON p.id = wi.product_id
        WHERE wi.wishlist_id = $1
        ORDER BY wi.created_at DESC
        "#,
    )
    .bind(wishlist.id)
    .fetch_all(&state.pool)
    .await?;

    let items: Vec<WishlistItem> = rows
        .into_iter()
        .map(|row| WishlistItem {
            id: row.item_id,
            product: ProductSummary {
                id: row.product_id,
                name: row.name,
                price: row.price,
                discount: row.discount,
            },
            created_at: row.created_at,
        })
        .collect();
    let total = items.len() as i64;

    Ok(ApiResponse::success(
        "OK",
        Wishlist {
            id: wishlist.id,
            total_price: wishlist.total_price,
            items,
        },
        Some(Meta::new(1, total, total)),
    ))
}

/// Adding a product that is already listed changes nothing.
pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddWishlistItemRequest,
) -> AppResult<ApiResponse<WishlistItem>> {
    user.require(Capability::ShopWishlist)?;

    // Product before wishlist, the same order repricing takes.
    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(payload.product_id)
        .lock(LockType::Share)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    let wishlist = locked_wishlist(&txn, user.user_id).await?;

    let inserted = WishlistItems::insert(wishlist_items::ActiveModel {
        id: Set(Uuid::new_v4()),
        wishlist_id: Set(wishlist.id),
        product_id: Set(product.id),
        created_at: NotSet,
    })
    .on_conflict(
        OnConflict::columns([WishItemCol::WishlistId, WishItemCol::ProductId])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(&txn)
    .await?;

    let wishlist_id = wishlist.id;
    if inserted > 0 {
        apply_total(&txn, wishlist, product.price).await?;
    }

    let item = WishlistItems::find()
        .filter(WishItemCol::WishlistId.eq(wishlist_id))
        .filter(WishItemCol::ProductId.eq(product.id))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Wishlist item"))?;
    txn.commit().await?;

    let message = if inserted > 0 {
        audit::record(
            &state.pool,
            user.user_id,
            "wishlist_add",
            "wishlist_items",
            serde_json::json!({ "product_id": product.id }),
        )
        .await;
        "Added to wishlist"
    } else {
        "Product is already in the wishlist"
    };

    Ok(ApiResponse::success(
        message,
        WishlistItem {
            id: item.id,
            product: summary_from_entity(&product),
            created_at: item.created_at.with_timezone(&Utc),
        },
        Some(Meta::empty()),
    ))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.require(Capability::ShopWishlist)?;

    let txn = state.orm.begin().await?;
    let listed = WishlistItems::find_by_id(item_id)
        .inner_join(Wishlists)
        .filter(WishlistCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Wishlist item"))?;
    Products::find_by_id(listed.product_id)
        .lock(LockType::Share)
        .one(&txn)
        .await?;
    let wishlist = locked_wishlist(&txn, user.user_id).await?;
    let (item, product) = WishlistItems::find_by_id(item_id)
        .filter(WishItemCol::WishlistId.eq(wishlist.id))
        .find_also_related(Products)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Wishlist item"))?;
    let product = product.ok_or(AppError::NotFound("Product"))?;

    WishlistItems::delete_by_id(item.id).exec(&txn).await?;
    apply_total(&txn, wishlist, -product.price).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "wishlist_remove",
        "wishlist_items",
        serde_json::json!({ "item_id": item_id }),
    )
    .await;

    Ok(ApiResponse::done("Removed from wishlist"))
}

async fn locked_wishlist(
    txn: &sea_orm::DatabaseTransaction,
    user_id: Uuid,
) -> AppResult<WishlistModel> {
    Wishlists::find()
        .filter(WishlistCol::UserId.eq(user_id))
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound("Wishlist"))
}

async fn apply_total(
    txn: &sea_orm::DatabaseTransaction,
    wishlist: WishlistModel,
    delta: i64,
) -> AppResult<()> {
    let total = wishlist.total_price + delta;
    let mut active: WishlistActive = wishlist.into();
    active.total_price = Set(total);
    active.updated_at = Set(Utc::now().into());
    active.update(txn).await?;
    Ok(())
}
