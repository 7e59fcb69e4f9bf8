use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::LockType,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, QuantityOperation},
    entity::{
        CartItems, Carts, Products,
        cart_items::{ActiveModel as CartItemActive, Column as CartItemCol, Model as CartItemModel},
        carts::{ActiveModel as CartActive, Column as CartCol, Model as CartModel},
        products::Model as ProductModel,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Capability},
    models::{Cart, CartItem},
    response::{ApiResponse, Meta},
    services::product_service::summary_from_entity,
    state::AppState,
};

/// Effect of one mutation on a cart line: the quantity left (`None` when
/// the line goes away) and how much the cart total moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LineChange {
    pub quantity: Option<i32>,
    pub total_delta: i64,
}

/// Largest quantity one cart line may hold, matching the add request bound.
pub const MAX_LINE_QUANTITY: i32 = 1000;

fn capped(quantity: i32) -> AppResult<i32> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "A cart line holds at most {MAX_LINE_QUANTITY} units"
        )));
    }
    Ok(quantity)
}

pub(crate) fn add_change(existing: Option<i32>, price: i64, quantity: i32) -> AppResult<LineChange> {
    let merged = existing.unwrap_or(0).saturating_add(quantity);
    Ok(LineChange {
        quantity: Some(capped(merged)?),
        total_delta: price * quantity as i64,
    })
}

pub(crate) fn adjust_change(
    quantity: i32,
    price: i64,
    op: QuantityOperation,
) -> AppResult<LineChange> {
    Ok(match op {
        QuantityOperation::Increase => LineChange {
            quantity: Some(capped(quantity.saturating_add(1))?),
            total_delta: price,
        },
        QuantityOperation::Decrease => LineChange {
            quantity: (quantity > 1).then_some(quantity - 1),
            total_delta: -price,
        },
    })
}

pub(crate) fn remove_change(quantity: i32, price: i64) -> LineChange {
    LineChange {
        quantity: None,
        total_delta: -(price * quantity as i64),
    }
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    user.require(Capability::ShopCart)?;
    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Cart"))?;

    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .find_also_related(Products)
        .order_by_asc(CartItemCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let items: Vec<CartItem> = rows
        .into_iter()
        .filter_map(|(item, product)| product.map(|p| cart_item_from_entity(item, &p)))
        .collect();
    let total = items.len() as i64;

    Ok(ApiResponse::success(
        "OK",
        Cart {
            id: cart.id,
            total_price: cart.total_price,
            items,
        },
        Some(Meta::new(1, total, total)),
    ))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    user.require(Capability::ShopCart)?;
    payload.validate()?;

    // The share lock waits out a concurrent replace or delete, so the line is
    // priced at what the product costs once this commits. Product before cart,
    // the same order repricing takes.
    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(payload.product_id)
        .lock(LockType::Share)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Product"))?;
    let cart = locked_cart(&txn, user.user_id).await?;

    let color = payload.color.trim().to_string();
    let existing = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product.id))
        .filter(CartItemCol::Size.eq(payload.size.as_str()))
        .filter(CartItemCol::Color.eq(color.as_str()))
        .one(&txn)
        .await?;

    let change = add_change(existing.as_ref().map(|i| i.quantity), product.price, payload.quantity)?;
    let quantity = change.quantity.unwrap_or(payload.quantity);
    let item = match existing {
        Some(item) => {
            let mut active: CartItemActive = item.into();
            active.quantity = Set(quantity);
            active.update(&txn).await?
        }
        None => {
            CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                quantity: Set(quantity),
                size: Set(payload.size.as_str().to_string()),
                color: Set(color),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?
        }
    };
    apply_total(&txn, cart, change.total_delta).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({ "product_id": product.id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success(
        "Item added to cart",
        cart_item_from_entity(item, &product),
        Some(Meta::empty()),
    ))
}

/// One step up or down. A line decreased from 1 is removed.
pub async fn adjust_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    op: QuantityOperation,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.require(Capability::ShopCart)?;

    let txn = state.orm.begin().await?;
    lock_line_product(&txn, user.user_id, item_id).await?;
    let cart = locked_cart(&txn, user.user_id).await?;
    let (item, product) = owned_item(&txn, cart.id, item_id).await?;

    let change = adjust_change(item.quantity, product.price, op)?;
    let message = match change.quantity {
        Some(quantity) => {
            let mut active: CartItemActive = item.into();
            active.quantity = Set(quantity);
            active.update(&txn).await?;
            "Cart item updated"
        }
        None => {
            CartItems::delete_by_id(item.id).exec(&txn).await?;
            "Cart item removed"
        }
    };
    apply_total(&txn, cart, change.total_delta).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_adjust",
        "cart_items",
        serde_json::json!({ "item_id": item_id, "operation": op }),
    )
    .await;

    Ok(ApiResponse::done(message))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    user.require(Capability::ShopCart)?;

    let txn = state.orm.begin().await?;
    lock_line_product(&txn, user.user_id, item_id).await?;
    let cart = locked_cart(&txn, user.user_id).await?;
    let (item, product) = owned_item(&txn, cart.id, item_id).await?;

    let change = remove_change(item.quantity, product.price);
    CartItems::delete_by_id(item.id).exec(&txn).await?;
    apply_total(&txn, cart, change.total_delta).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "item_id": item_id }),
    )
    .await;

    Ok(ApiResponse::done("Removed from cart"))
}

/// The caller's cart, locked until the transaction ends.
pub(crate) async fn locked_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<CartModel> {
    Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .lock(LockType::Update)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Cart"))
}

/// Share-locks the product behind one of the caller's cart lines.
async fn lock_line_product<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    item_id: Uuid,
) -> AppResult<()> {
    let item = CartItems::find_by_id(item_id)
        .inner_join(Carts)
        .filter(CartCol::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Cart item"))?;
    Products::find_by_id(item.product_id)
        .lock(LockType::Share)
        .one(conn)
        .await?;
    Ok(())
}

async fn owned_item<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    item_id: Uuid,
) -> AppResult<(CartItemModel, ProductModel)> {
    let (item, product) = CartItems::find_by_id(item_id)
        .filter(CartItemCol::CartId.eq(cart_id))
        .find_also_related(Products)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound("Cart item"))?;
    let product = product.ok_or(AppError::NotFound("Product"))?;
    Ok((item, product))
}

async fn apply_total<C: ConnectionTrait>(conn: &C, cart: CartModel, delta: i64) -> AppResult<()> {
    let total = cart.total_price + delta;
    let mut active: CartActive = cart.into();
    active.total_price = Set(total);
    active.updated_at = Set(Utc::now().into());
    active.update(conn).await?;
    Ok(())
}

fn cart_item_from_entity(model: CartItemModel, product: &ProductModel) -> CartItem {
    CartItem {
        id: model.id,
        product: summary_from_entity(product),
        quantity: model.quantity,
        size: model.size,
        color: model.color,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays line changes the way the service applies them and checks the
    /// running total against the recomputed sum after every step.
    struct Ledger {
        total: i64,
        lines: Vec<(i64, i32)>,
    }

    impl Ledger {
        fn apply(&mut self, index: usize, price: i64, change: LineChange) {
            self.total += change.total_delta;
            match (change.quantity, index < self.lines.len()) {
                (Some(q), true) => self.lines[index].1 = q,
                (Some(q), false) => self.lines.push((price, q)),
                (None, true) => {
                    self.lines.remove(index);
                }
                (None, false) => {}
            }
            let expected: i64 = self.lines.iter().map(|(p, q)| p * *q as i64).sum();
            assert_eq!(self.total, expected);
        }
    }

    #[test]
    fn adding_to_an_existing_line_adds_only_the_new_quantity() {
        let change = add_change(Some(3), 100, 2).unwrap();
        assert_eq!(change.quantity, Some(5));
        assert_eq!(change.total_delta, 200);
    }

    #[test]
    fn decrease_at_one_removes_the_line_and_subtracts_once() {
        let change = adjust_change(1, 250, QuantityOperation::Decrease).unwrap();
        assert_eq!(change, LineChange { quantity: None, total_delta: -250 });
    }

    #[test]
    fn lines_stop_at_the_quantity_cap() {
        assert_eq!(
            add_change(Some(999), 10, 1).unwrap().quantity,
            Some(MAX_LINE_QUANTITY)
        );
        assert!(matches!(
            add_change(Some(999), 10, 2),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            add_change(Some(i32::MAX), 10, 1000),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            adjust_change(MAX_LINE_QUANTITY, 10, QuantityOperation::Increase),
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(
            adjust_change(MAX_LINE_QUANTITY, 10, QuantityOperation::Decrease)
                .unwrap()
                .quantity,
            Some(MAX_LINE_QUANTITY - 1)
        );
    }

    #[test]
    fn removing_a_line_subtracts_price_times_quantity() {
        assert_eq!(remove_change(4, 125).total_delta, -500);
    }

    #[test]
    fn total_matches_lines_through_a_mixed_sequence() {
        let mut ledger = Ledger { total: 0, lines: Vec::new() };
        ledger.apply(0, 500, add_change(None, 500, 2).unwrap());
        ledger.apply(1, 120, add_change(None, 120, 1).unwrap());
        ledger.apply(0, 500, add_change(Some(2), 500, 3).unwrap());
        ledger.apply(1, 120, adjust_change(1, 120, QuantityOperation::Increase).unwrap());
        ledger.apply(1, 120, adjust_change(2, 120, QuantityOperation::Decrease).unwrap());
        ledger.apply(1, 120, adjust_change(1, 120, QuantityOperation::Decrease).unwrap());
        ledger.apply(0, 500, adjust_change(5, 500, QuantityOperation::Decrease).unwrap());
        ledger.apply(0, 500, remove_change(4, 500));
        assert_eq!(ledger.total, 0);
        assert!(ledger.lines.is_empty());
    }
}
