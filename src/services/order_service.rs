use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, LockType},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    audit,
    dto::{
        accounts::AddressFields,
        orders::{
            CheckoutRequest, OrderList, OrderReceipt, UpdateOrderItemStatusRequest,
            VendorOrderItem, VendorOrderList,
        },
    },
    entity::{
        BillingDetails, CartItems, OrderItems, Orders, Products,
        addresses::{ActiveModel as AddressActive, Model as AddressModel},
        billing_details::{
            ActiveModel as BillingActive, Column as BillingCol, Model as BillingModel,
        },
        cart_items::Column as CartItemCol,
        carts::ActiveModel as CartActive,
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Model as OrderModel},
        products::Column as ProdCol,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, Capability},
    models::{AddressType, BillingAddress, BillingDetail, Order, OrderItem, OrderItemStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderItemFilter, Pagination},
    services::{
        account_service::{find_address, vendor_for_user},
        cart_service::locked_cart,
        product_service::summary_from_entity,
    },
    state::AppState,
};

/// Turns the caller's cart into an order in a single transaction.
///
/// Any failure rolls back every step: no order rows are left behind and the
/// cart keeps its items and total.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderReceipt>> {
    user.require(Capability::PlaceOrders)?;

    let txn = state.orm.begin().await?;

    let cart = locked_cart(&txn, user.user_id).await?;
    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .find_also_related(Products)
        .order_by_asc(CartItemCol::CreatedAt)
        .all(&txn)
        .await?;
    if rows.is_empty() {
        return Err(AppError::EmptyCart);
    }

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        amount: Set(cart.total_price),
        order_note: Set(payload
            .order_note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    payload.address.validate()?;
    let address = upsert_billing_address(&txn, user.user_id, payload.address).await?;

    let mut items = Vec::with_capacity(rows.len());
    for (cart_item, product) in rows {
        let product = product.ok_or(AppError::NotFound("Product"))?;

        let reserved = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(cart_item.quantity))
            .filter(ProdCol::Id.eq(product.id))
            .filter(ProdCol::Stock.gte(cart_item.quantity))
            .exec(&txn)
            .await?;
        if reserved.rows_affected == 0 {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }

        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(product.id),
            quantity: Set(cart_item.quantity),
            size: Set(cart_item.size),
            color: Set(cart_item.color),
            status: Set(OrderItemStatus::Placed.as_str().to_string()),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item)?);
    }

    payload.contact.validate()?;
    let billing = BillingActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        name: Set(payload.contact.name),
        address_id: Set(address.id),
        phone: Set(payload.contact.phone),
        email: Set(payload.contact.email),
        address: Set(address.address),
        pin_code: Set(address.pin_code),
        city: Set(address.city),
        state: Set(address.state),
        country: Set(address.country),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    let mut cart: CartActive = cart.into();
    cart.total_price = Set(0);
    cart.updated_at = Set(Utc::now().into());
    cart.update(&txn).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "amount": order.amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order placed",
        OrderReceipt {
            address: billing_address(&billing),
            billing: billing_from_entity(billing),
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// The caller's single billing address, updated in place on every checkout.
/// Orders keep their own copy on the billing detail, so earlier receipts are unaffected.
async fn upsert_billing_address(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    fields: AddressFields,
) -> AppResult<AddressModel> {
    let address = match find_address(txn, user_id, AddressType::Billing).await? {
        Some(existing) => {
            let mut active: AddressActive = existing.into();
            active.address = Set(fields.address);
            active.pin_code = Set(fields.pin_code.trim().to_string());
            active.city = Set(fields.city);
            active.state = Set(fields.state);
            active.country = Set(fields.country);
            active.updated_at = Set(Utc::now().into());
            active.update(txn).await?
        }
        None => {
            AddressActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                address: Set(fields.address),
                pin_code: Set(fields.pin_code.trim().to_string()),
                city: Set(fields.city),
                state: Set(fields.state),
                country: Set(fields.country),
                kind: Set(AddressType::Billing.as_str().to_string()),
                created_at: NotSet,
                updated_at: NotSet,
            }
            .insert(txn)
            .await?
        }
    };
    Ok(address)
}

pub async fn list_customer_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<OrderList>> {
    user.require(Capability::PlaceOrders)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = receipts(&state.orm, orders).await?;
    Ok(ApiResponse::success(
        "OK",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_customer_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderReceipt>> {
    user.require(Capability::PlaceOrders)?;
    let order = Orders::find_by_id(id)
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Order"))?;

    let receipt = receipts(&state.orm, vec![order])
        .await?
        .pop()
        .ok_or(AppError::NotFound("Billing detail"))?;
    Ok(ApiResponse::success("OK", receipt, Some(Meta::empty())))
}

async fn receipts<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<OrderModel>,
) -> AppResult<Vec<OrderReceipt>> {
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();

    let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(ids.clone()))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
    {
        items_by_order
            .entry(item.order_id)
            .or_default()
            .push(order_item_from_entity(item)?);
    }

    let mut billing_by_order: HashMap<Uuid, BillingModel> = BillingDetails::find()
        .filter(BillingCol::OrderId.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|billing| (billing.order_id, billing))
        .collect();

    let mut out = Vec::with_capacity(orders.len());
    for order in orders {
        let Some(billing) = billing_by_order.remove(&order.id) else {
            tracing::warn!(order_id = %order.id, "order without billing detail");
            continue;
        };
        out.push(OrderReceipt {
            address: billing_address(&billing),
            billing: billing_from_entity(billing),
            items: items_by_order.remove(&order.id).unwrap_or_default(),
            order: order_from_entity(order),
        });
    }
    Ok(out)
}

pub async fn list_vendor_order_items(
    state: &AppState,
    user: &AuthUser,
    filter: OrderItemFilter,
    pagination: Pagination,
) -> AppResult<ApiResponse<VendorOrderList>> {
    user.require(Capability::FulfilOrders)?;
    let vendor = vendor_for_user(&state.orm, user.user_id).await?;
    let (page, limit, offset) = pagination.normalize();

    let mut finder = OrderItems::find()
        .find_also_related(Products)
        .filter(ProdCol::VendorId.eq(vendor.id));
    if let Some(status) = filter.status {
        finder = finder.filter(OrderItemCol::Status.eq(status.as_str()));
    }
    let finder = finder.order_by_desc(OrderItemCol::CreatedAt);

    let mut counter = OrderItems::find()
        .inner_join(Products)
        .filter(ProdCol::VendorId.eq(vendor.id));
    if let Some(status) = filter.status {
        counter = counter.filter(OrderItemCol::Status.eq(status.as_str()));
    }
    let total = counter.count(&state.orm).await? as i64;

    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let order_ids: Vec<Uuid> = rows.iter().map(|(item, _)| item.order_id).collect();
    let billing_by_order: HashMap<Uuid, BillingModel> = BillingDetails::find()
        .filter(BillingCol::OrderId.is_in(order_ids))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|billing| (billing.order_id, billing))
        .collect();

    let mut items = Vec::with_capacity(rows.len());
    for (item, product) in rows {
        let product = product.ok_or(AppError::NotFound("Product"))?;
        let (billing, address) = match billing_by_order.get(&item.order_id) {
            Some(billing) => (
                Some(billing_from_entity(billing.clone())),
                Some(billing_address(billing)),
            ),
            None => (None, None),
        };
        items.push(VendorOrderItem {
            item: order_item_from_entity(item)?,
            product: summary_from_entity(&product),
            billing,
            address,
        });
    }

    Ok(ApiResponse::success(
        "OK",
        VendorOrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn update_order_item_status(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateOrderItemStatusRequest,
) -> AppResult<ApiResponse<OrderItem>> {
    user.require(Capability::FulfilOrders)?;
    let vendor = vendor_for_user(&state.orm, user.user_id).await?;

    let txn = state.orm.begin().await?;
    let owned = OrderItems::find_by_id(item_id)
        .inner_join(Products)
        .filter(ProdCol::VendorId.eq(vendor.id))
        .count(&txn)
        .await?;
    if owned == 0 {
        return Err(AppError::NotFound("Order item"));
    }

    let item = OrderItems::find_by_id(item_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("Order item"))?;
    let current: OrderItemStatus = item.status.parse()?;
    if !current.can_transition_to(payload.status) {
        return Err(AppError::BadRequest(format!(
            "Cannot change status from {} to {}",
            current.as_str(),
            payload.status.as_str()
        )));
    }

    let mut active: OrderItemActive = item.into();
    active.status = Set(payload.status.as_str().to_string());
    active.updated_at = Set(Utc::now().into());
    let item = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_item_status",
        "order_items",
        serde_json::json!({
            "item_id": item.id,
            "from": current.as_str(),
            "to": payload.status.as_str(),
        }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated",
        order_item_from_entity(item)?,
        Some(Meta::empty()),
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        amount: model.amount,
        order_note: model.order_note,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> AppResult<OrderItem> {
    Ok(OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        quantity: model.quantity,
        size: model.size,
        color: model.color,
        status: model.status.parse()?,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn billing_address(model: &BillingModel) -> BillingAddress {
    BillingAddress {
        address: model.address.clone(),
        pin_code: model.pin_code.clone(),
        city: model.city.clone(),
        state: model.state.clone(),
        country: model.country.clone(),
    }
}

fn billing_from_entity(model: BillingModel) -> BillingDetail {
    BillingDetail {
        id: model.id,
        order_id: model.order_id,
        name: model.name,
        address_id: model.address_id,
        phone: model.phone,
        email: model.email,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
