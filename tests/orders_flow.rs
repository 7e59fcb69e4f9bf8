mod common;

use common::TestApp;
use marketplace_api::{
    dto::{
        accounts::{AddressFields, UpdateAddressRequest},
        cart::{AddToCartRequest, QuantityOperation},
        orders::{BillingContact, CheckoutRequest, UpdateOrderItemStatusRequest},
        wishlist::AddWishlistItemRequest,
    },
    entity::{OrderItems, Orders, orders},
    error::AppError,
    middleware::auth::AuthUser,
    models::{AddressType, OrderItemStatus, Role, Size},
    routes::params::{OrderItemFilter, Pagination, ProductFilter},
    services::{account_service, cart_service, order_service, product_service, wishlist_service},
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect};
use uuid::Uuid;

fn add(product_id: Uuid, quantity: i32, size: Size, color: &str) -> AddToCartRequest {
    AddToCartRequest {
        product_id,
        quantity,
        size,
        color: color.to_string(),
    }
}

fn checkout_request(pin_code: &str) -> CheckoutRequest {
    checkout_to(pin_code, "Pune")
}

fn checkout_to(pin_code: &str, city: &str) -> CheckoutRequest {
    CheckoutRequest {
        contact: BillingContact {
            name: "Test Buyer".into(),
            phone: "9876543210".into(),
            email: "buyer@example.com".into(),
        },
        address: AddressFields {
            address: "12 MG Road".into(),
            pin_code: pin_code.to_string(),
            city: city.to_string(),
            state: "Maharashtra".into(),
            country: "India".into(),
        },
        order_note: Some("Leave at the door".into()),
    }
}

fn first_page() -> Pagination {
    Pagination {
        page: Some(1),
        per_page: Some(100),
    }
}

async fn cart_total(app: &TestApp, customer: &AuthUser) -> anyhow::Result<(i64, usize)> {
    let cart = cart_service::get_cart(&app.state, customer)
        .await?
        .data
        .expect("cart");
    let sum: i64 = cart
        .items
        .iter()
        .map(|i| i.product.price * i64::from(i.quantity))
        .sum();
    assert_eq!(cart.total_price, sum, "cart total must equal its lines");
    Ok((cart.total_price, cart.items.len()))
}

async fn wishlist_total(app: &TestApp, customer: &AuthUser) -> anyhow::Result<(i64, usize)> {
    let wishlist = wishlist_service::get_wishlist(&app.state, customer)
        .await?
        .data
        .expect("wishlist");
    let sum: i64 = wishlist.items.iter().map(|i| i.product.price).sum();
    assert_eq!(wishlist.total_price, sum, "wishlist total must equal its items");
    Ok((wishlist.total_price, wishlist.items.len()))
}

/// Rows written for the customer's orders, read straight from the tables.
async fn order_rows(app: &TestApp, customer: &AuthUser) -> anyhow::Result<(u64, u64)> {
    let orders = Orders::find()
        .filter(orders::Column::UserId.eq(customer.user_id))
        .count(&app.state.orm)
        .await?;
    let items = OrderItems::find()
        .inner_join(Orders)
        .filter(orders::Column::UserId.eq(customer.user_id))
        .count(&app.state.orm)
        .await?;
    Ok((orders, items))
}

async fn stock_of(app: &TestApp, id: Uuid) -> anyhow::Result<i32> {
    let product = product_service::get_product(&app.state, id)
        .await?
        .data
        .expect("product");
    Ok(product.stock)
}

#[tokio::test]
async fn cart_total_follows_every_change() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let coat = common::product(&app, &vendor, 500, 10).await?;
    let hat = common::product(&app, &vendor, 300, 10).await?;
    let customer = common::active_user(&app, Role::Customer).await?;

    let line = cart_service::add_item(&app.state, &customer, add(coat.id, 2, Size::M, "Red"))
        .await?
        .data
        .expect("line");
    assert_eq!(cart_total(&app, &customer).await?, (1000, 1));

    // Same product, size and color merges into the existing line.
    let merged = cart_service::add_item(&app.state, &customer, add(coat.id, 1, Size::M, " Red "))
        .await?
        .data
        .expect("line");
    assert_eq!(merged.id, line.id);
    assert_eq!(merged.quantity, 3);
    assert_eq!(cart_total(&app, &customer).await?, (1500, 1));

    let hat_line = cart_service::add_item(&app.state, &customer, add(hat.id, 1, Size::L, "Red"))
        .await?
        .data
        .expect("line");
    assert_eq!(cart_total(&app, &customer).await?, (1800, 2));

    cart_service::adjust_item(&app.state, &customer, hat_line.id, QuantityOperation::Increase)
        .await?;
    assert_eq!(cart_total(&app, &customer).await?, (2100, 2));

    cart_service::adjust_item(&app.state, &customer, hat_line.id, QuantityOperation::Decrease)
        .await?;
    cart_service::adjust_item(&app.state, &customer, hat_line.id, QuantityOperation::Decrease)
        .await?;
    assert_eq!(cart_total(&app, &customer).await?, (1500, 1));

    let gone =
        cart_service::adjust_item(&app.state, &customer, hat_line.id, QuantityOperation::Decrease)
            .await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));

    cart_service::remove_item(&app.state, &customer, line.id).await?;
    assert_eq!(cart_total(&app, &customer).await?, (0, 0));

    // Another customer cannot touch someone else's line.
    let stranger = common::active_user(&app, Role::Customer).await?;
    let foreign = cart_service::add_item(&app.state, &customer, add(coat.id, 1, Size::M, "Red"))
        .await?
        .data
        .expect("line");
    let denied = cart_service::remove_item(&app.state, &stranger, foreign.id).await;
    assert!(matches!(denied, Err(AppError::NotFound(_))));

    let vendor_cart = cart_service::get_cart(&app.state, &vendor).await;
    assert!(matches!(vendor_cart, Err(AppError::Forbidden)));

    Ok(())
}

#[tokio::test]
async fn wishlist_lists_a_product_once() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let gown = common::product(&app, &vendor, 700, 3).await?;
    let customer = common::active_user(&app, Role::Customer).await?;

    let first = wishlist_service::add_item(
        &app.state,
        &customer,
        AddWishlistItemRequest { product_id: gown.id },
    )
    .await?;
    assert_eq!(first.message, "Added to wishlist");
    let second = wishlist_service::add_item(
        &app.state,
        &customer,
        AddWishlistItemRequest { product_id: gown.id },
    )
    .await?;
    assert_eq!(second.message, "Product is already in the wishlist");

    let wishlist = wishlist_service::get_wishlist(&app.state, &customer)
        .await?
        .data
        .expect("wishlist");
    assert_eq!(wishlist.items.len(), 1);
    assert_eq!(wishlist.total_price, 700);

    let item_id = first.data.expect("item").id;
    wishlist_service::remove_item(&app.state, &customer, item_id).await?;
    let wishlist = wishlist_service::get_wishlist(&app.state, &customer)
        .await?
        .data
        .expect("wishlist");
    assert!(wishlist.items.is_empty());
    assert_eq!(wishlist.total_price, 0);

    Ok(())
}

#[tokio::test]
async fn checkout_places_order_and_empties_cart() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let coat = common::product(&app, &vendor, 500, 5).await?;
    let customer = common::active_user(&app, Role::Customer).await?;

    let empty = order_service::checkout(&app.state, &customer, checkout_request("411001")).await;
    assert!(matches!(empty, Err(AppError::EmptyCart)));

    cart_service::add_item(&app.state, &customer, add(coat.id, 2, Size::M, "Red")).await?;

    let receipt = order_service::checkout(&app.state, &customer, checkout_request("411001"))
        .await?
        .data
        .expect("receipt");
    assert_eq!(receipt.order.amount, 1000);
    assert_eq!(receipt.order.order_note.as_deref(), Some("Leave at the door"));
    assert_eq!(receipt.items.len(), 1);
    assert_eq!(receipt.items[0].quantity, 2);
    assert_eq!(receipt.items[0].status, OrderItemStatus::Placed);
    assert_eq!(receipt.address.city, "Pune");
    assert_eq!(receipt.address.pin_code, "411001");

    assert_eq!(cart_total(&app, &customer).await?, (0, 0));
    assert_eq!(stock_of(&app, coat.id).await?, 3);

    let fetched = order_service::get_customer_order(&app.state, &customer, receipt.order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(fetched.order.id, receipt.order.id);
    let orders = order_service::list_customer_orders(&app.state, &customer, first_page())
        .await?
        .data
        .expect("orders");
    assert_eq!(orders.items.len(), 1);

    // Orders are private to the customer who placed them.
    let other = common::active_user(&app, Role::Customer).await?;
    let hidden = order_service::get_customer_order(&app.state, &other, receipt.order.id).await;
    assert!(matches!(hidden, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn failed_checkout_changes_nothing() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let coat = common::product(&app, &vendor, 500, 1).await?;
    let customer = common::active_user(&app, Role::Customer).await?;

    cart_service::add_item(&app.state, &customer, add(coat.id, 1, Size::M, "Red")).await?;

    let invalid = order_service::checkout(&app.state, &customer, checkout_request("!")).await;
    assert!(matches!(invalid, Err(AppError::Validation(_))));
    assert_eq!(cart_total(&app, &customer).await?, (500, 1));
    assert_eq!(stock_of(&app, coat.id).await?, 1);
    assert_eq!(order_rows(&app, &customer).await?, (0, 0));

    cart_service::add_item(&app.state, &customer, add(coat.id, 1, Size::M, "Red")).await?;
    let short = order_service::checkout(&app.state, &customer, checkout_request("411001")).await;
    assert!(matches!(short, Err(AppError::BadRequest(_))));
    assert_eq!(cart_total(&app, &customer).await?, (1000, 1));
    assert_eq!(stock_of(&app, coat.id).await?, 1);
    assert_eq!(order_rows(&app, &customer).await?, (0, 0));

    let orders = order_service::list_customer_orders(&app.state, &customer, first_page())
        .await?
        .data
        .expect("orders");
    assert!(orders.items.is_empty());

    // A line cannot grow past the per-line cap.
    let cap = common::product(&app, &vendor, 1, 5000).await?;
    cart_service::add_item(&app.state, &customer, add(cap.id, 1000, Size::M, "Red")).await?;
    let over = cart_service::add_item(&app.state, &customer, add(cap.id, 1, Size::M, "Red")).await;
    assert!(matches!(over, Err(AppError::BadRequest(_))));
    assert_eq!(cart_total(&app, &customer).await?, (2000, 2));

    Ok(())
}

// Replacing keeps the id, swaps colors, sizes and images, and reprices carts and wishlists.
#[tokio::test]
async fn replacing_a_product_swaps_its_associations() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let name = format!("cape-{}", Uuid::new_v4().simple());
    let created = product_service::create_product(
        &app.state,
        &vendor,
        common::product_form(&name, 500, 10, &["Red", "Blue", "Red"], &["L", "M"]),
    )
    .await?
    .data
    .expect("product");
    assert_eq!(created.colors, vec!["Blue".to_string(), "Red".to_string()]);
    assert_eq!(created.sizes, vec!["M".to_string(), "L".to_string()]);
    assert_eq!(created.images.len(), 2);
    assert_eq!(created.subcategory.as_deref(), Some("Clothing"));

    let found = product_service::list_products(
        &app.state,
        ProductFilter {
            q: Some(name.to_uppercase()),
            ..Default::default()
        },
        first_page(),
    )
    .await?
    .data
    .expect("list");
    assert_eq!(found.items.len(), 1);

    let customer = common::active_user(&app, Role::Customer).await?;
    cart_service::add_item(&app.state, &customer, add(created.id, 2, Size::M, "Red")).await?;
    wishlist_service::add_item(
        &app.state,
        &customer,
        AddWishlistItemRequest {
            product_id: created.id,
        },
    )
    .await?;
    let held_before = app.images.stored_count();

    let replaced = product_service::replace_product(
        &app.state,
        &vendor,
        created.id,
        common::product_form(&name, 700, 4, &["Green"], &["S"]),
    )
    .await?
    .data
    .expect("product");
    assert_eq!(replaced.id, created.id);
    assert_eq!(replaced.price, 700);
    assert_eq!(replaced.colors, vec!["Green".to_string()]);
    assert_eq!(replaced.sizes, vec!["S".to_string()]);
    assert_eq!(replaced.images.len(), 2);
    assert!(replaced.images.iter().all(|url| !created.images.contains(url)));
    assert_eq!(app.images.stored_count(), held_before);

    assert_eq!(cart_total(&app, &customer).await?, (1400, 1));
    let wishlist = wishlist_service::get_wishlist(&app.state, &customer)
        .await?
        .data
        .expect("wishlist");
    assert_eq!(wishlist.total_price, 700);

    let stranger = common::vendor(&app).await?;
    let denied = product_service::replace_product(
        &app.state,
        &stranger,
        created.id,
        common::product_form(&name, 1, 1, &["Red"], &["M"]),
    )
    .await;
    assert!(matches!(denied, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn failed_product_upload_is_cleaned_up() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let held_before = app.images.stored_count();

    app.images.fail_after(Some(1));
    let result = product_service::create_product(
        &app.state,
        &vendor,
        common::product_form("half uploaded", 100, 1, &["Red"], &["M"]),
    )
    .await;
    assert!(matches!(result, Err(AppError::Upstream(_))));
    assert_eq!(app.images.stored_count(), held_before);
    app.images.fail_after(None);

    let no_images = {
        let mut form = common::product_form("no images", 100, 1, &["Red"], &["M"]);
        form.files.clear();
        product_service::create_product(&app.state, &vendor, form).await
    };
    assert!(matches!(no_images, Err(AppError::BadRequest(_))));

    let mine = product_service::list_vendor_products(&app.state, &vendor, first_page())
        .await?
        .data
        .expect("list");
    assert!(mine.items.is_empty());

    Ok(())
}

#[tokio::test]
async fn vendor_moves_order_items_forward() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let coat = common::product(&app, &vendor, 500, 5).await?;
    let customer = common::active_user(&app, Role::Customer).await?;
    cart_service::add_item(&app.state, &customer, add(coat.id, 1, Size::M, "Red")).await?;
    order_service::checkout(&app.state, &customer, checkout_request("411001")).await?;

    let placed = order_service::list_vendor_order_items(
        &app.state,
        &vendor,
        OrderItemFilter {
            status: Some(OrderItemStatus::Placed),
        },
        first_page(),
    )
    .await?
    .data
    .expect("items");
    assert_eq!(placed.items.len(), 1);
    let entry = &placed.items[0];
    assert_eq!(entry.product.id, coat.id);
    assert!(entry.billing.is_some());
    let item_id = entry.item.id;

    let step = |status| UpdateOrderItemStatusRequest { status };
    let moved = order_service::update_order_item_status(
        &app.state,
        &vendor,
        item_id,
        step(OrderItemStatus::Processing),
    )
    .await?
    .data
    .expect("item");
    assert_eq!(moved.status, OrderItemStatus::Processing);

    let back = order_service::update_order_item_status(
        &app.state,
        &vendor,
        item_id,
        step(OrderItemStatus::Placed),
    )
    .await;
    assert!(matches!(back, Err(AppError::BadRequest(_))));

    order_service::update_order_item_status(
        &app.state,
        &vendor,
        item_id,
        step(OrderItemStatus::Delivered),
    )
    .await?;
    let after_final = order_service::update_order_item_status(
        &app.state,
        &vendor,
        item_id,
        step(OrderItemStatus::Cancelled),
    )
    .await;
    assert!(matches!(after_final, Err(AppError::BadRequest(_))));

    let stranger = common::vendor(&app).await?;
    let foreign = order_service::update_order_item_status(
        &app.state,
        &stranger,
        item_id,
        step(OrderItemStatus::Shipped),
    )
    .await;
    assert!(matches!(foreign, Err(AppError::NotFound(_))));

    // Ordered products stay for the order history.
    let delete = product_service::delete_product(&app.state, &vendor, coat.id).await;
    assert!(matches!(delete, Err(AppError::Conflict(_))));

    Ok(())
}

// Later checkouts and address edits leave earlier receipts as they were.
#[tokio::test]
async fn orders_keep_the_billing_address_they_were_placed_with() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let coat = common::product(&app, &vendor, 500, 5).await?;
    let customer = common::active_user(&app, Role::Customer).await?;

    cart_service::add_item(&app.state, &customer, add(coat.id, 1, Size::M, "Red")).await?;
    let first = order_service::checkout(&app.state, &customer, checkout_to("411001", "Pune"))
        .await?
        .data
        .expect("receipt");

    cart_service::add_item(&app.state, &customer, add(coat.id, 1, Size::M, "Red")).await?;
    let second = order_service::checkout(&app.state, &customer, checkout_to("560001", "Bengaluru"))
        .await?
        .data
        .expect("receipt");
    assert_eq!(second.address.city, "Bengaluru");

    account_service::update_address(
        &app.state,
        &customer,
        AddressType::Billing,
        UpdateAddressRequest {
            address: None,
            pin_code: Some("600001".into()),
            city: Some("Chennai".into()),
            state: None,
            country: None,
        },
    )
    .await?;

    let fetched = order_service::get_customer_order(&app.state, &customer, first.order.id)
        .await?
        .data
        .expect("order");
    assert_eq!(fetched.address.city, "Pune");
    assert_eq!(fetched.address.pin_code, "411001");

    let sold = order_service::list_vendor_order_items(
        &app.state,
        &vendor,
        OrderItemFilter::default(),
        first_page(),
    )
    .await?
    .data
    .expect("items");
    let mut cities: Vec<String> = sold
        .items
        .iter()
        .filter_map(|entry| entry.address.as_ref().map(|a| a.city.clone()))
        .collect();
    cities.sort();
    assert_eq!(cities, vec!["Bengaluru".to_string(), "Pune".to_string()]);

    Ok(())
}

#[tokio::test]
async fn deleting_a_product_reprices_carts_and_wishlists() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let coat = common::product(&app, &vendor, 500, 10).await?;
    let hat = common::product(&app, &vendor, 300, 10).await?;
    let customer = common::active_user(&app, Role::Customer).await?;

    cart_service::add_item(&app.state, &customer, add(coat.id, 2, Size::M, "Red")).await?;
    cart_service::add_item(&app.state, &customer, add(coat.id, 1, Size::L, "Red")).await?;
    cart_service::add_item(&app.state, &customer, add(hat.id, 1, Size::M, "Red")).await?;
    for product_id in [coat.id, hat.id] {
        wishlist_service::add_item(&app.state, &customer, AddWishlistItemRequest { product_id })
            .await?;
    }
    assert_eq!(cart_total(&app, &customer).await?, (1800, 3));
    assert_eq!(wishlist_total(&app, &customer).await?, (800, 2));
    let held_before = app.images.stored_count();

    product_service::delete_product(&app.state, &vendor, coat.id).await?;

    assert_eq!(cart_total(&app, &customer).await?, (300, 1));
    assert_eq!(wishlist_total(&app, &customer).await?, (300, 1));
    assert_eq!(app.images.stored_count(), held_before - 2);
    let gone = product_service::get_product(&app.state, coat.id).await;
    assert!(matches!(gone, Err(AppError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn deleting_a_vendor_profile_reprices_carts_and_wishlists() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let coat = common::product(&app, &vendor, 500, 10).await?;
    let cape = common::product(&app, &vendor, 200, 10).await?;
    let other_vendor = common::vendor(&app).await?;
    let hat = common::product(&app, &other_vendor, 300, 10).await?;
    let customer = common::active_user(&app, Role::Customer).await?;

    cart_service::add_item(&app.state, &customer, add(coat.id, 2, Size::M, "Red")).await?;
    cart_service::add_item(&app.state, &customer, add(cape.id, 1, Size::M, "Red")).await?;
    cart_service::add_item(&app.state, &customer, add(hat.id, 1, Size::M, "Red")).await?;
    for product_id in [coat.id, hat.id] {
        wishlist_service::add_item(&app.state, &customer, AddWishlistItemRequest { product_id })
            .await?;
    }
    assert_eq!(cart_total(&app, &customer).await?, (1500, 3));
    assert_eq!(wishlist_total(&app, &customer).await?, (800, 2));

    account_service::delete_vendor_profile(&app.state, &vendor).await?;

    assert_eq!(cart_total(&app, &customer).await?, (300, 1));
    assert_eq!(wishlist_total(&app, &customer).await?, (300, 1));
    let missing = account_service::get_vendor_profile(&app.state, &vendor).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    // A vendor with orders keeps everything, totals included.
    let sold = common::product(&app, &other_vendor, 100, 10).await?;
    let buyer = common::active_user(&app, Role::Customer).await?;
    cart_service::add_item(&app.state, &buyer, add(sold.id, 1, Size::M, "Red")).await?;
    order_service::checkout(&app.state, &buyer, checkout_request("411001")).await?;
    let refused = account_service::delete_vendor_profile(&app.state, &other_vendor).await;
    assert!(matches!(refused, Err(AppError::Conflict(_))));
    assert_eq!(cart_total(&app, &customer).await?, (300, 1));
    assert_eq!(wishlist_total(&app, &customer).await?, (300, 1));

    Ok(())
}

// Adds racing a price change must end priced at whatever the product costs afterwards.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn adds_racing_a_reprice_keep_totals_consistent() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let vendor = common::vendor(&app).await?;
    let name = format!("racer-{}", Uuid::new_v4().simple());
    let product = product_service::create_product(
        &app.state,
        &vendor,
        common::product_form(&name, 500, 100, &["Red"], &["M"]),
    )
    .await?
    .data
    .expect("product");
    let customer = common::active_user(&app, Role::Customer).await?;

    for round in 0..20_i64 {
        let state = app.state.clone();
        let shopper = customer.clone();
        let product_id = product.id;
        let adding = tokio::spawn(async move {
            let cart = cart_service::add_item(&state, &shopper, add(product_id, 1, Size::M, "Red"))
                .await
                .map(|_| ());
            let wish =
                wishlist_service::add_item(&state, &shopper, AddWishlistItemRequest { product_id })
                    .await
                    .map(|_| ());
            cart.and(wish)
        });

        let state = app.state.clone();
        let owner = vendor.clone();
        let form = common::product_form(&name, 700 + round, 100, &["Red"], &["M"]);
        let replacing =
            tokio::spawn(async move { product_service::replace_product(&state, &owner, product_id, form).await });

        adding.await??;
        replacing.await??;

        let (total, lines) = cart_total(&app, &customer).await?;
        assert_eq!(lines, 1);
        assert_eq!(total, (700 + round) * (round + 1), "round {round}");
        assert_eq!(wishlist_total(&app, &customer).await?, (700 + round, 1));
    }

    Ok(())
}
