use marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, pool_of, run_migrations},
    services::{
        auth_service::{hash_password, provision_shopping},
        product_service::{find_or_create_color, find_or_create_size},
    },
};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;
    let pool = pool_of(&orm);

    let admin_id = ensure_user(&pool, "Admin", "admin@example.com", "admin123", "admin").await?;
    let vendor_user_id =
        ensure_user(&pool, "Vendor", "vendor@example.com", "vendor123", "vendor").await?;
    let customer_id =
        ensure_user(&pool, "Customer", "customer@example.com", "customer123", "customer").await?;
    provision_shopping(&orm, customer_id).await?;

    let vendor_id = ensure_vendor(&pool, vendor_user_id).await?;
    seed_products(&orm, &pool, vendor_id).await?;

    println!(
        "Seed completed. Admin ID: {admin_id}, Vendor ID: {vendor_id}, Customer ID: {customer_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password)?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, name, email, phone, password_hash, role, is_active)
        VALUES ($1, $2, $3, '9876543210', $4, $5, TRUE)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, is_active = TRUE
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(user_id)
}

async fn ensure_vendor(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<Uuid> {
    let placeholder = serde_json::json!({ "url": "", "public_id": "" });

    let (vendor_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO vendors (
            id, user_id, shop_name, aadhar_number, aadhar_image, pancard_number,
            pancard_image, gst_number, business_license, is_verified, is_document_added
        )
        VALUES ($1, $2, 'Ferris Costumes', '123456789012', $3, 'ABCDE1234F', $3,
                '22ABCDE1234F1Z5', $3, TRUE, TRUE)
        ON CONFLICT (user_id) DO UPDATE SET is_verified = TRUE
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(placeholder)
    .fetch_one(pool)
    .await?;

    Ok(vendor_id)
}

async fn seed_products(
    orm: &DatabaseConnection,
    pool: &sqlx::PgPool,
    vendor_id: Uuid,
) -> anyhow::Result<()> {
    let products = vec![
        ("Pirate Captain Coat", "mens", "Long coat with brass buttons", 4500, 20, "Black", "L"),
        ("Fairy Wings Dress", "kids", "Tulle dress with detachable wings", 1800, 35, "Pink", "S"),
        ("Royal Gown", "women", "Velvet gown for period plays", 6200, 10, "Red", "M"),
        ("Ninja Suit", "kids", "Stretch suit with hood", 1200, 50, "Black", "XL"),
    ];

    for (name, category, desc, price, stock, color, size) in products {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM products WHERE vendor_id = $1 AND name = $2")
                .bind(vendor_id)
                .bind(name)
                .fetch_optional(pool)
                .await?;
        if existing.is_some() {
            continue;
        }

        let product_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO products (id, vendor_id, name, category, subcategory, price, stock, description)
            VALUES ($1, $2, $3, $4, 'Clothing', $5, $6, $7)
            "#,
        )
        .bind(product_id)
        .bind(vendor_id)
        .bind(name)
        .bind(category)
        .bind(price as i64)
        .bind(stock)
        .bind(desc)
        .execute(pool)
        .await?;

        let color_id = find_or_create_color(orm, color).await?;
        let size_id = find_or_create_size(orm, size).await?;
        sqlx::query("INSERT INTO product_colors (product_id, color_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(product_id)
            .bind(color_id)
            .execute(pool)
            .await?;
        sqlx::query("INSERT INTO product_sizes (product_id, size_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(product_id)
            .bind(size_id)
            .execute(pool)
            .await?;
    }

    println!("Seeded products");
    Ok(())
}
