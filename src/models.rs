use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Vendor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Vendor => "vendor",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "vendor" => Ok(Role::Vendor),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::BadRequest(format!("unknown role `{other}`"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Default,
    Billing,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Default => "default",
            AddressType::Billing => "billing",
        }
    }
}

impl FromStr for AddressType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(AddressType::Default),
            "billing" => Ok(AddressType::Billing),
            other => Err(AppError::BadRequest(format!("unknown address type `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Mens,
    Women,
    Kids,
    Cosmetics,
    Accessories,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Mens => "mens",
            Category::Women => "women",
            Category::Kids => "kids",
            Category::Cosmetics => "cosmetics",
            Category::Accessories => "accessories",
        }
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mens" => Ok(Category::Mens),
            "women" => Ok(Category::Women),
            "kids" => Ok(Category::Kids),
            "cosmetics" => Ok(Category::Cosmetics),
            "accessories" => Ok(Category::Accessories),
            other => Err(AppError::BadRequest(format!("unknown category `{other}`"))),
        }
    }
}

/// Garment sizes offered by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Size {
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

impl Size {
    pub fn as_str(&self) -> &'static str {
        match self {
            Size::Xs => "XS",
            Size::S => "S",
            Size::M => "M",
            Size::L => "L",
            Size::Xl => "XL",
            Size::Xxl => "XXL",
        }
    }
}

impl FromStr for Size {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "XS" => Ok(Size::Xs),
            "S" => Ok(Size::S),
            "M" => Ok(Size::M),
            "L" => Ok(Size::L),
            "XL" => Ok(Size::Xl),
            "XXL" => Ok(Size::Xxl),
            _ => Err(AppError::BadRequest(format!("unknown size `{s}`"))),
        }
    }
}

/// Fulfilment state of a single order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderItemStatus {
    Placed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderItemStatus::Placed => "placed",
            OrderItemStatus::Processing => "processing",
            OrderItemStatus::Shipped => "shipped",
            OrderItemStatus::Delivered => "delivered",
            OrderItemStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderItemStatus::Delivered | OrderItemStatus::Cancelled)
    }

    /// Terminal states are final and nothing moves back to `placed`.
    pub fn can_transition_to(&self, next: OrderItemStatus) -> bool {
        !self.is_terminal() && next != OrderItemStatus::Placed && next != *self
    }
}

impl FromStr for OrderItemStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderItemStatus::Placed),
            "processing" => Ok(OrderItemStatus::Processing),
            "shipped" => Ok(OrderItemStatus::Shipped),
            "delivered" => Ok(OrderItemStatus::Delivered),
            "cancelled" => Ok(OrderItemStatus::Cancelled),
            other => Err(AppError::BadRequest(format!("unknown order status `{other}`"))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub id: Uuid,
    pub address: String,
    pub pin_code: String,
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(rename = "type")]
    pub kind: AddressType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reference to a file held by the image host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredImage {
    pub url: String,
    pub public_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Vendor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub shop_name: String,
    pub aadhar_number: String,
    pub aadhar_image: StoredImage,
    pub pancard_number: String,
    pub pancard_image: StoredImage,
    pub gst_number: String,
    pub business_license: StoredImage,
    pub is_verified: bool,
    pub is_document_added: bool,
    pub bio: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    pub category: Category,
    pub subcategory: Option<String>,
    pub rating: i32,
    pub price: i64,
    pub discount: i32,
    pub stock: i32,
    pub description: String,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
    pub discount: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItem {
    pub id: Uuid,
    pub product: ProductSummary,
    pub quantity: i32,
    pub size: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub id: Uuid,
    pub total_price: i64,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WishlistItem {
    pub id: Uuid,
    pub product: ProductSummary,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Wishlist {
    pub id: Uuid,
    pub total_price: i64,
    pub items: Vec<WishlistItem>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub order_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub size: String,
    pub color: String,
    pub status: OrderItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BillingDetail {
    pub id: Uuid,
    pub order_id: Uuid,
    pub name: String,
    pub address_id: Uuid,
    pub phone: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// The postal address an order was billed to, as entered at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BillingAddress {
    pub address: String,
    pub pin_code: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse_case_insensitively() {
        assert_eq!("xl".parse::<Size>().unwrap(), Size::Xl);
        assert_eq!(" XXL ".parse::<Size>().unwrap(), Size::Xxl);
        assert!("XXXL".parse::<Size>().is_err());
    }

    #[test]
    fn size_serializes_as_label() {
        assert_eq!(serde_json::to_string(&Size::Xs).unwrap(), "\"XS\"");
    }

    #[test]
    fn terminal_statuses_are_final() {
        use OrderItemStatus::*;
        for next in [Placed, Processing, Shipped, Delivered, Cancelled] {
            assert!(!Delivered.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn open_statuses_move_forward_but_not_back_to_placed() {
        use OrderItemStatus::*;
        assert!(Placed.can_transition_to(Processing));
        assert!(Placed.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Shipped.can_transition_to(Placed));
        assert!(!Processing.can_transition_to(Processing));
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Customer, Role::Vendor, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("root".parse::<Role>().is_err());
    }
}
