use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::accounts::AddressFields,
    models::{BillingAddress, BillingDetail, Order, OrderItem, OrderItemStatus, ProductSummary},
    validation,
};

/// Who pays and how to reach them.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BillingContact {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom(function = "validation::phone_number"))]
    pub phone: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub contact: BillingContact,
    #[serde(flatten)]
    pub address: AddressFields,
    pub order_note: Option<String>,
}

/// A placed order as the customer sees it.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderReceipt {
    pub billing: BillingDetail,
    pub address: BillingAddress,
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<OrderReceipt>,
}

/// An order line as the selling vendor sees it.
#[derive(Debug, Serialize, ToSchema)]
pub struct VendorOrderItem {
    pub item: OrderItem,
    pub product: ProductSummary,
    pub billing: Option<BillingDetail>,
    pub address: Option<BillingAddress>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VendorOrderList {
    pub items: Vec<VendorOrderItem>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderItemStatusRequest {
    pub status: OrderItemStatus,
}
