use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        accounts::{
            AddressFields, AddressList, CreateAddressRequest, UpdateAddressRequest,
            UpdateVendorProfileRequest, VendorFilter, VendorList, VendorProfileForm,
            VerifyVendorRequest,
        },
        auth::{AccessToken, LoginRequest, RefreshRequest, SignupRequest, TokenPair},
        cart::{AddToCartRequest, QuantityOperation},
        orders::{
            BillingContact, CheckoutRequest, OrderList, OrderReceipt, UpdateOrderItemStatusRequest,
            VendorOrderItem, VendorOrderList,
        },
        products::{ProductForm, ProductList},
        wishlist::AddWishlistItemRequest,
    },
    models::{
        Address, AddressType, BillingAddress, BillingDetail, Cart, CartItem, Category, Order,
        OrderItem, OrderItemStatus, Product, ProductSummary, Role, Size, StoredImage, User, Vendor,
        Wishlist, WishlistItem,
    },
    response::{ApiResponse, Meta},
    routes::{
        accounts, admin, auth, cart, health, orders, params, products as product_routes, wishlist,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::signup,
        auth::activate,
        auth::login,
        auth::refresh_token,
        accounts::list_addresses,
        accounts::create_address,
        accounts::update_address,
        accounts::delete_address,
        accounts::get_vendor_profile,
        accounts::create_vendor_profile,
        accounts::update_vendor_profile,
        accounts::delete_vendor_profile,
        product_routes::list_products,
        product_routes::get_product,
        product_routes::list_vendor_products,
        product_routes::get_vendor_product,
        product_routes::create_product,
        product_routes::replace_product,
        product_routes::delete_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::adjust_quantity,
        cart::remove_from_cart,
        wishlist::get_wishlist,
        wishlist::add_to_wishlist,
        wishlist::remove_from_wishlist,
        orders::checkout,
        orders::list_customer_orders,
        orders::get_customer_order,
        orders::list_vendor_orders,
        orders::update_order_item_status,
        admin::list_vendors,
        admin::verify_vendor
    ),
    components(
        schemas(
            Role,
            AddressType,
            Category,
            Size,
            OrderItemStatus,
            User,
            Address,
            StoredImage,
            Vendor,
            Product,
            ProductSummary,
            Cart,
            CartItem,
            Wishlist,
            WishlistItem,
            Order,
            OrderItem,
            BillingDetail,
            BillingAddress,
            SignupRequest,
            LoginRequest,
            RefreshRequest,
            TokenPair,
            AccessToken,
            AddressFields,
            AddressList,
            CreateAddressRequest,
            UpdateAddressRequest,
            VendorProfileForm,
            UpdateVendorProfileRequest,
            VerifyVendorRequest,
            VendorFilter,
            VendorList,
            ProductForm,
            ProductList,
            AddToCartRequest,
            QuantityOperation,
            AddWishlistItemRequest,
            BillingContact,
            CheckoutRequest,
            OrderReceipt,
            OrderList,
            VendorOrderItem,
            VendorOrderList,
            UpdateOrderItemStatusRequest,
            params::Pagination,
            params::ProductFilter,
            params::OrderItemFilter,
            params::ProductSortBy,
            params::SortOrder,
            Meta,
            ApiResponse<User>,
            ApiResponse<Vendor>,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Cart>,
            ApiResponse<Wishlist>,
            ApiResponse<OrderReceipt>,
            ApiResponse<OrderList>,
            ApiResponse<VendorOrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Signup, activation and tokens"),
        (name = "Accounts", description = "Addresses and vendor profile"),
        (name = "Products", description = "Public catalog"),
        (name = "Vendor products", description = "Listings owned by the signed-in vendor"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Wishlist", description = "Wishlist endpoints"),
        (name = "Orders", description = "Checkout and fulfilment"),
        (name = "Admin", description = "Vendor verification"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
