pub mod addresses;
pub mod audit_logs;
pub mod billing_details;
pub mod cart_items;
pub mod carts;
pub mod colors;
pub mod order_items;
pub mod orders;
pub mod product_colors;
pub mod product_images;
pub mod product_sizes;
pub mod products;
pub mod sizes;
pub mod users;
pub mod vendors;
pub mod wishlist_items;
pub mod wishlists;

pub use addresses::Entity as Addresses;
pub use audit_logs::Entity as AuditLogs;
pub use billing_details::Entity as BillingDetails;
pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use colors::Entity as Colors;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_colors::Entity as ProductColors;
pub use product_images::Entity as ProductImages;
pub use product_sizes::Entity as ProductSizes;
pub use products::Entity as Products;
pub use sizes::Entity as Sizes;
pub use users::Entity as Users;
pub use vendors::Entity as Vendors;
pub use wishlist_items::Entity as WishlistItems;
pub use wishlists::Entity as Wishlists;
