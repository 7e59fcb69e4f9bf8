pub mod account_service;
pub mod auth_service;
pub mod cart_service;
pub mod image_store;
pub mod mailer;
pub mod order_service;
pub mod product_service;
pub mod wishlist_service;
