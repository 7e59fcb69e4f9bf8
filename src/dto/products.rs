use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{Category, Product, Size};

/// Everything a vendor submits for a listing except the image files.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ProductFields {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub category: Category,
    #[validate(length(max = 50))]
    pub subcategory: Option<String>,
    #[validate(range(min = 0, max = 5))]
    pub rating: i32,
    #[validate(range(min = 0))]
    pub price: i64,
    #[validate(range(min = 0, max = 100))]
    pub discount: i32,
    #[validate(range(min = 0))]
    pub stock: i32,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(length(min = 1), custom(function = "color_names"))]
    pub colors: Vec<String>,
    #[validate(length(min = 1))]
    pub sizes: Vec<Size>,
}

fn color_names(colors: &[String]) -> Result<(), validator::ValidationError> {
    if colors
        .iter()
        .all(|c| !c.trim().is_empty() && c.trim().chars().count() <= 20)
    {
        Ok(())
    } else {
        Err(validator::ValidationError::new("color_name"))
    }
}

/// Multipart schema for product create/replace. `colors`, `sizes` and
/// `images` may repeat.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct ProductForm {
    pub name: String,
    pub category: Category,
    pub subcategory: Option<String>,
    pub rating: i32,
    pub price: i64,
    pub discount: i32,
    pub stock: i32,
    pub description: String,
    pub colors: Vec<String>,
    pub sizes: Vec<Size>,
    #[schema(value_type = Vec<String>, format = Binary)]
    pub images: Vec<Vec<u8>>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
