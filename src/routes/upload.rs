//! Multipart form reading for the endpoints that accept files.

use std::{collections::HashMap, path::Path, str::FromStr};

use axum::extract::Multipart;

use crate::{
    dto::{accounts::VendorProfileFields, products::ProductFields},
    error::{AppError, AppResult},
    models::{Category, Size},
    services::image_store::UploadFile,
};

const SUPPORTED_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Text parts keyed by name plus every file part, in arrival order.
#[derive(Debug, Default)]
pub struct FormData {
    pub fields: HashMap<String, Vec<String>>,
    pub files: Vec<UploadFile>,
}

impl FormData {
    pub async fn read(mut multipart: Multipart, max_file_bytes: usize) -> AppResult<Self> {
        let mut form = FormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid multipart request: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?;
                    let upload = UploadFile {
                        field: name,
                        filename,
                        content_type,
                        bytes,
                    };
                    validate_image(&upload, max_file_bytes)?;
                    form.files.push(upload);
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?;
                    form.fields.entry(name).or_default().push(value);
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, name: &str) -> AppResult<&str> {
        self.text(name)
            .ok_or_else(|| AppError::BadRequest(format!("`{name}` is required")))
    }

    fn parse<T: FromStr>(&self, name: &str) -> AppResult<T> {
        self.require(name)?
            .parse()
            .map_err(|_| AppError::BadRequest(format!("`{name}` is not valid")))
    }

    /// All values of a repeatable field. A single comma separated value is
    /// accepted as well.
    pub fn list(&self, name: &str) -> Vec<String> {
        self.fields
            .get(name)
            .into_iter()
            .flatten()
            .flat_map(|v| v.split(','))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn file(&self, name: &str) -> Option<&UploadFile> {
        self.files.iter().find(|f| f.field == name)
    }

    pub fn require_file(&self, name: &str) -> AppResult<&UploadFile> {
        self.file(name)
            .ok_or_else(|| AppError::BadRequest(format!("`{name}` file is required")))
    }

    pub fn files_named(&self, name: &str) -> Vec<UploadFile> {
        self.files.iter().filter(|f| f.field == name).cloned().collect()
    }

    pub fn vendor_profile_fields(&self) -> AppResult<VendorProfileFields> {
        Ok(VendorProfileFields {
            shop_name: self.require("shop_name")?.to_string(),
            aadhar_number: self.require("aadhar_number")?.to_string(),
            pancard_number: self.require("pancard_number")?.to_string(),
            gst_number: self.require("gst_number")?.to_string(),
            bio: self.text("bio").map(str::to_string),
            description: self.text("description").map(str::to_string),
        })
    }

    pub fn product_fields(&self) -> AppResult<ProductFields> {
        let sizes = self
            .list("sizes")
            .iter()
            .map(|s| s.parse::<Size>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProductFields {
            name: self.require("name")?.to_string(),
            category: self.parse::<Category>("category")?,
            subcategory: self.text("subcategory").map(str::to_string),
            rating: self.text("rating").map_or(Ok(0), |_| self.parse("rating"))?,
            price: self.parse("price")?,
            discount: self.text("discount").map_or(Ok(0), |_| self.parse("discount"))?,
            stock: self.parse("stock")?,
            description: self.require("description")?.to_string(),
            colors: self.list("colors"),
            sizes,
        })
    }
}

/// Rejects empty, oversized or non-image uploads.
pub fn validate_image(upload: &UploadFile, max_bytes: usize) -> AppResult<()> {
    if upload.bytes.is_empty() {
        return Err(AppError::BadRequest(format!(
            "`{}` is an empty file",
            upload.filename
        )));
    }
    if upload.bytes.len() > max_bytes {
        return Err(AppError::BadRequest(format!(
            "File too large. Maximum size is {} bytes",
            max_bytes
        )));
    }

    let ext = Path::new(&upload.filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_FORMATS.contains(&ext.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Unsupported file format '{}'. Supported: {}",
            ext,
            SUPPORTED_FORMATS.join(", ")
        )));
    }
    Ok(())
}
