use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    models::{Address, AddressType, Vendor},
    validation,
};

/// Postal fields shared by standalone address management and checkout.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddressFields {
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate(custom(function = "validation::pin_code"))]
    pub pin_code: String,
    #[validate(length(min = 1, max = 50))]
    pub city: String,
    #[validate(length(min = 1, max = 50))]
    pub state: String,
    #[validate(length(min = 1, max = 50))]
    pub country: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAddressRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub fields: AddressFields,
    #[serde(rename = "type", default = "default_address_type")]
    pub kind: AddressType,
}

fn default_address_type() -> AddressType {
    AddressType::Default
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAddressRequest {
    #[validate(length(min = 1, max = 500))]
    pub address: Option<String>,
    #[validate(custom(function = "validation::pin_code"))]
    pub pin_code: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub city: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub country: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct AddressList {
    #[schema(value_type = Vec<Address>)]
    pub items: Vec<Address>,
}

/// Text part of the vendor onboarding form; the three documents travel as files.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct VendorProfileFields {
    #[validate(length(min = 1, max = 100))]
    pub shop_name: String,
    #[validate(custom(function = "validation::aadhar_number"))]
    pub aadhar_number: String,
    #[validate(custom(function = "validation::pancard_number"))]
    pub pancard_number: String,
    #[validate(custom(function = "validation::gst_number"))]
    pub gst_number: String,
    pub bio: Option<String>,
    pub description: Option<String>,
}

/// Multipart schema for `POST /api/accounts/vendor/profile`.
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct VendorProfileForm {
    pub shop_name: String,
    pub aadhar_number: String,
    pub pancard_number: String,
    pub gst_number: String,
    pub bio: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub aadhar_image: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    pub pancard_image: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    pub business_license: Vec<u8>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateVendorProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub shop_name: Option<String>,
    pub bio: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyVendorRequest {
    pub is_verified: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VendorFilter {
    /// Only verified, or only pending, vendors
    pub verified: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VendorList {
    pub items: Vec<Vendor>,
}
