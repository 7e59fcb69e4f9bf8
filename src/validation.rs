//! Field rules shared by the request DTOs.

use std::borrow::Cow;

use validator::ValidationError;

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// 8 to 15 characters with an upper, a lower, a digit and a symbol, no whitespace.
pub fn password_strength(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    let ok = (8..=15).contains(&len)
        && !password.chars().any(char::is_whitespace)
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_ascii_alphanumeric());
    if ok {
        Ok(())
    } else {
        Err(invalid(
            "password_strength",
            "Password must be 8-15 characters and contain at least one uppercase letter, \
             one lowercase letter, one number and one special character.",
        ))
    }
}

pub fn phone_number(phone: &str) -> Result<(), ValidationError> {
    if phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(invalid("phone", "Phone number must be 10 digits."))
    }
}

pub fn pin_code(code: &str) -> Result<(), ValidationError> {
    let trimmed = code.trim();
    let ok = (3..=10).contains(&trimmed.len())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(invalid("pin_code", "Pin code must be 3-10 letters or digits."))
    }
}

pub fn aadhar_number(value: &str) -> Result<(), ValidationError> {
    if value.len() == 12 && value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(invalid("aadhar_number", "Aadhar number must be 12 digits."))
    }
}

pub fn pancard_number(value: &str) -> Result<(), ValidationError> {
    if value.len() == 10 && value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(invalid("pancard_number", "PAN must be 10 letters or digits."))
    }
}

pub fn gst_number(value: &str) -> Result<(), ValidationError> {
    if value.len() == 15 && value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(invalid("gst_number", "GST number must be 15 letters or digits."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules() {
        assert!(password_strength("Secret#123").is_ok());
        assert!(password_strength("secret#123").is_err(), "no uppercase");
        assert!(password_strength("SECRET#123").is_err(), "no lowercase");
        assert!(password_strength("Secret#abc").is_err(), "no digit");
        assert!(password_strength("Secret1234").is_err(), "no symbol");
        assert!(password_strength("Se#1").is_err(), "too short");
        assert!(password_strength("Secret#12345678901").is_err(), "too long");
        assert!(password_strength("Secret #123").is_err(), "whitespace");
    }

    #[test]
    fn phone_and_pin_code() {
        assert!(phone_number("9876543210").is_ok());
        assert!(phone_number("98765").is_err());
        assert!(phone_number("98765abcde").is_err());
        assert!(pin_code("560001").is_ok());
        assert!(pin_code("SW1A 1AA").is_ok());
        assert!(pin_code("").is_err());
        assert!(pin_code("56/001").is_err());
    }

    #[test]
    fn vendor_document_numbers() {
        assert!(aadhar_number("123412341234").is_ok());
        assert!(aadhar_number("12341234123X").is_err());
        assert!(pancard_number("ABCDE1234F").is_ok());
        assert!(pancard_number("ABCDE1234").is_err());
        assert!(gst_number("22ABCDE1234F1Z5").is_ok());
        assert!(gst_number("22ABCDE1234F1Z").is_err());
    }
}
