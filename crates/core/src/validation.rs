//! Field rules shared by request DTOs and the bulk importer.

use std::borrow::Cow;

use validator::ValidationError;

use crate::error::CoreError;

/// Longest accepted product or category name.
pub const MAX_NAME_LENGTH: usize = 255;

/// Price must be a finite number greater than zero.
pub fn validate_price(price: f64) -> Result<(), CoreError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(CoreError::Validation(format!(
            "price must be a positive number, got {price}"
        )));
    }
    Ok(())
}

/// Trimmed, non-empty, at most [`MAX_NAME_LENGTH`] characters.
pub fn validate_name(field: &str, value: &str) -> Result<(), CoreError> {
    let length = value.trim().chars().count();
    if length == 0 {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    if length > MAX_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "{field} must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Empty image strings mean "no image"; anything else must be an http(s) URL.
pub fn normalize_image(image: Option<String>) -> Result<Option<String>, CoreError> {
    let Some(image) = image.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    let is_url = ["http://", "https://"]
        .iter()
        .any(|scheme| image.len() > scheme.len() && image.to_ascii_lowercase().starts_with(scheme));
    if !is_url {
        return Err(CoreError::Validation(format!(
            "image must be an http(s) URL, got '{image}'"
        )));
    }
    Ok(Some(image))
}

/// `#[validate(custom(function = ...))]` adapter for [`validate_price`].
pub fn positive_price<P: std::borrow::Borrow<f64>>(price: P) -> Result<(), ValidationError> {
    validate_price(*price.borrow()).map_err(|_| {
        let mut err = ValidationError::new("positive_price");
        err.message = Some(Cow::Borrowed("price must be a positive number"));
        err
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn price_rules() {
        assert!(validate_price(0.01).is_ok());
        assert!(validate_price(1e9).is_ok());
        assert_matches!(validate_price(0.0), Err(CoreError::Validation(_)));
        assert_matches!(validate_price(-5.0), Err(CoreError::Validation(_)));
        assert_matches!(validate_price(f64::NAN), Err(CoreError::Validation(_)));
        assert_matches!(validate_price(f64::INFINITY), Err(CoreError::Validation(_)));
        assert!(positive_price(&2.0).is_ok());
        assert!(positive_price(&-2.0).is_err());
    }

    #[test]
    fn name_rules() {
        assert!(validate_name("name", "Lamp").is_ok());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"x".repeat(MAX_NAME_LENGTH)).is_ok());
        let err = validate_name("name", &"x".repeat(MAX_NAME_LENGTH + 1)).unwrap_err();
        assert!(err.to_string().contains("at most 255"));
    }

    #[test]
    fn image_rules() {
        assert_eq!(normalize_image(None).unwrap(), None);
        assert_eq!(normalize_image(Some("  ".into())).unwrap(), None);
        assert_eq!(
            normalize_image(Some(" https://img.example.com/a.png ".into())).unwrap(),
            Some("https://img.example.com/a.png".into())
        );
        assert!(normalize_image(Some("ftp://x".into())).is_err());
        assert!(normalize_image(Some("https://".into())).is_err());
    }
}
