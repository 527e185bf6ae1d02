//! # Validation Module
//!
//! Field rules for "add product" requests.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  UI form ──► SyncEngine::add_product ──► THIS MODULE                   │
//! │                                              │                          │
//! │                         fails ◄──────────────┤                          │
//! │                         (nothing written,    │ passes                   │
//! │                          nothing sent)       ▼                          │
//! │                                   notification + queue / remote call    │
//! │                                                                         │
//! │  SQLite CHECK constraints repeat the numeric ranges for queued rows.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockline_core::validation::{validate_price, validate_tax};
//!
//! assert!(validate_price(10.0).is_ok());
//! assert!(validate_tax(101.0).is_err());
//! ```

use crate::error::ValidationError;
use crate::{MAX_NAME_LENGTH, MAX_TAX_PERCENT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn validate_label(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LENGTH,
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be blank
/// - At most 200 characters after trimming
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_label("product_name", name)
}

/// Validates a product type. Same rules as the name.
pub fn validate_product_type(product_type: &str) -> ValidationResult<()> {
    validate_label("product_type", product_type)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a unit price.
///
/// ## Rules
/// - Finite (no NaN, no infinity)
/// - Zero is allowed (free items)
/// - Negative is rejected
pub fn validate_price(price: f64) -> ValidationResult<()> {
    if !price.is_finite() {
        return Err(ValidationError::NotFinite {
            field: "price".to_string(),
        });
    }

    if price < 0.0 {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }

    Ok(())
}

/// Validates a tax percentage.
///
/// ## Rules
/// - Finite
/// - 0 to 100 inclusive
pub fn validate_tax(tax: f64) -> ValidationResult<()> {
    if !tax.is_finite() {
        return Err(ValidationError::NotFinite {
            field: "tax".to_string(),
        });
    }

    if !(0.0..=MAX_TAX_PERCENT).contains(&tax) {
        return Err(ValidationError::OutOfRange {
            field: "tax".to_string(),
            min: 0.0,
            max: MAX_TAX_PERCENT,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Pen").is_ok());
        assert!(validate_product_name("   ").is_err());
        assert!(validate_product_name(&"A".repeat(200)).is_ok());
        assert!(validate_product_name(&"A".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_product_type() {
        assert!(validate_product_type("Stationery").is_ok());
        assert!(matches!(
            validate_product_type(""),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(0.0).is_ok());
        assert!(validate_price(10.0).is_ok());
        assert!(matches!(validate_price(-0.01), Err(ValidationError::Negative { .. })));
        assert!(matches!(validate_price(f64::NAN), Err(ValidationError::NotFinite { .. })));
        assert!(validate_price(f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_tax() {
        assert!(validate_tax(0.0).is_ok());
        assert!(validate_tax(5.0).is_ok());
        assert!(validate_tax(100.0).is_ok());
        assert!(matches!(validate_tax(100.5), Err(ValidationError::OutOfRange { .. })));
        assert!(validate_tax(-1.0).is_err());
        assert!(validate_tax(f64::NAN).is_err());
    }
}
