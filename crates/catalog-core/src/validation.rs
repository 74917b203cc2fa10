//! # Validation Module
//!
//! Input validation for products before they reach the local store.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Front end (CLI / UI)                                         │
//! │  └── Type validation (argument parsing, deserialization)               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Catalog facade (Rust)                                        │
//! │  └── THIS MODULE: field rules                                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE (barcode)                                                  │
//! │  └── CHECK (price_cents >= 0)                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use catalog_core::validation::{validate_barcode, validate_product_name};
//!
//! validate_barcode("123456789012").unwrap();
//! validate_product_name("Widget A").unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::Product;
use crate::{MAX_BARCODE_LEN, MAX_DESCRIPTION_LEN, MAX_NAME_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 100 characters
///
/// ## Example
/// ```rust
/// use catalog_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Gadget X").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_required("name", name, MAX_NAME_LEN)
}

/// Validates a barcode.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - No whitespace inside the code
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    validate_required("barcode", barcode, MAX_BARCODE_LEN)?;

    if barcode.trim().chars().any(char::is_whitespace) {
        return Err(ValidationError::invalid_format(
            "barcode",
            "must not contain whitespace",
        ));
    }

    Ok(())
}

/// Validates an optional description (at most 500 characters).
pub fn validate_description(description: Option<&str>) -> ValidationResult<()> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_DESCRIPTION_LEN,
        }),
        _ => Ok(()),
    }
}

fn validate_required(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a price. Zero is allowed (free items).
///
/// ## Example
/// ```rust
/// use catalog_core::money::Money;
/// use catalog_core::validation::validate_price;
///
/// assert!(validate_price(Money::from_cents(0)).is_ok());
/// assert!(validate_price(Money::from_cents(-1)).is_err());
/// ```
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() {
        return Err(ValidationError::Negative {
            field: "price".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Whole-Record Validation
// =============================================================================

/// Runs every field rule against a product, stopping at the first failure.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    validate_price(product.price)?;
    validate_barcode(&product.barcode)?;
    validate_description(product.description.as_deref())?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
