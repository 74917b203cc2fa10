//! # Money Module
//!
//! Provides the `Money` type used for product prices.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The product API sends prices as JSON numbers:                          │
//! │    { "price": 19.99 }                                                   │
//! │                                                                         │
//! │  Stored as f64 and compared later, 19.99 may come back as              │
//! │  19.989999999999998 and look like a change.                             │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Wire (f64) ──► Money::from_decimal ──► 1999 cents ──► SQLite INTEGER │
//! │    SQLite INTEGER ──► Money ──► Money::to_decimal ──► Wire (f64)        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use catalog_core::money::Money;
//!
//! let price = Money::from_cents(1099); // $10.99
//! assert_eq!(price.to_string(), "$10.99");
//!
//! let wire = Money::from_decimal(24.99).unwrap();
//! assert_eq!(wire.cents(), 2499);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so that a negative value coming off the wire can be represented
/// long enough to be rejected by validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use catalog_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Converts a decimal amount (as sent by the API) into cents.
    ///
    /// Rounds half away from zero to the nearest cent. Fails on NaN and
    /// infinities, and on values that do not fit in `i64` cents.
    ///
    /// ## Example
    /// ```rust
    /// use catalog_core::money::Money;
    ///
    /// assert_eq!(Money::from_decimal(19.99).unwrap().cents(), 1999);
    /// assert_eq!(Money::from_decimal(0.005).unwrap().cents(), 1);
    /// assert!(Money::from_decimal(f64::NAN).is_err());
    /// ```
    pub fn from_decimal(amount: f64) -> Result<Self, ValidationError> {
        if !amount.is_finite() {
            return Err(ValidationError::invalid_format("price", "not a finite number"));
        }

        let cents = (amount * 100.0).round();
        if cents > i64::MAX as f64 || cents < i64::MIN as f64 {
            return Err(ValidationError::invalid_format("price", "out of range"));
        }

        Ok(Money(cents as i64))
    }

    /// Returns the value as a decimal amount for the wire format.
    #[inline]
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

/// Shows money as `$D.CC`.
///
/// ## Example
/// - `Money(1099)` → `"$10.99"`
/// - `Money(-550)` → `"-$5.50"`
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
