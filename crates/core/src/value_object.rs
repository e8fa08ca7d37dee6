//! Value objects: equality by value, not identity.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values
/// (a status code, a SKU, a quantity), never by identity.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Normalized business code (status codes, SKUs, catalog codes).
///
/// Codes are trimmed and upper-cased on construction; an empty code is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Code(String);

impl Code {
    pub fn parse(raw: impl AsRef<str>) -> DomainResult<Self> {
        let normalized = raw.as_ref().trim().to_uppercase();
        if normalized.is_empty() {
            return Err(DomainError::validation("code cannot be empty"));
        }
        Ok(Self(normalized))
    }

    /// Build a code from a compile-time literal. The literal must be non-blank.
    pub fn from_static(code: &'static str) -> Self {
        debug_assert!(!code.trim().is_empty());
        Self(code.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Code {}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Code {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Code> for String {
    fn from(value: Code) -> Self {
        value.0
    }
}

impl PartialEq<str> for Code {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Code {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Reject quantities that are zero or negative.
pub fn ensure_positive(field: &str, value: Decimal) -> DomainResult<()> {
    if value <= Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} must be greater than zero")));
    }
    Ok(())
}

/// Reject negative quantities (zero is allowed).
pub fn ensure_non_negative(field: &str, value: Decimal) -> DomainResult<()> {
    if value < Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(())
}

/// Reject blank free-text fields (reasons, descriptions).
pub fn ensure_not_blank(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// `a + b`, or a validation error naming `field` when the result does not fit
/// a `Decimal`.
pub fn add_checked(field: &str, a: Decimal, b: Decimal) -> DomainResult<Decimal> {
    a.checked_add(b).ok_or_else(|| out_of_range(field))
}

/// `a × b`, or a validation error naming `field` on overflow.
pub fn mul_checked(field: &str, a: Decimal, b: Decimal) -> DomainResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| out_of_range(field))
}

pub fn sum_checked(field: &str, values: impl IntoIterator<Item = Decimal>) -> DomainResult<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| add_checked(field, acc, value))
}

fn out_of_range(field: &str) -> DomainError {
    DomainError::validation(format!("{field} is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn code_is_trimmed_and_uppercased() {
        let code = Code::parse("  pendiente ").unwrap();
        assert_eq!(code.as_str(), "PENDIENTE");
        assert_eq!(code, "PENDIENTE");
    }

    #[test]
    fn blank_code_is_rejected() {
        assert!(matches!(Code::parse("   "), Err(DomainError::Validation(_))));
    }

    #[test]
    fn quantity_guards() {
        assert!(ensure_positive("cantidad", dec!(0.01)).is_ok());
        assert!(ensure_positive("cantidad", dec!(0)).is_err());
        assert!(ensure_non_negative("cantidad", dec!(0)).is_ok());
        assert!(ensure_non_negative("cantidad", dec!(-1)).is_err());
    }

    #[test]
    fn overflowing_arithmetic_is_a_validation_error() {
        assert!(matches!(
            add_checked("stock", Decimal::MAX, dec!(1)),
            Err(DomainError::Validation(msg)) if msg.starts_with("stock")
        ));
        assert!(mul_checked("subtotal", Decimal::MAX, dec!(2)).is_err());
        assert!(sum_checked("total", [Decimal::MAX, Decimal::MAX]).is_err());
        assert_eq!(sum_checked("total", [dec!(1.5), dec!(2)]).unwrap(), dec!(3.5));
        assert_eq!(mul_checked("subtotal", dec!(3), dec!(1500)).unwrap(), dec!(4500));
    }
}
