//! Purchase order money arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestor_core::{add_checked, ensure_non_negative, mul_checked, DomainError, DomainResult};

/// `cantidad × precio_unitario − descuento`, never negative.
pub fn line_subtotal(quantity: Decimal, unit_price: Decimal, discount: Decimal) -> DomainResult<Decimal> {
    ensure_non_negative("precio_unitario", unit_price)?;
    ensure_non_negative("descuento", discount)?;
    let subtotal = mul_checked("subtotal", quantity, unit_price)? - discount;
    if subtotal < Decimal::ZERO {
        return Err(DomainError::validation(
            "descuento: the discount cannot exceed the line amount",
        ));
    }
    Ok(subtotal)
}

/// Header totals, recomputed from the lines on every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// `tax = (subtotal − discount) × rate` (rounded to cents),
    /// `total = subtotal − discount + tax`.
    pub fn compute(subtotal: Decimal, discount: Decimal, tax_rate: Decimal) -> DomainResult<Self> {
        let taxable = subtotal - discount;
        let tax = mul_checked("impuesto", taxable, tax_rate)?.round_dp(2);
        Ok(Self {
            subtotal,
            discount,
            tax,
            total: add_checked("total", taxable, tax)?,
        })
    }
}
