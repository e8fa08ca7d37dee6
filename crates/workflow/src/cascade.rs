//! Line-item quantity cascade: each stage is bounded by the previous one.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestor_core::{add_checked, ensure_non_negative, ensure_positive, DomainError, DomainResult};

/// Requested → approved → dispatched quantities of a requisition line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LineQuantities {
    pub requested: Decimal,
    pub approved: Decimal,
    pub dispatched: Decimal,
}

impl LineQuantities {
    pub fn requested(quantity: Decimal) -> DomainResult<Self> {
        ensure_positive("cantidad_solicitada", quantity)?;
        Ok(Self {
            requested: quantity,
            approved: Decimal::ZERO,
            dispatched: Decimal::ZERO,
        })
    }
}

/// Ordered → received quantities of a purchase order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReceiptQuantities {
    pub ordered: Decimal,
    pub received: Decimal,
}

impl ReceiptQuantities {
    pub fn ordered(quantity: Decimal) -> DomainResult<Self> {
        ensure_positive("cantidad", quantity)?;
        Ok(Self {
            ordered: quantity,
            received: Decimal::ZERO,
        })
    }

    pub fn pending(&self) -> Decimal {
        self.ordered - self.received
    }

    pub fn is_complete(&self) -> bool {
        self.received >= self.ordered
    }
}

/// `0 ≤ approved ≤ requested`.
pub fn approve_line(line: &LineQuantities, approved: Decimal) -> DomainResult<LineQuantities> {
    ensure_non_negative("cantidad_aprobada", approved)?;
    if approved > line.requested {
        return Err(DomainError::validation(format!(
            "approved quantity ({approved}) cannot exceed requested quantity ({})",
            line.requested
        )));
    }
    Ok(LineQuantities { approved, ..*line })
}

/// `0 ≤ dispatched ≤ approved`.
pub fn dispatch_line(line: &LineQuantities, dispatched: Decimal) -> DomainResult<LineQuantities> {
    ensure_non_negative("cantidad_despachada", dispatched)?;
    if dispatched > line.approved {
        return Err(DomainError::validation(format!(
            "dispatched quantity ({dispatched}) cannot exceed approved quantity ({})",
            line.approved
        )));
    }
    Ok(LineQuantities { dispatched, ..*line })
}

/// `0 < quantity` and `received + quantity ≤ ordered`.
pub fn receive_line(line: &ReceiptQuantities, quantity: Decimal) -> DomainResult<ReceiptQuantities> {
    ensure_positive("cantidad_recibida", quantity)?;
    let received = add_checked("cantidad_recibida", line.received, quantity)?;
    if received > line.ordered {
        return Err(DomainError::validation(format!(
            "received quantity ({received}) cannot exceed ordered quantity ({})",
            line.ordered
        )));
    }
    Ok(ReceiptQuantities { received, ..*line })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn approve_within_requested() {
        let line = LineQuantities::requested(dec!(10)).unwrap();
        let approved = approve_line(&line, dec!(7)).unwrap();
        assert_eq!(approved.approved, dec!(7));
        assert_eq!(approved.requested, dec!(10));
    }

    #[test]
    fn approve_zero_is_allowed() {
        let line = LineQuantities::requested(dec!(3)).unwrap();
        assert_eq!(approve_line(&line, Decimal::ZERO).unwrap().approved, Decimal::ZERO);
    }

    #[test]
    fn approve_above_requested_fails() {
        let line = LineQuantities::requested(dec!(10)).unwrap();
        assert!(matches!(
            approve_line(&line, dec!(10.5)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn dispatch_is_bounded_by_approved() {
        let line = approve_line(&LineQuantities::requested(dec!(10)).unwrap(), dec!(4)).unwrap();
        assert!(dispatch_line(&line, dec!(5)).is_err());
        assert_eq!(dispatch_line(&line, dec!(4)).unwrap().dispatched, dec!(4));
    }

    #[test]
    fn negative_quantities_fail() {
        let line = LineQuantities::requested(dec!(10)).unwrap();
        assert!(approve_line(&line, dec!(-1)).is_err());
        assert!(LineQuantities::requested(Decimal::ZERO).is_err());
    }

    #[test]
    fn receptions_accumulate_up_to_ordered() {
        let line = ReceiptQuantities::ordered(dec!(5)).unwrap();
        let line = receive_line(&line, dec!(3)).unwrap();
        assert_eq!(line.pending(), dec!(2));
        assert!(receive_line(&line, dec!(3)).is_err());
        assert!(receive_line(&line, Decimal::ZERO).is_err());
        let line = receive_line(&line, dec!(2)).unwrap();
        assert!(line.is_complete());
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn qty() -> impl Strategy<Value = Decimal> {
        (0i64..10_000).prop_map(|v| Decimal::new(v, 2))
    }

    proptest! {
        #[test]
        fn cascade_never_breaks_ordering(requested in 1i64..10_000, approved in qty(), dispatched in qty()) {
            let line = LineQuantities::requested(Decimal::new(requested, 2)).unwrap();
            if let Ok(line) = approve_line(&line, approved) {
                prop_assert!(line.approved <= line.requested);
                if let Ok(line) = dispatch_line(&line, dispatched) {
                    prop_assert!(line.dispatched <= line.approved);
                    prop_assert!(line.dispatched >= Decimal::ZERO);
                }
            }
        }

        #[test]
        fn receptions_never_exceed_ordered(ordered in 1i64..1_000, steps in prop::collection::vec(1i64..500, 0..10)) {
            let mut line = ReceiptQuantities::ordered(Decimal::from(ordered)).unwrap();
            for step in steps {
                if let Ok(next) = receive_line(&line, Decimal::from(step)) {
                    line = next;
                }
                prop_assert!(line.received <= line.ordered);
            }
        }
    }
}
