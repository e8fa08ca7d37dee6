//! Error boundary: turns service errors into messages fit for a user.

use serde::Serialize;

use gestor_core::DomainError;

use crate::store::StoreError;

/// What the caller shows after a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMessage {
    /// Stable machine-readable kind (`validation_error`, `conflict`, ...).
    pub kind: &'static str,
    pub message: String,
}

impl UserMessage {
    fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub fn user_message(err: &StoreError) -> UserMessage {
    match err {
        StoreError::Domain(err) => domain_message(err),
        StoreError::Poisoned => UserMessage::new(
            "internal_error",
            "Error interno. Intente nuevamente más tarde.",
        ),
    }
}

pub fn domain_message(err: &DomainError) -> UserMessage {
    match err {
        DomainError::Validation(msg) => {
            UserMessage::new("validation_error", format!("Datos inválidos: {msg}"))
        }
        DomainError::InvariantViolation(msg) => {
            UserMessage::new("invariant_violation", format!("Operación inconsistente: {msg}"))
        }
        DomainError::InvalidState(msg) => UserMessage::new(
            "invalid_state",
            format!("El estado actual no permite esta operación: {msg}"),
        ),
        DomainError::InsufficientStock {
            available,
            requested,
        } => UserMessage::new(
            "insufficient_stock",
            format!("Stock insuficiente. Disponible: {available}, solicitado: {requested}"),
        ),
        DomainError::StockExceedsMaximum { maximum, resulting } => UserMessage::new(
            "stock_exceeds_maximum",
            format!("El stock resultante ({resulting}) supera el máximo permitido ({maximum})"),
        ),
        DomainError::InvalidId(msg) => {
            UserMessage::new("invalid_id", format!("Identificador inválido: {msg}"))
        }
        DomainError::NotFound(what) => UserMessage::new("not_found", format!("No encontrado: {what}")),
        DomainError::Conflict(msg) => UserMessage::new(
            "conflict",
            format!("El registro fue modificado o ya existe: {msg}"),
        ),
        DomainError::Unauthorized(msg) => UserMessage::new(
            "unauthorized",
            format!("No tiene permisos para realizar esta acción ({msg})"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_stock_names_both_quantities() {
        let err = StoreError::Domain(DomainError::InsufficientStock {
            available: dec!(3),
            requested: dec!(5),
        });
        let msg = user_message(&err);
        assert_eq!(msg.kind, "insufficient_stock");
        assert_eq!(msg.message, "Stock insuficiente. Disponible: 3, solicitado: 5");
    }

    #[test]
    fn each_domain_error_has_its_own_kind() {
        let cases = [
            (DomainError::validation("x"), "validation_error"),
            (DomainError::invalid_state("x"), "invalid_state"),
            (DomainError::conflict("x"), "conflict"),
            (DomainError::not_found("x"), "not_found"),
            (DomainError::unauthorized("x"), "unauthorized"),
        ];
        for (err, kind) in cases {
            assert_eq!(domain_message(&err).kind, kind);
        }
    }

    #[test]
    fn poisoned_store_hides_details() {
        let msg = user_message(&StoreError::Poisoned);
        assert_eq!(msg.kind, "internal_error");
        assert!(!msg.message.contains("poisoned"));
    }

    #[test]
    fn serializes_as_kind_and_message() {
        let msg = domain_message(&DomainError::not_found("solicitud SOL-00000009"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "not_found",
                "message": "No encontrado: solicitud SOL-00000009",
            })
        );
    }
}
