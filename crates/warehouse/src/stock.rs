//! Stock entries and exits with their ledger rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestor_core::{add_checked, ensure_positive, Code, DomainError, DomainResult, Entity, UserId};

use crate::article::{Article, ArticleId};
use crate::catalog::WarehouseId;

gestor_core::aggregate_id!(
    /// Stock movement identifier.
    MovementId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "ENTRADA")]
    Entry,
    #[serde(rename = "SALIDA")]
    Exit,
}

/// Command payload: move stock of one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStock {
    pub article_id: ArticleId,
    pub operation: Operation,
    pub movement_type: Code,
    pub quantity: Decimal,
    pub actor: UserId,
    pub reason: String,
    /// Document that caused the movement (requisition or purchase order number).
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Stock ledger row; immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub article_id: ArticleId,
    pub warehouse_id: WarehouseId,
    pub movement_type: Code,
    pub operation: Operation,
    pub quantity: Decimal,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub actor: UserId,
    pub reason: String,
    pub reference: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Decide an entry: `quantity > 0`, result within `stock_max` when set.
pub fn register_entry(article: &Article, op: &MoveStock) -> DomainResult<Movement> {
    ensure_positive("cantidad", op.quantity)?;
    let stock_after = add_checked("stock", article.stock(), op.quantity)?;
    if let Some(maximum) = article.stock_max() {
        if stock_after > maximum {
            return Err(DomainError::StockExceedsMaximum {
                maximum,
                resulting: stock_after,
            });
        }
    }
    Ok(movement(article, op, Operation::Entry, stock_after))
}

/// Decide an exit: `quantity > 0`, result never negative.
pub fn register_exit(article: &Article, op: &MoveStock) -> DomainResult<Movement> {
    ensure_positive("cantidad", op.quantity)?;
    if op.quantity > article.stock() {
        return Err(DomainError::InsufficientStock {
            available: article.stock(),
            requested: op.quantity,
        });
    }
    Ok(movement(article, op, Operation::Exit, article.stock() - op.quantity))
}

pub fn register_movement(article: &Article, op: &MoveStock) -> DomainResult<Movement> {
    match op.operation {
        Operation::Entry => register_entry(article, op),
        Operation::Exit => register_exit(article, op),
    }
}

fn movement(article: &Article, op: &MoveStock, operation: Operation, stock_after: Decimal) -> Movement {
    Movement {
        id: MovementId::generate(),
        article_id: article.id_typed(),
        warehouse_id: article.warehouse_id(),
        movement_type: op.movement_type.clone(),
        operation,
        quantity: op.quantity,
        stock_before: article.stock(),
        stock_after,
        actor: op.actor,
        reason: op.reason.clone(),
        reference: op.reference.clone(),
        occurred_at: op.occurred_at,
    }
}
