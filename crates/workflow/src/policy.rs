use serde::{Deserialize, Serialize};

use gestor_auth::permissions::{self, Permission};
use gestor_core::Code;

use crate::status::{codes, StatusCatalog};

/// Actor fields a transition records on the header besides the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stamp {
    None,
    Approver,
    Dispatcher,
}

/// A guarded transition into `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionRule {
    pub to: Code,
    pub from: Vec<Code>,
    pub permission: Permission,
    pub stamp: Stamp,
}

impl TransitionRule {
    pub fn new(to: &'static str, from: &[&'static str], permission: Permission, stamp: Stamp) -> Self {
        Self {
            to: Code::from_static(to),
            from: from.iter().map(|c| Code::from_static(c)).collect(),
            permission,
            stamp,
        }
    }

    pub fn allows_from(&self, current: &Code) -> bool {
        self.from.iter().any(|c| c == current)
    }
}

/// A module's catalog plus the rules for moving between its statuses.
///
/// Targets without a rule are reachable from any non-final status by actors
/// holding `change_permission`. Targets listed in `reserved` carry guards or
/// side effects of their own and are only reachable through the named
/// operation, never through a generic status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionPolicy {
    pub module: &'static str,
    pub catalog: StatusCatalog,
    pub rules: Vec<TransitionRule>,
    pub change_permission: Permission,
    pub reserved: Vec<(Code, &'static str)>,
}

fn reserved(targets: &[(&'static str, &'static str)]) -> Vec<(Code, &'static str)> {
    targets
        .iter()
        .map(|(code, operation)| (Code::from_static(code), *operation))
        .collect()
}

impl TransitionPolicy {
    pub fn rule_for(&self, target: &Code) -> Option<&TransitionRule> {
        self.rules.iter().find(|r| &r.to == target)
    }

    /// Operation that owns `target`, when a generic change may not reach it.
    pub fn reserved_operation(&self, target: &Code) -> Option<&'static str> {
        self.reserved
            .iter()
            .find(|(code, _)| code == target)
            .map(|(_, operation)| *operation)
    }

    pub fn requisitions() -> Self {
        use permissions::requisitions as p;

        Self {
            module: "solicitudes",
            catalog: StatusCatalog::requisitions(),
            rules: vec![
                TransitionRule::new(codes::APPROVED, &[codes::PENDING], p::APPROVE, Stamp::Approver),
                TransitionRule::new(
                    codes::REJECTED,
                    &[codes::PENDING, codes::APPROVED],
                    p::REJECT,
                    Stamp::None,
                ),
                TransitionRule::new(
                    codes::DISPATCHED,
                    &[codes::APPROVED],
                    p::DISPATCH,
                    Stamp::Dispatcher,
                ),
                TransitionRule::new(
                    codes::CANCELLED,
                    &[codes::PENDING, codes::APPROVED],
                    p::CHANGE,
                    Stamp::None,
                ),
            ],
            change_permission: p::CHANGE,
            reserved: reserved(&[(codes::APPROVED, "approve"), (codes::DISPATCHED, "dispatch")]),
        }
    }

    pub fn purchase_orders() -> Self {
        use permissions::purchasing as p;

        Self {
            module: "compras",
            catalog: StatusCatalog::purchase_orders(),
            rules: vec![
                TransitionRule::new(
                    codes::AUTHORIZED,
                    &[codes::PENDING],
                    p::AUTHORIZE,
                    Stamp::Approver,
                ),
                TransitionRule::new(codes::REJECTED, &[codes::PENDING], p::AUTHORIZE, Stamp::None),
                TransitionRule::new(codes::RECEIVED, &[codes::AUTHORIZED], p::RECEIVE, Stamp::None),
                TransitionRule::new(
                    codes::ANNULLED,
                    &[codes::PENDING, codes::AUTHORIZED],
                    p::CHANGE,
                    Stamp::None,
                ),
            ],
            change_permission: p::CHANGE,
            reserved: reserved(&[(codes::AUTHORIZED, "authorize"), (codes::RECEIVED, "receive")]),
        }
    }

    pub fn write_offs() -> Self {
        use permissions::writeoffs as p;

        Self {
            module: "bajas_inventario",
            catalog: StatusCatalog::write_offs(),
            rules: vec![
                TransitionRule::new(
                    codes::AUTHORIZED,
                    &[codes::PENDING],
                    p::AUTHORIZE,
                    Stamp::Approver,
                ),
                TransitionRule::new(
                    codes::REJECTED,
                    &[codes::PENDING, codes::AUTHORIZED],
                    p::AUTHORIZE,
                    Stamp::None,
                ),
                TransitionRule::new(
                    codes::CONFIRMED,
                    &[codes::PENDING, codes::AUTHORIZED],
                    p::CHANGE,
                    Stamp::None,
                ),
            ],
            change_permission: p::CHANGE,
            reserved: reserved(&[(codes::AUTHORIZED, "authorize"), (codes::CONFIRMED, "confirm")]),
        }
    }
}
