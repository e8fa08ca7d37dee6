use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use gestor_core::{Code, DomainError, DomainResult};

/// Status codes of the default catalogs.
pub mod codes {
    pub const PENDING: &str = "PENDIENTE";
    pub const APPROVED: &str = "APROBADA";
    pub const AUTHORIZED: &str = "AUTORIZADA";
    pub const REJECTED: &str = "RECHAZADA";
    pub const DISPATCHED: &str = "DESPACHADA";
    pub const CANCELLED: &str = "CANCELADA";
    pub const RECEIVED: &str = "RECIBIDA";
    pub const ANNULLED: &str = "ANULADA";
    pub const CONFIRMED: &str = "CONFIRMADA";
}

/// One row of a status catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: Code,
    pub name: String,
    pub initial: bool,
    pub terminal: bool,
    pub editable: bool,
}

impl Status {
    pub fn new(code: &str, name: impl Into<String>) -> DomainResult<Self> {
        Ok(Self {
            code: Code::parse(code)?,
            name: name.into(),
            initial: false,
            terminal: false,
            editable: false,
        })
    }

    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    /// Whether header fields and line items may still change.
    pub fn allows_edits(&self) -> bool {
        self.editable && !self.terminal
    }
}

/// A module's status lookup table.
///
/// Construction enforces exactly one initial status and unique codes. The
/// initial row is kept apart so `initial()` is total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCatalog {
    #[serde(skip)]
    initial: Status,
    statuses: Vec<Status>,
}

impl StatusCatalog {
    pub fn new(statuses: Vec<Status>) -> DomainResult<Self> {
        let initial_count = statuses.iter().filter(|s| s.initial).count();
        let initial = match statuses.iter().find(|s| s.initial) {
            Some(initial) if initial_count == 1 => initial.clone(),
            _ => {
                return Err(DomainError::invariant(format!(
                    "status catalog must have exactly one initial status (found {initial_count})"
                )));
            }
        };

        let mut seen = HashSet::new();
        for status in &statuses {
            if !seen.insert(status.code.clone()) {
                return Err(DomainError::invariant(format!(
                    "duplicate status code '{}'",
                    status.code
                )));
            }
        }

        Ok(Self { initial, statuses })
    }

    pub fn initial(&self) -> &Status {
        &self.initial
    }

    pub fn get(&self, code: &Code) -> Option<&Status> {
        self.statuses.iter().find(|s| &s.code == code)
    }

    pub fn find(&self, code: &str) -> DomainResult<&Status> {
        let code = Code::parse(code)?;
        self.get(&code)
            .ok_or_else(|| DomainError::not_found(format!("status '{code}'")))
    }

    pub fn statuses(&self) -> &[Status] {
        &self.statuses
    }

    /// Requisition statuses.
    pub fn requisitions() -> Self {
        Self::seeded(
            (codes::PENDING, "Pendiente"),
            &[
                (codes::APPROVED, "Aprobada", Kind::Open),
                (codes::REJECTED, "Rechazada", Kind::Final),
                (codes::DISPATCHED, "Despachada", Kind::Final),
                (codes::CANCELLED, "Cancelada", Kind::Final),
            ],
        )
    }

    /// Purchase order statuses.
    pub fn purchase_orders() -> Self {
        Self::seeded(
            (codes::PENDING, "Pendiente"),
            &[
                (codes::AUTHORIZED, "Autorizada", Kind::Open),
                (codes::REJECTED, "Rechazada", Kind::Final),
                (codes::RECEIVED, "Recibida", Kind::Final),
                (codes::ANNULLED, "Anulada", Kind::Final),
            ],
        )
    }

    /// Inventory write-off statuses.
    pub fn write_offs() -> Self {
        Self::seeded(
            (codes::PENDING, "Pendiente"),
            &[
                (codes::AUTHORIZED, "Autorizada", Kind::Open),
                (codes::REJECTED, "Rechazada", Kind::Final),
                (codes::CONFIRMED, "Confirmada", Kind::Final),
            ],
        )
    }

    /// Built-in catalogs: one editable initial row followed by non-editable
    /// rows. The codes are distinct constants, which is what `new` would check.
    fn seeded(
        (code, name): (&'static str, &'static str),
        rest: &[(&'static str, &'static str, Kind)],
    ) -> Self {
        let initial = Status {
            code: Code::from_static(code),
            name: name.to_string(),
            initial: true,
            terminal: false,
            editable: true,
        };
        let mut statuses = Vec::with_capacity(rest.len() + 1);
        statuses.push(initial.clone());
        statuses.extend(rest.iter().map(|(code, name, kind)| Status {
            code: Code::from_static(*code),
            name: (*name).to_string(),
            initial: false,
            terminal: *kind == Kind::Final,
            editable: false,
        }));
        Self { initial, statuses }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    Open,
    Final,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_without_initial_is_rejected() {
        let rows = vec![Status::new("A", "a").unwrap(), Status::new("B", "b").unwrap()];
        assert!(matches!(
            StatusCatalog::new(rows),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn catalog_with_two_initials_is_rejected() {
        let rows = vec![
            Status::new("A", "a").unwrap().initial(),
            Status::new("B", "b").unwrap().initial(),
        ];
        assert!(StatusCatalog::new(rows).is_err());
    }

    #[test]
    fn duplicate_codes_are_rejected_after_normalization() {
        let rows = vec![
            Status::new("abierta", "a").unwrap().initial(),
            Status::new(" ABIERTA ", "b").unwrap(),
        ];
        assert!(StatusCatalog::new(rows).is_err());
    }

    #[test]
    fn default_catalogs_are_well_formed() {
        for catalog in [
            StatusCatalog::requisitions(),
            StatusCatalog::purchase_orders(),
            StatusCatalog::write_offs(),
        ] {
            let rebuilt = StatusCatalog::new(catalog.statuses().to_vec()).unwrap();
            assert_eq!(rebuilt, catalog);
            assert_eq!(rebuilt.initial().code, codes::PENDING);
            assert!(rebuilt.initial().allows_edits());
            assert!(
                rebuilt
                    .statuses()
                    .iter()
                    .filter(|s| !s.initial)
                    .all(|s| !s.allows_edits())
            );
        }
    }

    #[test]
    fn find_reports_unknown_codes() {
        let catalog = StatusCatalog::write_offs();
        assert!(catalog.find("despachada").is_err());
        assert!(catalog.find("confirmada").unwrap().terminal);
    }
}
