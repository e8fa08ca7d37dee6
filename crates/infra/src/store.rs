//! Transactional in-memory store.
//!
//! Every write runs against a private copy of the tables; the copy replaces
//! the live tables only when the transaction closure returns `Ok`, so a failed
//! operation leaves no partial header, line, ledger or history row behind.

use std::collections::BTreeMap;
use std::sync::RwLock;

use thiserror::Error;

use gestor_assets::{Asset, AssetId, AssetMovement, AssetMovementType, AssetState, Location, LocationId};
use gestor_core::{Aggregate, Code, DomainError, ExpectedVersion};
use gestor_purchasing::{PurchaseOrder, PurchaseOrderId, Supplier, SupplierId};
use gestor_requisitions::{Requisition, RequisitionId};
use gestor_warehouse::{
    Article, ArticleId, Category, CategoryId, Movement, MovementType, Warehouse, WarehouseId,
};
use gestor_workflow::History;
use gestor_writeoffs::{WriteOff, WriteOffId, WriteOffReason};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            StoreError::Domain(err) => Some(err),
            StoreError::Poisoned => None,
        }
    }
}

impl From<gestor_auth::AuthzError> for StoreError {
    fn from(value: gestor_auth::AuthzError) -> Self {
        StoreError::Domain(value.into())
    }
}

/// Every table the services read and write.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub warehouses: BTreeMap<WarehouseId, Warehouse>,
    pub categories: BTreeMap<CategoryId, Category>,
    pub movement_types: BTreeMap<Code, MovementType>,
    pub articles: BTreeMap<ArticleId, Article>,
    pub movements: Vec<Movement>,

    pub locations: BTreeMap<LocationId, Location>,
    pub asset_states: BTreeMap<Code, AssetState>,
    pub asset_movement_types: BTreeMap<Code, AssetMovementType>,
    pub assets: BTreeMap<AssetId, Asset>,
    pub asset_movements: Vec<AssetMovement>,

    pub requisitions: BTreeMap<RequisitionId, Requisition>,
    pub requisition_history: History,

    pub suppliers: BTreeMap<SupplierId, Supplier>,
    pub purchase_orders: BTreeMap<PurchaseOrderId, PurchaseOrder>,
    pub purchase_order_history: History,

    pub write_off_reasons: BTreeMap<Code, WriteOffReason>,
    pub write_offs: BTreeMap<WriteOffId, WriteOff>,
    pub write_off_history: History,
}

impl Tables {
    /// Tables holding the default catalogs (movement types, asset states,
    /// asset movement types, write-off reasons).
    pub fn seeded() -> Self {
        let mut tables = Self::default();
        for row in MovementType::defaults() {
            tables.movement_types.insert(row.code.clone(), row);
        }
        for row in AssetState::defaults() {
            tables.asset_states.insert(row.code.clone(), row);
        }
        for row in AssetMovementType::defaults() {
            tables.asset_movement_types.insert(row.code.clone(), row);
        }
        for row in WriteOffReason::defaults() {
            tables.write_off_reasons.insert(row.code.clone(), row);
        }
        tables
    }

    pub fn movement_type(&self, code: &str) -> Result<&MovementType, DomainError> {
        self.movement_types
            .values()
            .find(|t| t.code == code)
            .ok_or_else(|| DomainError::not_found(format!("movement type {code}")))
    }

    pub fn asset_state(&self, code: &str) -> Result<&AssetState, DomainError> {
        self.asset_states
            .values()
            .find(|s| s.code == code)
            .ok_or_else(|| DomainError::not_found(format!("asset state {code}")))
    }

    pub fn asset_movement_type(&self, code: &str) -> Result<&AssetMovementType, DomainError> {
        self.asset_movement_types
            .values()
            .find(|t| t.code == code)
            .ok_or_else(|| DomainError::not_found(format!("asset movement type {code}")))
    }
}

/// Look up a row by id, or fail with `NotFound` naming `what`.
pub(crate) fn row<'a, K: Ord + std::fmt::Display, V>(
    table: &'a BTreeMap<K, V>,
    id: &K,
    what: &str,
) -> Result<&'a V, DomainError> {
    table
        .get(id)
        .ok_or_else(|| DomainError::not_found(format!("{what} {id}")))
}

pub(crate) fn row_mut<'a, K: Ord + std::fmt::Display, V>(
    table: &'a mut BTreeMap<K, V>,
    id: &K,
    what: &str,
) -> Result<&'a mut V, DomainError> {
    table
        .get_mut(id)
        .ok_or_else(|| DomainError::not_found(format!("{what} {id}")))
}

/// Decide a command against an aggregate after checking the caller's expected
/// version. Nothing is applied.
pub(crate) fn decide<A>(
    aggregate: &A,
    expected: ExpectedVersion,
    command: &A::Command,
) -> Result<Vec<A::Event>, DomainError>
where
    A: Aggregate<Error = DomainError>,
{
    expected.check(aggregate.version())?;
    aggregate.handle(command)
}

pub(crate) fn apply_all<A: Aggregate>(aggregate: &mut A, events: &[A::Event]) {
    for event in events {
        aggregate.apply(event);
    }
}

/// In-memory store with copy-on-write transactions.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: Tables) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Run `f` as one transaction. Writers are serialised; the draft is
    /// swapped in only when `f` succeeds.
    pub fn atomic<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut live = self.tables.write().map_err(|_| StoreError::Poisoned)?;
        let mut draft = live.clone();
        let out = f(&mut draft)?;
        *live = draft;
        Ok(out)
    }

    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let tables = self.tables.read().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&tables))
    }
}
