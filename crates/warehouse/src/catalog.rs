use serde::{Deserialize, Serialize};

use gestor_core::{ensure_not_blank, Code, DomainResult, Entity, UserId};

gestor_core::aggregate_id!(
    /// Warehouse (bodega) identifier.
    WarehouseId
);

gestor_core::aggregate_id!(
    /// Article category identifier.
    CategoryId
);

/// A physical warehouse; articles are stocked in exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub code: Code,
    pub name: String,
    pub manager: Option<UserId>,
    pub active: bool,
}

impl Warehouse {
    pub fn new(code: &str, name: &str, manager: Option<UserId>) -> DomainResult<Self> {
        ensure_not_blank("nombre", name)?;
        Ok(Self {
            id: WarehouseId::generate(),
            code: Code::parse(code)?,
            name: name.trim().to_string(),
            manager,
            active: true,
        })
    }
}

impl Entity for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub code: Code,
    pub name: String,
}

impl Category {
    pub fn new(code: &str, name: &str) -> DomainResult<Self> {
        ensure_not_blank("nombre", name)?;
        Ok(Self {
            id: CategoryId::generate(),
            code: Code::parse(code)?,
            name: name.trim().to_string(),
        })
    }
}

impl Entity for Category {
    type Id = CategoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Movement type catalog row (purchase reception, requisition dispatch, adjustment...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementType {
    pub code: Code,
    pub name: String,
}

impl MovementType {
    pub const PURCHASE: &'static str = "COMPRA";
    pub const DISPATCH: &'static str = "DESPACHO";
    pub const ADJUSTMENT: &'static str = "AJUSTE";

    pub fn new(code: &str, name: &str) -> DomainResult<Self> {
        ensure_not_blank("nombre", name)?;
        Ok(Self {
            code: Code::parse(code)?,
            name: name.trim().to_string(),
        })
    }

    pub fn defaults() -> Vec<Self> {
        [
            (Self::PURCHASE, "Recepción de compra"),
            (Self::DISPATCH, "Despacho de solicitud"),
            (Self::ADJUSTMENT, "Ajuste de inventario"),
        ]
        .into_iter()
        .map(|(code, name)| Self {
            code: Code::from_static(code),
            name: name.to_string(),
        })
        .collect()
    }
}
