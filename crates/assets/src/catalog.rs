use serde::{Deserialize, Serialize};

use gestor_core::{ensure_not_blank, Code, DomainResult, Entity};

gestor_core::aggregate_id!(
    /// Physical location (building, floor, area) identifier.
    LocationId
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub code: Code,
    pub name: String,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub area: Option<String>,
}

impl Location {
    pub fn new(code: &str, name: &str) -> DomainResult<Self> {
        ensure_not_blank("nombre", name)?;
        Ok(Self {
            id: LocationId::generate(),
            code: Code::parse(code)?,
            name: name.trim().to_string(),
            building: None,
            floor: None,
            area: None,
        })
    }
}

impl Entity for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Asset state catalog row. States that do not allow movement freeze the asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetState {
    pub code: Code,
    pub name: String,
    pub initial: bool,
    pub allows_movement: bool,
}

impl AssetState {
    pub const AVAILABLE: &'static str = "DISPONIBLE";
    pub const ASSIGNED: &'static str = "ASIGNADO";
    pub const IN_REPAIR: &'static str = "EN_REPARACION";
    pub const WRITTEN_OFF: &'static str = "DADO_DE_BAJA";

    pub fn defaults() -> Vec<Self> {
        [
            (Self::AVAILABLE, "Disponible", true, true),
            (Self::ASSIGNED, "Asignado", false, true),
            (Self::IN_REPAIR, "En reparación", false, false),
            (Self::WRITTEN_OFF, "Dado de baja", false, false),
        ]
        .into_iter()
        .map(|(code, name, initial, allows_movement)| Self {
            code: Code::from_static(code),
            name: name.to_string(),
            initial,
            allows_movement,
        })
        .collect()
    }
}

/// Asset movement type; flags say which movement fields are mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMovementType {
    pub code: Code,
    pub name: String,
    pub requires_location: bool,
    pub requires_responsible: bool,
}

impl AssetMovementType {
    pub const ASSIGNMENT: &'static str = "ASIGNACION";
    pub const TRANSFER: &'static str = "TRASLADO";
    pub const WRITE_OFF: &'static str = "BAJA";

    pub fn new(code: &str, name: &str, requires_location: bool, requires_responsible: bool) -> DomainResult<Self> {
        ensure_not_blank("nombre", name)?;
        Ok(Self {
            code: Code::parse(code)?,
            name: name.trim().to_string(),
            requires_location,
            requires_responsible,
        })
    }

    pub fn defaults() -> Vec<Self> {
        [
            (Self::ASSIGNMENT, "Asignación", false, true),
            (Self::TRANSFER, "Traslado", true, true),
            (Self::WRITE_OFF, "Baja", false, false),
        ]
        .into_iter()
        .map(|(code, name, requires_location, requires_responsible)| Self {
            code: Code::from_static(code),
            name: name.to_string(),
            requires_location,
            requires_responsible,
        })
        .collect()
    }
}
