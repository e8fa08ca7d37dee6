use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use gestor_core::{DomainError, DomainResult, Entity, UserId};

use crate::asset::{Asset, AssetId};
use crate::catalog::{AssetMovementType, LocationId};

gestor_core::aggregate_id!(
    /// Asset movement identifier.
    AssetMovementId
);

/// Command payload: record an asset movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMovement {
    pub asset_id: AssetId,
    pub movement_type: AssetMovementType,
    pub destination: Option<LocationId>,
    pub responsible: Option<UserId>,
    pub serial_number: Option<String>,
    pub lot: Option<String>,
    pub expires_on: Option<NaiveDate>,
    /// Document that caused the movement (requisition, write-off number).
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Asset ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMovement {
    pub id: AssetMovementId,
    pub asset_id: AssetId,
    pub movement_type: AssetMovementType,
    pub destination: Option<LocationId>,
    pub responsible: Option<UserId>,
    pub serial_number: Option<String>,
    pub lot: Option<String>,
    pub expires_on: Option<NaiveDate>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl Entity for AssetMovement {
    type Id = AssetMovementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Where an asset is now and who holds it; replaced on every movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentLocation {
    pub location: Option<LocationId>,
    pub responsible: Option<UserId>,
    pub last_movement: AssetMovementId,
    pub updated_at: DateTime<Utc>,
}

impl CurrentLocation {
    pub fn after(movement: &AssetMovement) -> Self {
        Self {
            location: movement.destination,
            responsible: movement.responsible,
            last_movement: movement.id,
            updated_at: movement.occurred_at,
        }
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// Validate a movement against the asset's tracking flags, the movement type and
/// the asset's current state.
pub(crate) fn decide_movement(asset: &Asset, cmd: &RecordMovement) -> DomainResult<AssetMovement> {
    let mut missing = Vec::new();
    if asset.requires_serial() && blank(&cmd.serial_number) {
        missing.push("numero_serie: this asset requires a serial number");
    }
    if asset.requires_lot() && blank(&cmd.lot) {
        missing.push("lote: this asset requires a lot");
    }
    if asset.requires_expiry() && cmd.expires_on.is_none() {
        missing.push("fecha_vencimiento: this asset requires an expiry date");
    }
    if cmd.movement_type.requires_location && cmd.destination.is_none() {
        missing.push("ubicacion_destino: this movement type requires a destination");
    }
    if cmd.movement_type.requires_responsible && cmd.responsible.is_none() {
        missing.push("responsable: this movement type requires a responsible user");
    }
    if !missing.is_empty() {
        return Err(DomainError::validation(missing.join("; ")));
    }

    if let Some(state) = asset.state() {
        if !state.allows_movement {
            return Err(DomainError::invalid_state(format!(
                "asset is in state \"{}\" which does not allow movements",
                state.name
            )));
        }
    }

    Ok(AssetMovement {
        id: AssetMovementId::generate(),
        asset_id: asset.id_typed(),
        movement_type: cmd.movement_type.clone(),
        destination: cmd.destination,
        responsible: cmd.responsible,
        serial_number: cmd.serial_number.clone(),
        lot: cmd.lot.clone(),
        expires_on: cmd.expires_on,
        reference: cmd.reference.clone(),
        notes: cmd.notes.clone(),
        recorded_by: cmd.recorded_by,
        occurred_at: cmd.occurred_at,
    })
}
