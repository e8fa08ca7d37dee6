use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestor_core::{ensure_non_negative, ensure_not_blank, Aggregate, AggregateRoot, Code, DomainError};
use gestor_events::Event;

use crate::catalog::AssetState;
use crate::movement::{decide_movement, AssetMovement, CurrentLocation, RecordMovement};

gestor_core::aggregate_id!(
    /// Asset identifier.
    AssetId
);

/// Aggregate root: Asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    id: AssetId,
    code: Option<Code>,
    name: String,
    category: Option<Code>,
    state: Option<AssetState>,
    serial_number: Option<String>,
    unit_price: Option<Decimal>,
    requires_serial: bool,
    requires_lot: bool,
    requires_expiry: bool,
    current: Option<CurrentLocation>,
    version: u64,
    created: bool,
}

impl Asset {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: AssetId) -> Self {
        Self {
            id,
            code: None,
            name: String::new(),
            category: None,
            state: None,
            serial_number: None,
            unit_price: None,
            requires_serial: false,
            requires_lot: false,
            requires_expiry: false,
            current: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> AssetId {
        self.id
    }

    pub fn code(&self) -> Option<&Code> {
        self.code.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Option<&Code> {
        self.category.as_ref()
    }

    pub fn state(&self) -> Option<&AssetState> {
        self.state.as_ref()
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn unit_price(&self) -> Option<Decimal> {
        self.unit_price
    }

    pub fn requires_serial(&self) -> bool {
        self.requires_serial
    }

    pub fn requires_lot(&self) -> bool {
        self.requires_lot
    }

    pub fn requires_expiry(&self) -> bool {
        self.requires_expiry
    }

    pub fn current_location(&self) -> Option<&CurrentLocation> {
        self.current.as_ref()
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Asset {
    type Id = AssetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterAsset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAsset {
    pub asset_id: AssetId,
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    /// The asset state catalog's initial row.
    pub initial_state: AssetState,
    pub serial_number: Option<String>,
    pub unit_price: Option<Decimal>,
    pub requires_serial: bool,
    pub requires_lot: bool,
    pub requires_expiry: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeAssetState.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeAssetState {
    pub asset_id: AssetId,
    pub state: AssetState,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetCommand {
    RegisterAsset(RegisterAsset),
    RecordMovement(RecordMovement),
    ChangeState(ChangeAssetState),
}

/// Event: AssetRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRegistered {
    pub asset_id: AssetId,
    pub code: Code,
    pub name: String,
    pub category: Option<Code>,
    pub state: AssetState,
    pub serial_number: Option<String>,
    pub unit_price: Option<Decimal>,
    pub requires_serial: bool,
    pub requires_lot: bool,
    pub requires_expiry: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssetMoved. The movement row and the new current location go together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMoved {
    pub movement: AssetMovement,
}

/// Event: AssetStateChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetStateChanged {
    pub asset_id: AssetId,
    pub previous: Option<Code>,
    pub state: AssetState,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetEvent {
    AssetRegistered(AssetRegistered),
    AssetMoved(AssetMoved),
    AssetStateChanged(AssetStateChanged),
}

impl Event for AssetEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AssetEvent::AssetRegistered(_) => "assets.asset.registered",
            AssetEvent::AssetMoved(_) => "assets.asset.moved",
            AssetEvent::AssetStateChanged(_) => "assets.asset.state_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AssetEvent::AssetRegistered(e) => e.occurred_at,
            AssetEvent::AssetMoved(e) => e.movement.occurred_at,
            AssetEvent::AssetStateChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Asset {
    type Command = AssetCommand;
    type Event = AssetEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AssetEvent::AssetRegistered(e) => {
                self.id = e.asset_id;
                self.code = Some(e.code.clone());
                self.name = e.name.clone();
                self.category = e.category.clone();
                self.state = Some(e.state.clone());
                self.serial_number = e.serial_number.clone();
                self.unit_price = e.unit_price;
                self.requires_serial = e.requires_serial;
                self.requires_lot = e.requires_lot;
                self.requires_expiry = e.requires_expiry;
                self.current = None;
                self.created = true;
            }
            AssetEvent::AssetMoved(e) => {
                self.current = Some(CurrentLocation::after(&e.movement));
                if e.movement.serial_number.is_some() {
                    self.serial_number = e.movement.serial_number.clone();
                }
            }
            AssetEvent::AssetStateChanged(e) => {
                self.state = Some(e.state.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AssetCommand::RegisterAsset(cmd) => self.handle_register(cmd),
            AssetCommand::RecordMovement(cmd) => self.handle_move(cmd),
            AssetCommand::ChangeState(cmd) => self.handle_change_state(cmd),
        }
    }
}

impl Asset {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("asset {}", self.id)));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterAsset) -> Result<Vec<AssetEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("asset already exists"));
        }
        ensure_not_blank("nombre", &cmd.name)?;
        if !cmd.initial_state.initial {
            return Err(DomainError::invariant("assets must start in the initial state"));
        }
        if let Some(price) = cmd.unit_price {
            ensure_non_negative("precio_unitario", price)?;
        }
        let category = cmd.category.as_deref().map(Code::parse).transpose()?;

        Ok(vec![AssetEvent::AssetRegistered(AssetRegistered {
            asset_id: cmd.asset_id,
            code: Code::parse(&cmd.code)?,
            name: cmd.name.trim().to_string(),
            category,
            state: cmd.initial_state.clone(),
            serial_number: cmd.serial_number.clone(),
            unit_price: cmd.unit_price,
            requires_serial: cmd.requires_serial,
            requires_lot: cmd.requires_lot,
            requires_expiry: cmd.requires_expiry,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_move(&self, cmd: &RecordMovement) -> Result<Vec<AssetEvent>, DomainError> {
        self.ensure_created()?;
        if self.id != cmd.asset_id {
            return Err(DomainError::invariant("asset_id mismatch"));
        }
        let movement = decide_movement(self, cmd)?;
        Ok(vec![AssetEvent::AssetMoved(AssetMoved { movement })])
    }

    fn handle_change_state(&self, cmd: &ChangeAssetState) -> Result<Vec<AssetEvent>, DomainError> {
        self.ensure_created()?;
        let previous = self.state.as_ref().map(|s| s.code.clone());
        if previous.as_ref() == Some(&cmd.state.code) {
            return Err(DomainError::invalid_state(format!(
                "asset is already in state {}",
                cmd.state.code
            )));
        }
        Ok(vec![AssetEvent::AssetStateChanged(AssetStateChanged {
            asset_id: self.id,
            previous,
            state: cmd.state.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AssetMovementType, LocationId};
    use gestor_core::{execute, UserId};
    use rust_decimal_macros::dec;

    fn state(code: &str) -> AssetState {
        AssetState::defaults()
            .into_iter()
            .find(|s| s.code == code)
            .unwrap()
    }

    fn movement_type(code: &str) -> AssetMovementType {
        AssetMovementType::defaults()
            .into_iter()
            .find(|t| t.code == code)
            .unwrap()
    }

    fn registered(requires_serial: bool) -> Asset {
        let id = AssetId::generate();
        let mut asset = Asset::empty(id);
        let cmd = RegisterAsset {
            asset_id: id,
            code: " nb-001 ".into(),
            name: "Notebook Lenovo".into(),
            category: Some("computacion".into()),
            initial_state: state(AssetState::AVAILABLE),
            serial_number: None,
            unit_price: Some(dec!(650000)),
            requires_serial,
            requires_lot: false,
            requires_expiry: false,
            occurred_at: Utc::now(),
        };
        execute(&mut asset, &AssetCommand::RegisterAsset(cmd)).unwrap();
        asset
    }

    fn move_cmd(asset: &Asset, kind: &str) -> RecordMovement {
        RecordMovement {
            asset_id: asset.id_typed(),
            movement_type: movement_type(kind),
            destination: None,
            responsible: None,
            serial_number: None,
            lot: None,
            expires_on: None,
            reference: None,
            notes: None,
            recorded_by: UserId::new(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn register_normalizes_code_and_category() {
        let asset = registered(false);
        assert_eq!(asset.code().unwrap(), "NB-001");
        assert_eq!(asset.category().unwrap(), "COMPUTACION");
        assert!(asset.current_location().is_none());
    }

    #[test]
    fn register_requires_initial_state() {
        let id = AssetId::generate();
        let cmd = RegisterAsset {
            asset_id: id,
            code: "X".into(),
            name: "X".into(),
            category: None,
            initial_state: state(AssetState::ASSIGNED),
            serial_number: None,
            unit_price: None,
            requires_serial: false,
            requires_lot: false,
            requires_expiry: false,
            occurred_at: Utc::now(),
        };
        assert!(Asset::empty(id).handle(&AssetCommand::RegisterAsset(cmd)).is_err());
    }

    #[test]
    fn movement_updates_current_location() {
        let mut asset = registered(false);
        let destination = LocationId::generate();
        let responsible = UserId::new();
        let mut cmd = move_cmd(&asset, AssetMovementType::TRANSFER);
        cmd.destination = Some(destination);
        cmd.responsible = Some(responsible);

        let events = execute(&mut asset, &AssetCommand::RecordMovement(cmd)).unwrap();
        let AssetEvent::AssetMoved(moved) = &events[0] else {
            panic!("expected AssetMoved");
        };
        let current = asset.current_location().unwrap();
        assert_eq!(current.location, Some(destination));
        assert_eq!(current.responsible, Some(responsible));
        assert_eq!(current.last_movement, moved.movement.id);
    }

    #[test]
    fn movement_type_flags_are_enforced_together() {
        let asset = registered(true);
        let cmd = move_cmd(&asset, AssetMovementType::TRANSFER);
        let err = asset.handle(&AssetCommand::RecordMovement(cmd)).unwrap_err();
        let DomainError::Validation(msg) = err else {
            panic!("expected validation error");
        };
        assert!(msg.contains("numero_serie"));
        assert!(msg.contains("ubicacion_destino"));
        assert!(msg.contains("responsable"));
    }

    #[test]
    fn frozen_state_blocks_movements() {
        let mut asset = registered(false);
        let change = ChangeAssetState {
            asset_id: asset.id_typed(),
            state: state(AssetState::IN_REPAIR),
            occurred_at: Utc::now(),
        };
        execute(&mut asset, &AssetCommand::ChangeState(change)).unwrap();

        let cmd = move_cmd(&asset, AssetMovementType::WRITE_OFF);
        let err = asset.handle(&AssetCommand::RecordMovement(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }
}
