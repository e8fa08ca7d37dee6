use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use gestor_assets::{
    Asset, AssetCommand, AssetEvent, AssetId, AssetMovement, AssetState, ChangeAssetState,
    Location, LocationId, RecordMovement, RegisterAsset,
};
use gestor_auth::{authorize, permissions, Principal};
use gestor_core::{Code, DomainError, ExpectedVersion, UserId};
use gestor_events::EventBus;

use crate::projections::NoticeEnvelope;
use crate::services::{clean, ServiceContext};
use crate::store::{apply_all, decide, row, StoreError, Tables};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewLocation {
    pub code: String,
    pub name: String,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub area: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAsset {
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub serial_number: Option<String>,
    pub unit_price: Option<Decimal>,
    pub requires_serial: bool,
    pub requires_lot: bool,
    pub requires_expiry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssetMovement {
    /// Movement type code (`ASIGNACION`, `TRASLADO`, `BAJA`).
    pub movement_type: String,
    pub destination: Option<LocationId>,
    pub responsible: Option<UserId>,
    pub serial_number: Option<String>,
    pub lot: Option<String>,
    pub expires_on: Option<NaiveDate>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// A movement to record inside an open transaction.
pub(crate) struct AssetMove<'a> {
    pub asset_id: AssetId,
    pub movement_type: &'a str,
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

/// Record an asset movement and refresh its current location. A movement
/// without a serial number carries the asset's registered one.
pub(crate) fn move_asset(
    tables: &mut Tables,
    expected: ExpectedVersion,
    mv: AssetMove<'_>,
) -> Result<AssetMovement, DomainError> {
    let movement_type = tables.asset_movement_type(mv.movement_type)?.clone();
    if let Some(destination) = &mv.destination {
        row(&tables.locations, destination, "location")?;
    }

    let mut asset = row(&tables.assets, &mv.asset_id, "asset")?.clone();
    let serial_number = mv
        .serial_number
        .or_else(|| asset.serial_number().map(str::to_string));
    let cmd = AssetCommand::RecordMovement(RecordMovement {
        asset_id: mv.asset_id,
        movement_type,
        destination: mv.destination,
        responsible: mv.responsible,
        serial_number,
        lot: mv.lot,
        expires_on: mv.expires_on,
        reference: mv.reference,
        notes: mv.notes,
        recorded_by: mv.recorded_by,
        occurred_at: mv.occurred_at,
    });
    let events = decide(&asset, expected, &cmd)?;
    apply_all(&mut asset, &events);

    let movement = events
        .into_iter()
        .find_map(|event| match event {
            AssetEvent::AssetMoved(moved) => Some(moved.movement),
            _ => None,
        })
        .ok_or_else(|| DomainError::invariant("asset movement command produced no movement"))?;

    tables.assets.insert(asset.id_typed(), asset);
    tables.asset_movements.push(movement.clone());
    Ok(movement)
}

/// Move an asset to `state_code`; a no-op when it is already there.
pub(crate) fn set_asset_state(
    tables: &mut Tables,
    asset_id: AssetId,
    state_code: &str,
    occurred_at: DateTime<Utc>,
) -> Result<(), DomainError> {
    let state = tables.asset_state(state_code)?.clone();
    let mut asset = row(&tables.assets, &asset_id, "asset")?.clone();
    if asset.state().is_some_and(|s| s.code == state.code) {
        return Ok(());
    }

    let cmd = AssetCommand::ChangeState(ChangeAssetState {
        asset_id,
        state,
        occurred_at,
    });
    let events = decide(&asset, ExpectedVersion::Any, &cmd)?;
    apply_all(&mut asset, &events);
    tables.assets.insert(asset_id, asset);
    Ok(())
}

/// Locations, assets and the asset movement ledger.
#[derive(Debug)]
pub struct AssetService<B> {
    ctx: Arc<ServiceContext<B>>,
}

impl<B> AssetService<B>
where
    B: EventBus<NoticeEnvelope>,
{
    pub fn new(ctx: Arc<ServiceContext<B>>) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, input, actor), fields(code = %input.code, actor = %actor.user_id))]
    pub fn create_location(
        &self,
        input: NewLocation,
        actor: &Principal,
    ) -> Result<LocationId, StoreError> {
        authorize(actor, &permissions::assets::MANAGE_ASSETS)?;
        let mut location = Location::new(&input.code, &input.name)?;
        location.building = clean(input.building);
        location.floor = clean(input.floor);
        location.area = clean(input.area);

        self.ctx.commit(|tables| {
            if tables.locations.values().any(|l| l.code == location.code) {
                return Err(DomainError::conflict(format!(
                    "a location with code {} already exists",
                    location.code
                ))
                .into());
            }
            let id = location.id;
            tables.locations.insert(id, location);
            Ok((id, Vec::new()))
        })
    }

    #[instrument(skip(self, input, actor), fields(code = %input.code, actor = %actor.user_id))]
    pub fn register_asset(&self, input: NewAsset, actor: &Principal) -> Result<AssetId, StoreError> {
        authorize(actor, &permissions::assets::MANAGE_ASSETS)?;
        let code = Code::parse(&input.code)?;

        self.ctx.commit(|tables| {
            if tables.assets.values().any(|a| a.code() == Some(&code)) {
                return Err(
                    DomainError::conflict(format!("an asset with code {code} already exists")).into(),
                );
            }
            let initial_state = tables
                .asset_states
                .values()
                .find(|s| s.initial)
                .cloned()
                .ok_or_else(|| DomainError::not_found("initial asset state"))?;

            let asset_id = AssetId::generate();
            let cmd = AssetCommand::RegisterAsset(RegisterAsset {
                asset_id,
                code: code.to_string(),
                name: input.name,
                category: clean(input.category),
                initial_state,
                serial_number: clean(input.serial_number),
                unit_price: input.unit_price,
                requires_serial: input.requires_serial,
                requires_lot: input.requires_lot,
                requires_expiry: input.requires_expiry,
                occurred_at: Utc::now(),
            });
            let mut asset = Asset::empty(asset_id);
            let events = decide(&asset, ExpectedVersion::Exact(0), &cmd)?;
            apply_all(&mut asset, &events);
            tables.assets.insert(asset_id, asset);

            info!(%asset_id, %code, "asset registered");
            Ok((asset_id, Vec::new()))
        })
    }

    #[instrument(skip(self, input, actor), fields(%asset_id, movement_type = %input.movement_type, actor = %actor.user_id))]
    pub fn record_movement(
        &self,
        asset_id: AssetId,
        input: NewAssetMovement,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<AssetMovement, StoreError> {
        authorize(actor, &permissions::assets::MOVE_ASSETS)?;
        let movement_type = Code::parse(&input.movement_type)?;

        self.ctx.commit(|tables| {
            let movement = move_asset(
                tables,
                expected,
                AssetMove {
                    asset_id,
                    movement_type: movement_type.as_str(),
                    destination: input.destination,
                    responsible: input.responsible,
                    serial_number: clean(input.serial_number),
                    lot: clean(input.lot),
                    expires_on: input.expires_on,
                    reference: clean(input.reference),
                    notes: clean(input.notes),
                    recorded_by: actor.user_id,
                    occurred_at: Utc::now(),
                },
            )?;
            info!(%asset_id, movement_id = %movement.id, "asset movement recorded");
            Ok((movement, Vec::new()))
        })
    }

    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub fn change_state(
        &self,
        asset_id: AssetId,
        state: &str,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        authorize(actor, &permissions::assets::MANAGE_ASSETS)?;

        self.ctx.commit(|tables| {
            let state = tables.asset_state(state)?.clone();
            let mut asset = row(&tables.assets, &asset_id, "asset")?.clone();
            let cmd = AssetCommand::ChangeState(ChangeAssetState {
                asset_id,
                state,
                occurred_at: Utc::now(),
            });
            let events = decide(&asset, expected, &cmd)?;
            apply_all(&mut asset, &events);
            tables.assets.insert(asset_id, asset);
            Ok(((), Vec::new()))
        })
    }

    pub fn asset(&self, asset_id: AssetId) -> Result<Asset, StoreError> {
        self.ctx
            .read(|tables| row(&tables.assets, &asset_id, "asset").cloned())?
            .map_err(StoreError::from)
    }

    /// Movements of one asset, most recent first.
    pub fn movements_of(&self, asset_id: AssetId) -> Result<Vec<AssetMovement>, StoreError> {
        self.ctx.read(|tables| {
            let mut rows: Vec<AssetMovement> = tables
                .asset_movements
                .iter()
                .filter(|m| m.asset_id == asset_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
            rows
        })
    }

    pub fn states(&self) -> Result<Vec<AssetState>, StoreError> {
        self.ctx.read(|tables| tables.asset_states.values().cloned().collect())
    }
}
