use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use gestor_assets::{AssetId, AssetMovementType, AssetState};
use gestor_auth::Principal;
use gestor_core::{Code, DomainError, ExpectedVersion};
use gestor_events::EventBus;
use gestor_warehouse::WarehouseId;
use gestor_workflow::{HistoryEntry, WorkflowHeader};
use gestor_writeoffs::{
    policy, AddLine, Authorize, ChangeStatus, Confirm, CreateWriteOff, Reject, RemoveLine,
    WriteOff, WriteOffCommand, WriteOffEvent, WriteOffId, WriteOffLine, WriteOffLineId,
    WriteOffReason,
};

use crate::projections::NoticeEnvelope;
use crate::services::assets::{move_asset, set_asset_state, AssetMove};
use crate::services::{apply_workflow_events, clean, ServiceContext};
use crate::store::{decide, row, StoreError, Tables};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWriteOff {
    /// Reason code (`OBSOLESCENCIA`, `ROBO`, ...).
    pub reason: String,
    pub write_off_date: NaiveDate,
    pub warehouse_id: WarehouseId,
    pub description: String,
    pub notes: Option<String>,
    pub document: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWriteOffLine {
    pub asset_id: AssetId,
    pub quantity: Decimal,
    /// Defaults to the asset's unit price (zero when it has none).
    pub unit_value: Option<Decimal>,
    pub lot: Option<String>,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug)]
pub struct WriteOffService<B> {
    ctx: Arc<ServiceContext<B>>,
}

impl<B> WriteOffService<B>
where
    B: EventBus<NoticeEnvelope>,
{
    pub fn new(ctx: Arc<ServiceContext<B>>) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, input, actor), fields(reason = %input.reason, actor = %actor.user_id))]
    pub fn create(&self, input: NewWriteOff, actor: &Principal) -> Result<WriteOffId, StoreError> {
        let numbers = self.ctx.config().write_off_numbers();
        let reason_code = Code::parse(&input.reason)?;

        self.ctx.commit(|tables| {
            let reason = lookup_reason(tables, &reason_code)?.clone();
            row(&tables.warehouses, &input.warehouse_id, "warehouse")?;

            let write_off_id = WriteOffId::generate();
            let cmd = WriteOffCommand::Create(CreateWriteOff {
                write_off_id,
                number: numbers.next(tables.write_offs.values().map(|w| w.number())),
                write_off_date: input.write_off_date,
                reason,
                warehouse_id: input.warehouse_id,
                description: input.description,
                notes: clean(input.notes),
                document: clean(input.document),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            });
            let header = WriteOff::empty(write_off_id);
            let notices = commit_header(tables, header, ExpectedVersion::Exact(0), &cmd)?;
            Ok((write_off_id, notices))
        })
    }

    #[instrument(skip(self, input, actor), fields(%write_off_id, asset_id = %input.asset_id, actor = %actor.user_id))]
    pub fn add_line(
        &self,
        write_off_id: WriteOffId,
        input: NewWriteOffLine,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<WriteOffLineId, StoreError> {
        self.ctx.commit(|tables| {
            let header = row(&tables.write_offs, &write_off_id, "write-off")?.clone();
            let asset = row(&tables.assets, &input.asset_id, "asset")?;
            let unit_value = input
                .unit_value
                .or_else(|| asset.unit_price())
                .unwrap_or(Decimal::ZERO);
            let serial_number =
                clean(input.serial_number).or_else(|| asset.serial_number().map(str::to_string));

            let line_id = WriteOffLineId::generate();
            let cmd = WriteOffCommand::AddLine(AddLine {
                line_id,
                asset_id: input.asset_id,
                quantity: input.quantity,
                unit_value,
                lot: clean(input.lot),
                serial_number,
                notes: clean(input.notes),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            });
            let notices = commit_header(tables, header, expected, &cmd)?;
            Ok((line_id, notices))
        })
    }

    #[instrument(skip(self, actor), fields(%write_off_id, %line_id, actor = %actor.user_id))]
    pub fn remove_line(
        &self,
        write_off_id: WriteOffId,
        line_id: WriteOffLineId,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            write_off_id,
            expected,
            WriteOffCommand::RemoveLine(RemoveLine {
                line_id,
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self, notes, actor), fields(%write_off_id, actor = %actor.user_id))]
    pub fn authorize(
        &self,
        write_off_id: WriteOffId,
        notes: Option<String>,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            write_off_id,
            expected,
            WriteOffCommand::Authorize(Authorize {
                notes: clean(notes),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self, reason, actor), fields(%write_off_id, actor = %actor.user_id))]
    pub fn reject(
        &self,
        write_off_id: WriteOffId,
        reason: &str,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            write_off_id,
            expected,
            WriteOffCommand::Reject(Reject {
                reason: reason.to_string(),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self, note, actor), fields(%write_off_id, actor = %actor.user_id))]
    pub fn change_status(
        &self,
        write_off_id: WriteOffId,
        status: &str,
        note: Option<String>,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            write_off_id,
            expected,
            WriteOffCommand::ChangeStatus(ChangeStatus {
                target: status.to_string(),
                note: clean(note),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Confirm the write-off: every line becomes a BAJA movement and its
    /// asset is marked DADO_DE_BAJA, all in one transaction.
    #[instrument(skip(self, notes, actor), fields(%write_off_id, actor = %actor.user_id))]
    pub fn confirm(
        &self,
        write_off_id: WriteOffId,
        notes: Option<String>,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        let cmd = WriteOffCommand::Confirm(Confirm {
            notes: clean(notes),
            actor: actor.clone(),
            occurred_at: Utc::now(),
        });

        self.ctx.commit(|tables| {
            let header = row(&tables.write_offs, &write_off_id, "write-off")?.clone();
            let events = decide(&header, expected, &cmd)?;

            for event in &events {
                if let WriteOffEvent::AssetsWrittenOff { lines, occurred_at } = event {
                    for line in lines {
                        write_off_asset(tables, &header, line, actor, *occurred_at)?;
                    }
                }
            }

            let notices = apply_header(tables, header, &events);
            Ok(((), notices))
        })
    }

    pub fn get(&self, write_off_id: WriteOffId) -> Result<WriteOff, StoreError> {
        self.ctx
            .read(|tables| row(&tables.write_offs, &write_off_id, "write-off").cloned())?
            .map_err(StoreError::from)
    }

    pub fn history(&self, write_off_id: WriteOffId) -> Result<Vec<HistoryEntry>, StoreError> {
        self.ctx
            .read(|tables| tables.write_off_history.for_header(write_off_id.0))
    }

    /// Active reasons.
    pub fn reasons(&self) -> Result<Vec<WriteOffReason>, StoreError> {
        self.ctx.read(|tables| {
            tables
                .write_off_reasons
                .values()
                .filter(|r| r.active)
                .cloned()
                .collect()
        })
    }

    fn mutate(
        &self,
        write_off_id: WriteOffId,
        expected: ExpectedVersion,
        cmd: WriteOffCommand,
    ) -> Result<(), StoreError> {
        self.ctx.commit(|tables| {
            let header = row(&tables.write_offs, &write_off_id, "write-off")?.clone();
            let notices = commit_header(tables, header, expected, &cmd)?;
            Ok(((), notices))
        })
    }
}

fn lookup_reason<'a>(tables: &'a Tables, code: &Code) -> Result<&'a WriteOffReason, DomainError> {
    tables
        .write_off_reasons
        .get(code)
        .ok_or_else(|| DomainError::not_found(format!("write-off reason {code}")))
}

fn commit_header(
    tables: &mut Tables,
    header: WriteOff,
    expected: ExpectedVersion,
    cmd: &WriteOffCommand,
) -> Result<Vec<NoticeEnvelope>, StoreError> {
    let events = decide(&header, expected, cmd)?;
    Ok(apply_header(tables, header, &events))
}

fn apply_header(
    tables: &mut Tables,
    mut header: WriteOff,
    events: &[WriteOffEvent],
) -> Vec<NoticeEnvelope> {
    let id = header.id_typed();
    let notices = apply_workflow_events(
        policy().module,
        id.0,
        &mut header,
        &mut tables.write_off_history,
        events,
        WriteOffEvent::status_change,
    );
    tables.write_offs.insert(id, header);
    notices
}

fn write_off_asset(
    tables: &mut Tables,
    header: &WriteOff,
    line: &WriteOffLine,
    actor: &Principal,
    occurred_at: DateTime<Utc>,
) -> Result<(), DomainError> {
    move_asset(
        tables,
        ExpectedVersion::Any,
        AssetMove {
            asset_id: line.asset_id,
            movement_type: AssetMovementType::WRITE_OFF,
            destination: None,
            responsible: None,
            serial_number: line.serial_number.clone(),
            lot: line.lot.clone(),
            expires_on: None,
            reference: Some(header.number().to_string()),
            notes: line.notes.clone(),
            recorded_by: actor.user_id,
            occurred_at,
        },
    )?;
    set_asset_state(tables, line.asset_id, AssetState::WRITTEN_OFF, occurred_at)?;
    info!(asset_id = %line.asset_id, number = header.number(), "asset written off");
    Ok(())
}
