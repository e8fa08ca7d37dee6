use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use gestor_assets::{AssetMovementType, AssetState};
use gestor_auth::Principal;
use gestor_core::{Code, DomainError, ExpectedVersion};
use gestor_events::EventBus;
use gestor_requisitions::{
    policy, AddLine, Approve, Cancel, ChangeStatus, CreateRequisition, Dispatch, DispatchedLine,
    LineDecision, Reject, RemoveLine, Requisition, RequisitionCommand, RequisitionEvent,
    RequisitionId, RequisitionItem, RequisitionKind, RequisitionLineId,
};
use gestor_warehouse::{MoveStock, MovementType, Operation, WarehouseId};
use gestor_workflow::{HistoryEntry, WorkflowHeader};

use crate::projections::NoticeEnvelope;
use crate::services::assets::{move_asset, set_asset_state, AssetMove};
use crate::services::warehouse::move_article_stock;
use crate::services::{apply_workflow_events, clean, ServiceContext};
use crate::store::{decide, row, StoreError, Tables};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequisition {
    /// Explicit number; generated from the configured sequence when `None`.
    pub number: Option<String>,
    pub kind: RequisitionKind,
    pub required_by: NaiveDate,
    pub reason: String,
    pub requester_area: String,
    pub activity_title: Option<String>,
    pub origin_warehouse: Option<WarehouseId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRequisitionLine {
    pub item: RequisitionItem,
    pub quantity: Decimal,
    pub notes: Option<String>,
}

/// Requisitions (solicitudes) and their dispatch side effects.
#[derive(Debug)]
pub struct RequisitionService<B> {
    ctx: Arc<ServiceContext<B>>,
}

impl<B> RequisitionService<B>
where
    B: EventBus<NoticeEnvelope>,
{
    pub fn new(ctx: Arc<ServiceContext<B>>) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, input, actor), fields(kind = ?input.kind, actor = %actor.user_id))]
    pub fn create(
        &self,
        input: NewRequisition,
        actor: &Principal,
    ) -> Result<RequisitionId, StoreError> {
        let numbers = self.ctx.config().requisition_numbers();

        self.ctx.commit(|tables| {
            let number = match clean(input.number) {
                Some(number) => {
                    if tables.requisitions.values().any(|r| r.number() == number) {
                        return Err(DomainError::conflict(format!(
                            "requisition number {number} is already in use"
                        ))
                        .into());
                    }
                    number
                }
                None => numbers.next(tables.requisitions.values().map(|r| r.number())),
            };
            if let Some(warehouse_id) = &input.origin_warehouse {
                row(&tables.warehouses, warehouse_id, "warehouse")?;
            }

            let requisition_id = RequisitionId::generate();
            let cmd = RequisitionCommand::Create(CreateRequisition {
                requisition_id,
                number,
                kind: input.kind,
                required_by: input.required_by,
                reason: input.reason,
                requester_area: input.requester_area,
                activity_title: clean(input.activity_title),
                origin_warehouse: input.origin_warehouse,
                actor: actor.clone(),
                occurred_at: Utc::now(),
            });
            let header = Requisition::empty(requisition_id);
            let notices = commit_header(tables, header, ExpectedVersion::Exact(0), &cmd)?;
            Ok((requisition_id, notices))
        })
    }

    #[instrument(skip(self, input, actor), fields(%requisition_id, actor = %actor.user_id))]
    pub fn add_line(
        &self,
        requisition_id: RequisitionId,
        input: NewRequisitionLine,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<RequisitionLineId, StoreError> {
        self.ctx.commit(|tables| {
            let header = row(&tables.requisitions, &requisition_id, "requisition")?.clone();
            match input.item {
                RequisitionItem::Asset(asset_id) => {
                    row(&tables.assets, &asset_id, "asset")?;
                }
                RequisitionItem::Article(article_id) => {
                    let article = row(&tables.articles, &article_id, "article")?;
                    if header.origin_warehouse() != Some(article.warehouse_id()) {
                        return Err(DomainError::validation(
                            "articulo: the article is not stocked in the origin warehouse",
                        )
                        .into());
                    }
                }
            }

            let line_id = RequisitionLineId::generate();
            let cmd = RequisitionCommand::AddLine(AddLine {
                line_id,
                item: input.item,
                quantity: input.quantity,
                notes: clean(input.notes),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            });
            let notices = commit_header(tables, header, expected, &cmd)?;
            Ok((line_id, notices))
        })
    }

    #[instrument(skip(self, actor), fields(%requisition_id, %line_id, actor = %actor.user_id))]
    pub fn remove_line(
        &self,
        requisition_id: RequisitionId,
        line_id: RequisitionLineId,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            requisition_id,
            expected,
            RequisitionCommand::RemoveLine(RemoveLine {
                line_id,
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Approve with per-line approved quantities.
    #[instrument(skip(self, lines, notes, actor), fields(%requisition_id, actor = %actor.user_id))]
    pub fn approve(
        &self,
        requisition_id: RequisitionId,
        lines: Vec<LineDecision>,
        notes: Option<String>,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            requisition_id,
            expected,
            RequisitionCommand::Approve(Approve {
                lines,
                notes: clean(notes),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self, reason, actor), fields(%requisition_id, actor = %actor.user_id))]
    pub fn reject(
        &self,
        requisition_id: RequisitionId,
        reason: &str,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            requisition_id,
            expected,
            RequisitionCommand::Reject(Reject {
                reason: reason.to_string(),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self, reason, actor), fields(%requisition_id, actor = %actor.user_id))]
    pub fn cancel(
        &self,
        requisition_id: RequisitionId,
        reason: &str,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            requisition_id,
            expected,
            RequisitionCommand::Cancel(Cancel {
                reason: reason.to_string(),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self, note, actor), fields(%requisition_id, actor = %actor.user_id))]
    pub fn change_status(
        &self,
        requisition_id: RequisitionId,
        status: &str,
        note: Option<String>,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            requisition_id,
            expected,
            RequisitionCommand::ChangeStatus(ChangeStatus {
                target: status.to_string(),
                note: clean(note),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Dispatch with per-line quantities. Article lines leave stock from the
    /// origin warehouse; asset lines are assigned to the requester. Any failing
    /// line rolls back the whole dispatch.
    #[instrument(skip(self, lines, notes, actor), fields(%requisition_id, actor = %actor.user_id))]
    pub fn dispatch(
        &self,
        requisition_id: RequisitionId,
        lines: Vec<LineDecision>,
        notes: Option<String>,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        let cmd = RequisitionCommand::Dispatch(Dispatch {
            lines,
            notes: clean(notes),
            actor: actor.clone(),
            occurred_at: Utc::now(),
        });

        self.ctx.commit(|tables| {
            let header = row(&tables.requisitions, &requisition_id, "requisition")?.clone();
            let events = decide(&header, expected, &cmd)?;

            for event in &events {
                if let RequisitionEvent::LinesDispatched { lines, .. } = event {
                    for line in lines.iter().filter(|l| l.quantity > Decimal::ZERO) {
                        dispatch_line(tables, &header, line, actor)?;
                    }
                }
            }

            let notices = apply_header(tables, header, &events);
            Ok(((), notices))
        })
    }

    pub fn get(&self, requisition_id: RequisitionId) -> Result<Requisition, StoreError> {
        self.ctx
            .read(|tables| row(&tables.requisitions, &requisition_id, "requisition").cloned())?
            .map_err(StoreError::from)
    }

    /// Status history of one requisition, oldest first.
    pub fn history(&self, requisition_id: RequisitionId) -> Result<Vec<HistoryEntry>, StoreError> {
        self.ctx
            .read(|tables| tables.requisition_history.for_header(requisition_id.0))
    }

    /// Requisitions, optionally filtered by status code, newest number first.
    pub fn list(&self, status: Option<&str>) -> Result<Vec<Requisition>, StoreError> {
        self.ctx.read(|tables| {
            let mut rows: Vec<Requisition> = tables
                .requisitions
                .values()
                .filter(|r| status.is_none_or(|code| r.workflow().status.code == code))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.number().cmp(a.number()));
            rows
        })
    }

    fn mutate(
        &self,
        requisition_id: RequisitionId,
        expected: ExpectedVersion,
        cmd: RequisitionCommand,
    ) -> Result<(), StoreError> {
        self.ctx.commit(|tables| {
            let header = row(&tables.requisitions, &requisition_id, "requisition")?.clone();
            let notices = commit_header(tables, header, expected, &cmd)?;
            Ok(((), notices))
        })
    }
}

fn commit_header(
    tables: &mut Tables,
    header: Requisition,
    expected: ExpectedVersion,
    cmd: &RequisitionCommand,
) -> Result<Vec<NoticeEnvelope>, StoreError> {
    let events = decide(&header, expected, cmd)?;
    Ok(apply_header(tables, header, &events))
}

fn apply_header(
    tables: &mut Tables,
    mut header: Requisition,
    events: &[RequisitionEvent],
) -> Vec<NoticeEnvelope> {
    let id = header.id_typed();
    let notices = apply_workflow_events(
        policy().module,
        id.0,
        &mut header,
        &mut tables.requisition_history,
        events,
        RequisitionEvent::status_change,
    );
    tables.requisitions.insert(id, header);
    notices
}

fn dispatch_line(
    tables: &mut Tables,
    header: &Requisition,
    line: &DispatchedLine,
    actor: &Principal,
) -> Result<(), DomainError> {
    let now = Utc::now();
    match line.item {
        RequisitionItem::Article(article_id) => {
            let movement = move_article_stock(
                tables,
                ExpectedVersion::Any,
                MoveStock {
                    article_id,
                    operation: Operation::Exit,
                    movement_type: Code::from_static(MovementType::DISPATCH),
                    quantity: line.quantity,
                    actor: actor.user_id,
                    reason: format!("Despacho solicitud {}", header.number()),
                    reference: Some(header.number().to_string()),
                    occurred_at: now,
                },
            )?;
            info!(
                %article_id,
                quantity = %movement.quantity,
                stock_after = %movement.stock_after,
                "requisition line dispatched from stock"
            );
        }
        RequisitionItem::Asset(asset_id) => {
            move_asset(
                tables,
                ExpectedVersion::Any,
                AssetMove {
                    asset_id,
                    movement_type: AssetMovementType::ASSIGNMENT,
                    destination: None,
                    responsible: Some(header.requester()),
                    serial_number: None,
                    lot: None,
                    expires_on: None,
                    reference: Some(header.number().to_string()),
                    notes: None,
                    recorded_by: actor.user_id,
                    occurred_at: now,
                },
            )?;
            set_asset_state(tables, asset_id, AssetState::ASSIGNED, now)?;
            info!(%asset_id, requester = %header.requester(), "asset assigned");
        }
    }
    Ok(())
}
