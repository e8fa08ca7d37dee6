use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestor_auth::{authorize, permissions, Principal};
use gestor_core::{
    contains_id, ensure_not_blank, find_by_id, Aggregate, AggregateRoot, DomainError, UserId,
};
use gestor_events::Event;
use gestor_warehouse::WarehouseId;
use gestor_workflow::{
    approve_line, codes, decide_status_change, decide_transition, dispatch_line, LineQuantities,
    StatusChanged, TransitionPolicy, WorkflowHeader, WorkflowState,
};

use crate::line::{LineDecision, RequisitionItem, RequisitionKind, RequisitionLine, RequisitionLineId};

gestor_core::aggregate_id!(
    /// Requisition identifier.
    RequisitionId
);

static POLICY: LazyLock<TransitionPolicy> = LazyLock::new(TransitionPolicy::requisitions);

/// Status catalog and transition rules for requisitions.
pub fn policy() -> &'static TransitionPolicy {
    &POLICY
}

/// Aggregate root: Requisition (Solicitud).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requisition {
    id: RequisitionId,
    number: String,
    kind: RequisitionKind,
    required_by: Option<NaiveDate>,
    reason: String,
    requester_area: String,
    activity_title: Option<String>,
    origin_warehouse: Option<WarehouseId>,
    approval_notes: Option<String>,
    dispatch_notes: Option<String>,
    workflow: WorkflowState,
    lines: Vec<RequisitionLine>,
    version: u64,
    created: bool,
}

impl Requisition {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: RequisitionId) -> Self {
        Self {
            id,
            number: String::new(),
            kind: RequisitionKind::Article,
            required_by: None,
            reason: String::new(),
            requester_area: String::new(),
            activity_title: None,
            origin_warehouse: None,
            approval_notes: None,
            dispatch_notes: None,
            workflow: WorkflowState::new(policy().catalog.initial().clone(), UserId::default()),
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RequisitionId {
        self.id
    }

    pub fn kind(&self) -> RequisitionKind {
        self.kind
    }

    pub fn required_by(&self) -> Option<NaiveDate> {
        self.required_by
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn requester_area(&self) -> &str {
        &self.requester_area
    }

    pub fn activity_title(&self) -> Option<&str> {
        self.activity_title.as_deref()
    }

    pub fn origin_warehouse(&self) -> Option<WarehouseId> {
        self.origin_warehouse
    }

    pub fn approval_notes(&self) -> Option<&str> {
        self.approval_notes.as_deref()
    }

    pub fn dispatch_notes(&self) -> Option<&str> {
        self.dispatch_notes.as_deref()
    }

    pub fn lines(&self) -> &[RequisitionLine] {
        &self.lines
    }

    pub fn line(&self, line_id: RequisitionLineId) -> Option<&RequisitionLine> {
        find_by_id(&self.lines, &line_id)
    }

    pub fn requester(&self) -> UserId {
        self.workflow.requester
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Requisition {
    type Id = RequisitionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl WorkflowHeader for Requisition {
    fn workflow(&self) -> &WorkflowState {
        &self.workflow
    }

    fn number(&self) -> &str {
        &self.number
    }
}

/// Command: CreateRequisition. `number` is assigned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequisition {
    pub requisition_id: RequisitionId,
    pub number: String,
    pub kind: RequisitionKind,
    pub required_by: NaiveDate,
    pub reason: String,
    pub requester_area: String,
    pub activity_title: Option<String>,
    pub origin_warehouse: Option<WarehouseId>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub line_id: RequisitionLineId,
    pub item: RequisitionItem,
    pub quantity: Decimal,
    pub notes: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub line_id: RequisitionLineId,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve. Lines not listed keep an approved quantity of zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub lines: Vec<LineDecision>,
    pub notes: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub reason: String,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    pub lines: Vec<LineDecision>,
    pub notes: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancel {
    pub reason: String,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus (generic transition to any catalog status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub target: String,
    pub note: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequisitionCommand {
    Create(CreateRequisition),
    AddLine(AddLine),
    RemoveLine(RemoveLine),
    Approve(Approve),
    Reject(Reject),
    Dispatch(Dispatch),
    Cancel(Cancel),
    ChangeStatus(ChangeStatus),
}

/// Event: RequisitionCreated. `change` is the creation history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionCreated {
    pub requisition_id: RequisitionId,
    pub number: String,
    pub kind: RequisitionKind,
    pub required_by: NaiveDate,
    pub reason: String,
    pub requester_area: String,
    pub activity_title: Option<String>,
    pub origin_warehouse: Option<WarehouseId>,
    pub change: StatusChanged,
}

/// A dispatched quantity together with the product it moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchedLine {
    pub line_id: RequisitionLineId,
    pub item: RequisitionItem,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequisitionEvent {
    RequisitionCreated(RequisitionCreated),
    LineAdded {
        line: RequisitionLine,
        occurred_at: DateTime<Utc>,
    },
    LineRemoved {
        line_id: RequisitionLineId,
        occurred_at: DateTime<Utc>,
    },
    LinesApproved {
        lines: Vec<LineDecision>,
        notes: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    LinesDispatched {
        lines: Vec<DispatchedLine>,
        notes: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    StatusChanged(StatusChanged),
}

impl RequisitionEvent {
    /// The status change this event records, if any (one history row each).
    pub fn status_change(&self) -> Option<&StatusChanged> {
        match self {
            RequisitionEvent::RequisitionCreated(e) => Some(&e.change),
            RequisitionEvent::StatusChanged(c) => Some(c),
            _ => None,
        }
    }
}

impl Event for RequisitionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequisitionEvent::RequisitionCreated(_) => "requisitions.requisition.created",
            RequisitionEvent::LineAdded { .. } => "requisitions.requisition.line_added",
            RequisitionEvent::LineRemoved { .. } => "requisitions.requisition.line_removed",
            RequisitionEvent::LinesApproved { .. } => "requisitions.requisition.lines_approved",
            RequisitionEvent::LinesDispatched { .. } => "requisitions.requisition.lines_dispatched",
            RequisitionEvent::StatusChanged(_) => "requisitions.requisition.status_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequisitionEvent::RequisitionCreated(e) => e.change.occurred_at,
            RequisitionEvent::LineAdded { occurred_at, .. }
            | RequisitionEvent::LineRemoved { occurred_at, .. }
            | RequisitionEvent::LinesApproved { occurred_at, .. }
            | RequisitionEvent::LinesDispatched { occurred_at, .. } => *occurred_at,
            RequisitionEvent::StatusChanged(c) => c.occurred_at,
        }
    }
}

impl Aggregate for Requisition {
    type Command = RequisitionCommand;
    type Event = RequisitionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequisitionEvent::RequisitionCreated(e) => {
                self.id = e.requisition_id;
                self.number = e.number.clone();
                self.kind = e.kind;
                self.required_by = Some(e.required_by);
                self.reason = e.reason.clone();
                self.requester_area = e.requester_area.clone();
                self.activity_title = e.activity_title.clone();
                self.origin_warehouse = e.origin_warehouse;
                self.workflow = WorkflowState::new(e.change.to.clone(), e.change.actor);
                self.lines.clear();
                self.created = true;
            }
            RequisitionEvent::LineAdded { line, .. } => {
                self.lines.push(line.clone());
            }
            RequisitionEvent::LineRemoved { line_id, .. } => {
                self.lines.retain(|l| l.id != *line_id);
            }
            RequisitionEvent::LinesApproved { lines, notes, .. } => {
                for decision in lines {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.id == decision.line_id) {
                        line.quantities.approved = decision.quantity;
                    }
                }
                self.approval_notes = notes.clone();
            }
            RequisitionEvent::LinesDispatched { lines, notes, .. } => {
                for dispatched in lines {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.id == dispatched.line_id) {
                        line.quantities.dispatched = dispatched.quantity;
                    }
                }
                self.dispatch_notes = notes.clone();
            }
            RequisitionEvent::StatusChanged(change) => {
                self.workflow.apply(change);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if !matches!(command, RequisitionCommand::Create(_)) && !self.created {
            return Err(DomainError::not_found(format!("requisition {}", self.id)));
        }
        match command {
            RequisitionCommand::Create(cmd) => self.handle_create(cmd),
            RequisitionCommand::AddLine(cmd) => self.handle_add_line(cmd),
            RequisitionCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            RequisitionCommand::Approve(cmd) => self.handle_approve(cmd),
            RequisitionCommand::Reject(cmd) => self.handle_reject(cmd),
            RequisitionCommand::Dispatch(cmd) => self.handle_dispatch(cmd),
            RequisitionCommand::Cancel(cmd) => self.handle_cancel(cmd),
            RequisitionCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

impl Requisition {
    /// The requester may edit their own requisition; anyone else needs the change permission.
    fn ensure_may_edit(&self, actor: &Principal) -> Result<(), DomainError> {
        if actor.user_id == self.workflow.requester {
            return Ok(());
        }
        authorize(actor, &permissions::requisitions::CHANGE)?;
        Ok(())
    }

    fn find_line(&self, line_id: RequisitionLineId) -> Result<&RequisitionLine, DomainError> {
        self.line(line_id)
            .ok_or_else(|| DomainError::not_found(format!("requisition line {line_id}")))
    }

    fn handle_create(&self, cmd: &CreateRequisition) -> Result<Vec<RequisitionEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("requisition already exists"));
        }
        authorize(&cmd.actor, &permissions::requisitions::CREATE)?;
        ensure_not_blank("numero", &cmd.number)?;
        ensure_not_blank("motivo", &cmd.reason)?;
        ensure_not_blank("area_solicitante", &cmd.requester_area)?;

        if cmd.required_by < cmd.occurred_at.date_naive() {
            return Err(DomainError::validation(
                "fecha_requerida: the required date cannot be earlier than today",
            ));
        }
        if cmd.kind == RequisitionKind::Article && cmd.origin_warehouse.is_none() {
            return Err(DomainError::validation(
                "bodega_origen: article requisitions require an origin warehouse",
            ));
        }

        let change = StatusChanged::created(
            policy().catalog.initial().clone(),
            cmd.actor.user_id,
            cmd.occurred_at,
        );

        Ok(vec![RequisitionEvent::RequisitionCreated(RequisitionCreated {
            requisition_id: cmd.requisition_id,
            number: cmd.number.trim().to_string(),
            kind: cmd.kind,
            required_by: cmd.required_by,
            reason: cmd.reason.trim().to_string(),
            requester_area: cmd.requester_area.trim().to_string(),
            activity_title: cmd.activity_title.clone().filter(|t| !t.trim().is_empty()),
            origin_warehouse: cmd.origin_warehouse,
            change,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<RequisitionEvent>, DomainError> {
        self.workflow.ensure_editable("requisition lines")?;
        self.ensure_may_edit(&cmd.actor)?;

        if cmd.item.kind() != self.kind {
            return Err(DomainError::validation(format!(
                "a {:?} requisition cannot contain {:?} lines",
                self.kind,
                cmd.item.kind()
            )));
        }
        if contains_id(&self.lines, &cmd.line_id) {
            return Err(DomainError::conflict(format!("line {} already exists", cmd.line_id)));
        }

        let quantities = LineQuantities::requested(cmd.quantity)?;
        Ok(vec![RequisitionEvent::LineAdded {
            line: RequisitionLine {
                id: cmd.line_id,
                item: cmd.item,
                quantities,
                notes: cmd.notes.clone(),
            },
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<RequisitionEvent>, DomainError> {
        self.workflow.ensure_editable("requisition lines")?;
        self.ensure_may_edit(&cmd.actor)?;
        self.find_line(cmd.line_id)?;

        Ok(vec![RequisitionEvent::LineRemoved {
            line_id: cmd.line_id,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_approve(&self, cmd: &Approve) -> Result<Vec<RequisitionEvent>, DomainError> {
        let change = decide_transition(
            policy(),
            &self.workflow,
            codes::APPROVED,
            &cmd.actor,
            cmd.notes.clone(),
            cmd.occurred_at,
        )?;

        if self.workflow.is_approved() {
            return Err(DomainError::invalid_state("requisition was already approved"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("requisition has no lines to approve"));
        }

        ensure_distinct_lines(&cmd.lines)?;
        for decision in &cmd.lines {
            let line = self.find_line(decision.line_id)?;
            approve_line(&line.quantities, decision.quantity)?;
        }

        Ok(vec![
            RequisitionEvent::LinesApproved {
                lines: cmd.lines.clone(),
                notes: cmd.notes.clone(),
                occurred_at: cmd.occurred_at,
            },
            RequisitionEvent::StatusChanged(change),
        ])
    }

    fn handle_reject(&self, cmd: &Reject) -> Result<Vec<RequisitionEvent>, DomainError> {
        ensure_not_blank("motivo_rechazo", &cmd.reason)?;
        let change = decide_transition(
            policy(),
            &self.workflow,
            codes::REJECTED,
            &cmd.actor,
            Some(cmd.reason.trim().to_string()),
            cmd.occurred_at,
        )?;
        Ok(vec![RequisitionEvent::StatusChanged(change)])
    }

    fn handle_dispatch(&self, cmd: &Dispatch) -> Result<Vec<RequisitionEvent>, DomainError> {
        // The dispatch rule only leaves APROBADA, so a dispatched or
        // unapproved requisition fails here.
        let change = decide_transition(
            policy(),
            &self.workflow,
            codes::DISPATCHED,
            &cmd.actor,
            cmd.notes.clone(),
            cmd.occurred_at,
        )?;
        ensure_distinct_lines(&cmd.lines)?;

        let mut dispatched = Vec::with_capacity(cmd.lines.len());
        for decision in &cmd.lines {
            let line = self.find_line(decision.line_id)?;
            dispatch_line(&line.quantities, decision.quantity)?;
            dispatched.push(DispatchedLine {
                line_id: line.id,
                item: line.item,
                quantity: decision.quantity,
            });
        }

        Ok(vec![
            RequisitionEvent::LinesDispatched {
                lines: dispatched,
                notes: cmd.notes.clone(),
                occurred_at: cmd.occurred_at,
            },
            RequisitionEvent::StatusChanged(change),
        ])
    }

    fn handle_cancel(&self, cmd: &Cancel) -> Result<Vec<RequisitionEvent>, DomainError> {
        if self.workflow.is_final() {
            return Err(DomainError::invalid_state("cannot cancel a finished requisition"));
        }
        ensure_not_blank("motivo_cancelacion", &cmd.reason)?;
        let change = decide_transition(
            policy(),
            &self.workflow,
            codes::CANCELLED,
            &cmd.actor,
            Some(cmd.reason.trim().to_string()),
            cmd.occurred_at,
        )?;
        Ok(vec![RequisitionEvent::StatusChanged(change)])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<RequisitionEvent>, DomainError> {
        let change = decide_status_change(
            policy(),
            &self.workflow,
            &cmd.target,
            &cmd.actor,
            cmd.note.clone(),
            cmd.occurred_at,
        )?;
        Ok(vec![RequisitionEvent::StatusChanged(change)])
    }
}

/// Each line may appear once per approval or dispatch.
fn ensure_distinct_lines(decisions: &[LineDecision]) -> Result<(), DomainError> {
    let mut seen = HashSet::with_capacity(decisions.len());
    for decision in decisions {
        if !seen.insert(decision.line_id) {
            return Err(DomainError::validation(format!(
                "line {} appears more than once",
                decision.line_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gestor_core::execute;
    use gestor_warehouse::ArticleId;
    use gestor_assets::AssetId;
    use rust_decimal_macros::dec;

    fn requester() -> Principal {
        Principal::new(UserId::new(), "Solicitante")
            .with_permissions([permissions::requisitions::CREATE])
    }

    fn approver() -> Principal {
        Principal::new(UserId::new(), "Aprobadora").with_permissions([
            permissions::requisitions::APPROVE,
            permissions::requisitions::REJECT,
        ])
    }

    fn keeper() -> Principal {
        Principal::new(UserId::new(), "Bodeguero")
            .with_permissions([permissions::requisitions::DISPATCH])
    }

    fn create_cmd(actor: &Principal) -> CreateRequisition {
        let now = Utc::now();
        CreateRequisition {
            requisition_id: RequisitionId::generate(),
            number: "SOL-00000001".into(),
            kind: RequisitionKind::Article,
            required_by: now.date_naive() + Duration::days(3),
            reason: "Materiales de oficina".into(),
            requester_area: "Finanzas".into(),
            activity_title: None,
            origin_warehouse: Some(WarehouseId::generate()),
            actor: actor.clone(),
            occurred_at: now,
        }
    }

    fn created(actor: &Principal) -> Requisition {
        let cmd = create_cmd(actor);
        let mut req = Requisition::empty(cmd.requisition_id);
        execute(&mut req, &RequisitionCommand::Create(cmd)).unwrap();
        req
    }

    fn with_line(actor: &Principal, qty: Decimal) -> (Requisition, RequisitionLineId) {
        let mut req = created(actor);
        let line_id = RequisitionLineId::generate();
        let add = AddLine {
            line_id,
            item: RequisitionItem::Article(ArticleId::generate()),
            quantity: qty,
            notes: None,
            actor: actor.clone(),
            occurred_at: Utc::now(),
        };
        execute(&mut req, &RequisitionCommand::AddLine(add)).unwrap();
        (req, line_id)
    }

    fn approve(req: &mut Requisition, line_id: RequisitionLineId, qty: Decimal) -> Vec<RequisitionEvent> {
        let cmd = Approve {
            lines: vec![LineDecision { line_id, quantity: qty }],
            notes: Some("ok".into()),
            actor: approver(),
            occurred_at: Utc::now(),
        };
        execute(req, &RequisitionCommand::Approve(cmd)).unwrap()
    }

    #[test]
    fn create_starts_pending_with_creation_row() {
        let actor = requester();
        let cmd = create_cmd(&actor);
        let req = Requisition::empty(cmd.requisition_id);
        let events = req.handle(&RequisitionCommand::Create(cmd)).unwrap();
        let change = events[0].status_change().unwrap();
        assert!(change.from.is_none());
        assert_eq!(change.to.code, codes::PENDING);
        assert_eq!(change.actor, actor.user_id);
    }

    #[test]
    fn create_rejects_past_required_date() {
        let actor = requester();
        let mut cmd = create_cmd(&actor);
        cmd.required_by = cmd.occurred_at.date_naive() - Duration::days(1);
        let err = Requisition::empty(cmd.requisition_id)
            .handle(&RequisitionCommand::Create(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("fecha_requerida")));
    }

    #[test]
    fn article_requisition_requires_origin_warehouse() {
        let actor = requester();
        let mut cmd = create_cmd(&actor);
        cmd.origin_warehouse = None;
        assert!(
            Requisition::empty(cmd.requisition_id)
                .handle(&RequisitionCommand::Create(cmd))
                .is_err()
        );
    }

    #[test]
    fn line_kind_must_match_requisition_kind() {
        let actor = requester();
        let req = created(&actor);
        let add = AddLine {
            line_id: RequisitionLineId::generate(),
            item: RequisitionItem::Asset(AssetId::generate()),
            quantity: dec!(1),
            notes: None,
            actor: actor.clone(),
            occurred_at: Utc::now(),
        };
        assert!(req.handle(&RequisitionCommand::AddLine(add)).is_err());
    }

    #[test]
    fn approve_sets_quantities_status_and_stamp() {
        let actor = requester();
        let (mut req, line_id) = with_line(&actor, dec!(10));

        let events = approve(&mut req, line_id, dec!(7));

        assert_eq!(events.iter().filter(|e| e.status_change().is_some()).count(), 1);
        assert_eq!(req.workflow().status.code, codes::APPROVED);
        assert_eq!(req.line(line_id).unwrap().quantities.approved, dec!(7));
        assert!(req.workflow().approver.is_some());
        assert_eq!(req.approval_notes(), Some("ok"));
    }

    #[test]
    fn approve_above_requested_changes_nothing() {
        let actor = requester();
        let (mut req, line_id) = with_line(&actor, dec!(10));
        let before = req.clone();
        let cmd = Approve {
            lines: vec![LineDecision { line_id, quantity: dec!(11) }],
            notes: None,
            actor: approver(),
            occurred_at: Utc::now(),
        };
        assert!(execute(&mut req, &RequisitionCommand::Approve(cmd)).is_err());
        assert_eq!(req, before);
    }

    #[test]
    fn approve_without_lines_fails() {
        let actor = requester();
        let req = created(&actor);
        let cmd = Approve {
            lines: vec![],
            notes: None,
            actor: approver(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            req.handle(&RequisitionCommand::Approve(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn requester_cannot_approve_own_requisition_without_permission() {
        let actor = requester();
        let (req, line_id) = with_line(&actor, dec!(1));
        let cmd = Approve {
            lines: vec![LineDecision { line_id, quantity: dec!(1) }],
            notes: None,
            actor: actor.clone(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            req.handle(&RequisitionCommand::Approve(cmd)),
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[test]
    fn dispatch_requires_approval_and_respects_approved_quantity() {
        let actor = requester();
        let (mut req, line_id) = with_line(&actor, dec!(10));

        let early = Dispatch {
            lines: vec![LineDecision { line_id, quantity: dec!(1) }],
            notes: None,
            actor: keeper(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            req.handle(&RequisitionCommand::Dispatch(early)),
            Err(DomainError::InvalidState(_))
        ));

        approve(&mut req, line_id, dec!(7));

        let too_much = Dispatch {
            lines: vec![LineDecision { line_id, quantity: dec!(8) }],
            notes: None,
            actor: keeper(),
            occurred_at: Utc::now(),
        };
        assert!(req.handle(&RequisitionCommand::Dispatch(too_much)).is_err());

        let ok = Dispatch {
            lines: vec![LineDecision { line_id, quantity: dec!(7) }],
            notes: Some("entregado".into()),
            actor: keeper(),
            occurred_at: Utc::now(),
        };
        let events = execute(&mut req, &RequisitionCommand::Dispatch(ok)).unwrap();
        let RequisitionEvent::LinesDispatched { lines, .. } = &events[0] else {
            panic!("expected LinesDispatched");
        };
        assert_eq!(lines[0].quantity, dec!(7));
        assert_eq!(req.workflow().status.code, codes::DISPATCHED);
        assert!(req.workflow().is_final());
        assert_eq!(req.line(line_id).unwrap().quantities.dispatched, dec!(7));

        let again = Dispatch {
            lines: vec![LineDecision { line_id, quantity: dec!(0) }],
            notes: None,
            actor: keeper(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            req.handle(&RequisitionCommand::Dispatch(again)),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn repeated_line_in_approval_or_dispatch_is_rejected() {
        let actor = requester();
        let (mut req, line_id) = with_line(&actor, dec!(10));
        let twice = vec![
            LineDecision { line_id, quantity: dec!(4) },
            LineDecision { line_id, quantity: dec!(4) },
        ];

        let cmd = Approve {
            lines: twice.clone(),
            notes: None,
            actor: approver(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            req.handle(&RequisitionCommand::Approve(cmd)),
            Err(DomainError::Validation(_))
        ));

        approve(&mut req, line_id, dec!(8));
        let before = req.clone();
        let cmd = Dispatch {
            lines: twice,
            notes: None,
            actor: keeper(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            execute(&mut req, &RequisitionCommand::Dispatch(cmd)),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(req, before);
    }

    #[test]
    fn generic_status_change_cannot_approve_or_dispatch() {
        let actor = requester();
        let (req, _) = with_line(&actor, dec!(10));
        let admin = Principal::new(UserId::new(), "admin").with_permissions([permissions::ALL]);

        for target in [codes::APPROVED, codes::DISPATCHED] {
            let cmd = ChangeStatus {
                target: target.into(),
                note: None,
                actor: admin.clone(),
                occurred_at: Utc::now(),
            };
            assert!(matches!(
                req.handle(&RequisitionCommand::ChangeStatus(cmd)),
                Err(DomainError::InvalidState(_))
            ));
        }
    }

    #[test]
    fn reject_and_cancel_require_a_reason() {
        let actor = requester();
        let req = created(&actor);
        let reject = Reject {
            reason: "  ".into(),
            actor: approver(),
            occurred_at: Utc::now(),
        };
        assert!(req.handle(&RequisitionCommand::Reject(reject)).is_err());

        let cancel = Cancel {
            reason: String::new(),
            actor: actor.clone(),
            occurred_at: Utc::now(),
        };
        assert!(req.handle(&RequisitionCommand::Cancel(cancel)).is_err());
    }

    #[test]
    fn finished_requisition_rejects_edits_and_cancel() {
        let actor = requester();
        let (mut req, line_id) = with_line(&actor, dec!(2));
        let reject = Reject {
            reason: "sin presupuesto".into(),
            actor: approver(),
            occurred_at: Utc::now(),
        };
        execute(&mut req, &RequisitionCommand::Reject(reject)).unwrap();

        let remove = RemoveLine {
            line_id,
            actor: actor.clone(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            req.handle(&RequisitionCommand::RemoveLine(remove)),
            Err(DomainError::InvalidState(_))
        ));

        let cancel = Cancel {
            reason: "ya no se necesita".into(),
            actor: actor.clone(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            req.handle(&RequisitionCommand::Cancel(cancel)),
            Err(DomainError::InvalidState(_))
        ));
    }

    #[test]
    fn commands_on_missing_requisition_are_not_found() {
        let req = Requisition::empty(RequisitionId::generate());
        let cancel = Cancel {
            reason: "x".into(),
            actor: requester(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            req.handle(&RequisitionCommand::Cancel(cancel)),
            Err(DomainError::NotFound(_))
        ));
    }
}
