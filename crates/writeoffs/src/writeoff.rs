use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestor_assets::AssetId;
use gestor_auth::{authorize, permissions, Principal};
use gestor_core::{
    add_checked, contains_id, ensure_non_negative, ensure_not_blank, ensure_positive, mul_checked,
    sum_checked, Aggregate, AggregateRoot, DomainError, Entity, UserId,
};
use gestor_events::Event;
use gestor_warehouse::WarehouseId;
use gestor_workflow::{
    codes, decide_status_change, decide_transition, StatusChanged, TransitionPolicy,
    WorkflowHeader, WorkflowState,
};

use crate::reason::WriteOffReason;

gestor_core::aggregate_id!(
    /// Write-off identifier.
    WriteOffId
);

gestor_core::aggregate_id!(
    /// Write-off line identifier.
    WriteOffLineId
);

static POLICY: LazyLock<TransitionPolicy> = LazyLock::new(TransitionPolicy::write_offs);

pub fn policy() -> &'static TransitionPolicy {
    &POLICY
}

/// One asset being written off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOffLine {
    pub id: WriteOffLineId,
    pub asset_id: AssetId,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    pub total_value: Decimal,
    pub lot: Option<String>,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
}

impl Entity for WriteOffLine {
    type Id = WriteOffLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Aggregate root: WriteOff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOff {
    id: WriteOffId,
    number: String,
    write_off_date: Option<NaiveDate>,
    reason: Option<WriteOffReason>,
    warehouse_id: Option<WarehouseId>,
    description: String,
    notes: Option<String>,
    document: Option<String>,
    authorization_notes: Option<String>,
    total_value: Decimal,
    workflow: WorkflowState,
    lines: Vec<WriteOffLine>,
    version: u64,
    created: bool,
}

impl WriteOff {
    pub fn empty(id: WriteOffId) -> Self {
        Self {
            id,
            number: String::new(),
            write_off_date: None,
            reason: None,
            warehouse_id: None,
            description: String::new(),
            notes: None,
            document: None,
            authorization_notes: None,
            total_value: Decimal::ZERO,
            workflow: WorkflowState::new(policy().catalog.initial().clone(), UserId::default()),
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> WriteOffId {
        self.id
    }

    pub fn write_off_date(&self) -> Option<NaiveDate> {
        self.write_off_date
    }

    pub fn reason(&self) -> Option<&WriteOffReason> {
        self.reason.as_ref()
    }

    pub fn warehouse_id(&self) -> Option<WarehouseId> {
        self.warehouse_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    pub fn authorization_notes(&self) -> Option<&str> {
        self.authorization_notes.as_deref()
    }

    pub fn total_value(&self) -> Decimal {
        self.total_value
    }

    pub fn lines(&self) -> &[WriteOffLine] {
        &self.lines
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    fn requires_authorization(&self) -> bool {
        self.reason.as_ref().is_some_and(|r| r.requires_authorization)
    }
}

impl AggregateRoot for WriteOff {
    type Id = WriteOffId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl WorkflowHeader for WriteOff {
    fn workflow(&self) -> &WorkflowState {
        &self.workflow
    }

    fn number(&self) -> &str {
        &self.number
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateWriteOff {
    pub write_off_id: WriteOffId,
    pub number: String,
    pub write_off_date: NaiveDate,
    pub reason: WriteOffReason,
    pub warehouse_id: WarehouseId,
    pub description: String,
    pub notes: Option<String>,
    /// Reference to the supporting document (resolution, police report...).
    pub document: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub line_id: WriteOffLineId,
    pub asset_id: AssetId,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    pub lot: Option<String>,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub line_id: WriteOffLineId,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorize {
    pub notes: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub reason: String,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirm {
    pub notes: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub target: String,
    pub note: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOffCommand {
    Create(CreateWriteOff),
    AddLine(AddLine),
    RemoveLine(RemoveLine),
    Authorize(Authorize),
    Reject(Reject),
    Confirm(Confirm),
    ChangeStatus(ChangeStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOffCreated {
    pub write_off_id: WriteOffId,
    pub number: String,
    pub write_off_date: NaiveDate,
    pub reason: WriteOffReason,
    pub warehouse_id: WarehouseId,
    pub description: String,
    pub notes: Option<String>,
    pub document: Option<String>,
    pub change: StatusChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOffEvent {
    Created(WriteOffCreated),
    LineAdded {
        line: WriteOffLine,
        total_value: Decimal,
        occurred_at: DateTime<Utc>,
    },
    LineRemoved {
        line_id: WriteOffLineId,
        total_value: Decimal,
        occurred_at: DateTime<Utc>,
    },
    /// Emitted on confirmation; every line becomes a write-off movement in
    /// the asset ledger.
    AssetsWrittenOff {
        lines: Vec<WriteOffLine>,
        occurred_at: DateTime<Utc>,
    },
    StatusChanged(StatusChanged),
}

impl WriteOffEvent {
    pub fn status_change(&self) -> Option<&StatusChanged> {
        match self {
            WriteOffEvent::Created(e) => Some(&e.change),
            WriteOffEvent::StatusChanged(c) => Some(c),
            _ => None,
        }
    }
}

impl Event for WriteOffEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WriteOffEvent::Created(_) => "writeoffs.write_off.created",
            WriteOffEvent::LineAdded { .. } => "writeoffs.write_off.line_added",
            WriteOffEvent::LineRemoved { .. } => "writeoffs.write_off.line_removed",
            WriteOffEvent::AssetsWrittenOff { .. } => "writeoffs.write_off.assets_written_off",
            WriteOffEvent::StatusChanged(_) => "writeoffs.write_off.status_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WriteOffEvent::Created(e) => e.change.occurred_at,
            WriteOffEvent::LineAdded { occurred_at, .. }
            | WriteOffEvent::LineRemoved { occurred_at, .. }
            | WriteOffEvent::AssetsWrittenOff { occurred_at, .. } => *occurred_at,
            WriteOffEvent::StatusChanged(c) => c.occurred_at,
        }
    }
}

impl Aggregate for WriteOff {
    type Command = WriteOffCommand;
    type Event = WriteOffEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            WriteOffEvent::Created(e) => {
                self.id = e.write_off_id;
                self.number = e.number.clone();
                self.write_off_date = Some(e.write_off_date);
                self.reason = Some(e.reason.clone());
                self.warehouse_id = Some(e.warehouse_id);
                self.description = e.description.clone();
                self.notes = e.notes.clone();
                self.document = e.document.clone();
                self.total_value = Decimal::ZERO;
                self.workflow = WorkflowState::new(e.change.to.clone(), e.change.actor);
                self.lines.clear();
                self.created = true;
            }
            WriteOffEvent::LineAdded {
                line, total_value, ..
            } => {
                self.lines.push(line.clone());
                self.total_value = *total_value;
            }
            WriteOffEvent::LineRemoved {
                line_id,
                total_value,
                ..
            } => {
                self.lines.retain(|l| l.id != *line_id);
                self.total_value = *total_value;
            }
            WriteOffEvent::AssetsWrittenOff { .. } => {}
            WriteOffEvent::StatusChanged(change) => {
                if change.to.code == codes::AUTHORIZED {
                    self.authorization_notes = change.note.clone();
                }
                self.workflow.apply(change);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if !matches!(command, WriteOffCommand::Create(_)) && !self.created {
            return Err(DomainError::not_found(format!("write-off {}", self.id)));
        }
        match command {
            WriteOffCommand::Create(cmd) => self.handle_create(cmd),
            WriteOffCommand::AddLine(cmd) => self.handle_add_line(cmd),
            WriteOffCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            WriteOffCommand::Authorize(cmd) => self.handle_authorize(cmd),
            WriteOffCommand::Reject(cmd) => self.handle_reject(cmd),
            WriteOffCommand::Confirm(cmd) => self.handle_confirm(cmd),
            WriteOffCommand::ChangeStatus(cmd) => {
                let change = decide_status_change(
                    policy(),
                    &self.workflow,
                    &cmd.target,
                    &cmd.actor,
                    cmd.note.clone(),
                    cmd.occurred_at,
                )?;
                Ok(vec![WriteOffEvent::StatusChanged(change)])
            }
        }
    }
}

impl WriteOff {
    fn ensure_may_edit(&self, actor: &Principal) -> Result<(), DomainError> {
        self.workflow.ensure_editable("write-off")?;
        if actor.user_id != self.workflow.requester {
            authorize(actor, &permissions::writeoffs::CHANGE)?;
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateWriteOff) -> Result<Vec<WriteOffEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("write-off already exists"));
        }
        authorize(&cmd.actor, &permissions::writeoffs::CREATE)?;
        ensure_not_blank("numero", &cmd.number)?;
        ensure_not_blank("descripcion", &cmd.description)?;

        if !cmd.reason.active {
            return Err(DomainError::validation("motivo: the reason is not active"));
        }
        if cmd.write_off_date > cmd.occurred_at.date_naive() {
            return Err(DomainError::validation(
                "fecha_baja: the write-off date cannot be in the future",
            ));
        }
        let document = cmd
            .document
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        if cmd.reason.requires_document && document.is_none() {
            return Err(DomainError::validation(
                "documento: this reason requires a supporting document",
            ));
        }

        let change = StatusChanged::created(
            policy().catalog.initial().clone(),
            cmd.actor.user_id,
            cmd.occurred_at,
        );

        Ok(vec![WriteOffEvent::Created(WriteOffCreated {
            write_off_id: cmd.write_off_id,
            number: cmd.number.trim().to_string(),
            write_off_date: cmd.write_off_date,
            reason: cmd.reason.clone(),
            warehouse_id: cmd.warehouse_id,
            description: cmd.description.trim().to_string(),
            notes: cmd.notes.clone(),
            document: document.map(str::to_string),
            change,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<WriteOffEvent>, DomainError> {
        self.ensure_may_edit(&cmd.actor)?;
        ensure_positive("cantidad", cmd.quantity)?;
        ensure_non_negative("valor_unitario", cmd.unit_value)?;
        if contains_id(&self.lines, &cmd.line_id) {
            return Err(DomainError::conflict(format!("line {} already exists", cmd.line_id)));
        }

        let line = WriteOffLine {
            id: cmd.line_id,
            asset_id: cmd.asset_id,
            quantity: cmd.quantity,
            unit_value: cmd.unit_value,
            total_value: mul_checked("valor_total", cmd.quantity, cmd.unit_value)?,
            lot: cmd.lot.clone(),
            serial_number: cmd.serial_number.clone(),
            notes: cmd.notes.clone(),
        };
        let total_value = add_checked("valor_total", self.total_value, line.total_value)?;

        Ok(vec![WriteOffEvent::LineAdded {
            line,
            total_value,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<WriteOffEvent>, DomainError> {
        self.ensure_may_edit(&cmd.actor)?;
        if !contains_id(&self.lines, &cmd.line_id) {
            return Err(DomainError::not_found(format!("write-off line {}", cmd.line_id)));
        }

        let total_value = sum_checked(
            "valor_total",
            self.lines
                .iter()
                .filter(|l| l.id != cmd.line_id)
                .map(|l| l.total_value),
        )?;

        Ok(vec![WriteOffEvent::LineRemoved {
            line_id: cmd.line_id,
            total_value,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_authorize(&self, cmd: &Authorize) -> Result<Vec<WriteOffEvent>, DomainError> {
        let change = decide_transition(
            policy(),
            &self.workflow,
            codes::AUTHORIZED,
            &cmd.actor,
            cmd.notes.clone(),
            cmd.occurred_at,
        )?;
        if !self.requires_authorization() {
            return Err(DomainError::invalid_state(
                "this write-off reason does not require authorization",
            ));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("write-off has no lines to authorize"));
        }
        Ok(vec![WriteOffEvent::StatusChanged(change)])
    }

    fn handle_reject(&self, cmd: &Reject) -> Result<Vec<WriteOffEvent>, DomainError> {
        ensure_not_blank("motivo_rechazo", &cmd.reason)?;
        let change = decide_transition(
            policy(),
            &self.workflow,
            codes::REJECTED,
            &cmd.actor,
            Some(cmd.reason.trim().to_string()),
            cmd.occurred_at,
        )?;
        Ok(vec![WriteOffEvent::StatusChanged(change)])
    }

    fn handle_confirm(&self, cmd: &Confirm) -> Result<Vec<WriteOffEvent>, DomainError> {
        let change = decide_transition(
            policy(),
            &self.workflow,
            codes::CONFIRMED,
            &cmd.actor,
            cmd.notes.clone(),
            cmd.occurred_at,
        )?;
        if self.requires_authorization() && self.workflow.approver.is_none() {
            return Err(DomainError::invalid_state(
                "the write-off must be authorized before it is confirmed",
            ));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("write-off has no lines to confirm"));
        }

        Ok(vec![
            WriteOffEvent::AssetsWrittenOff {
                lines: self.lines.clone(),
                occurred_at: cmd.occurred_at,
            },
            WriteOffEvent::StatusChanged(change),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gestor_core::execute;
    use rust_decimal_macros::dec;

    fn clerk() -> Principal {
        Principal::new(UserId::new(), "Encargada de inventario").with_permissions([
            permissions::writeoffs::CREATE,
            permissions::writeoffs::CHANGE,
        ])
    }

    fn authorizer() -> Principal {
        Principal::new(UserId::new(), "Jefatura")
            .with_permissions([permissions::writeoffs::AUTHORIZE, permissions::writeoffs::CHANGE])
    }

    fn reason(authorization: bool, document: bool) -> WriteOffReason {
        let mut reason = WriteOffReason::new("DETERIORO", "Deterioro").unwrap();
        reason.requires_authorization = authorization;
        reason.requires_document = document;
        reason
    }

    fn create_cmd(reason: WriteOffReason, actor: &Principal) -> CreateWriteOff {
        let now = Utc::now();
        CreateWriteOff {
            write_off_id: WriteOffId::generate(),
            number: "BAJA-00000001".into(),
            write_off_date: now.date_naive(),
            reason,
            warehouse_id: WarehouseId::generate(),
            description: "Equipos dañados por filtración".into(),
            notes: None,
            document: None,
            actor: actor.clone(),
            occurred_at: now,
        }
    }

    fn created(reason: WriteOffReason) -> (WriteOff, Principal) {
        let actor = clerk();
        let cmd = create_cmd(reason, &actor);
        let mut write_off = WriteOff::empty(cmd.write_off_id);
        execute(&mut write_off, &WriteOffCommand::Create(cmd)).unwrap();
        (write_off, actor)
    }

    fn add_line(write_off: &mut WriteOff, actor: &Principal, qty: Decimal, value: Decimal) -> WriteOffLineId {
        let line_id = WriteOffLineId::generate();
        let cmd = AddLine {
            line_id,
            asset_id: AssetId::generate(),
            quantity: qty,
            unit_value: value,
            lot: None,
            serial_number: None,
            notes: None,
            actor: actor.clone(),
            occurred_at: Utc::now(),
        };
        execute(write_off, &WriteOffCommand::AddLine(cmd)).unwrap();
        line_id
    }

    fn confirm(write_off: &mut WriteOff, actor: Principal) -> Result<Vec<WriteOffEvent>, DomainError> {
        let cmd = Confirm {
            notes: None,
            actor,
            occurred_at: Utc::now(),
        };
        execute(write_off, &WriteOffCommand::Confirm(cmd))
    }

    #[test]
    fn future_date_is_rejected() {
        let actor = clerk();
        let mut cmd = create_cmd(reason(false, false), &actor);
        cmd.write_off_date = (cmd.occurred_at + Duration::days(1)).date_naive();
        let err = WriteOff::empty(cmd.write_off_id)
            .handle(&WriteOffCommand::Create(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.starts_with("fecha_baja")));
    }

    #[test]
    fn document_required_when_reason_says_so() {
        let actor = clerk();
        let mut cmd = create_cmd(reason(false, true), &actor);
        cmd.document = Some("   ".into());
        let err = WriteOff::empty(cmd.write_off_id)
            .handle(&WriteOffCommand::Create(cmd.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.starts_with("documento")));

        cmd.document = Some("Resolución 42/2026".into());
        assert!(WriteOff::empty(cmd.write_off_id)
            .handle(&WriteOffCommand::Create(cmd))
            .is_ok());
    }

    #[test]
    fn total_value_follows_lines() {
        let (mut write_off, actor) = created(reason(false, false));
        add_line(&mut write_off, &actor, dec!(2), dec!(15000));
        let second = add_line(&mut write_off, &actor, dec!(1), dec!(5000.50));
        assert_eq!(write_off.total_value(), dec!(35000.50));

        let cmd = RemoveLine {
            line_id: second,
            actor: actor.clone(),
            occurred_at: Utc::now(),
        };
        execute(&mut write_off, &WriteOffCommand::RemoveLine(cmd)).unwrap();
        assert_eq!(write_off.total_value(), dec!(30000));
    }

    #[test]
    fn oversized_line_value_is_rejected() {
        let (write_off, actor) = created(reason(false, false));
        let cmd = AddLine {
            line_id: WriteOffLineId::generate(),
            asset_id: AssetId::generate(),
            quantity: dec!(2),
            unit_value: Decimal::MAX,
            lot: None,
            serial_number: None,
            notes: None,
            actor,
            occurred_at: Utc::now(),
        };
        assert!(matches!(
            write_off.handle(&WriteOffCommand::AddLine(cmd)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn generic_status_change_cannot_authorize_or_confirm() {
        let (mut write_off, actor) = created(reason(true, false));
        add_line(&mut write_off, &actor, dec!(1), dec!(100));
        let admin = Principal::new(UserId::new(), "admin").with_permissions([permissions::ALL]);

        for target in [codes::AUTHORIZED, codes::CONFIRMED] {
            let cmd = ChangeStatus {
                target: target.into(),
                note: None,
                actor: admin.clone(),
                occurred_at: Utc::now(),
            };
            assert!(matches!(
                write_off.handle(&WriteOffCommand::ChangeStatus(cmd)),
                Err(DomainError::InvalidState(_))
            ));
        }

        let cmd = ChangeStatus {
            target: codes::REJECTED.into(),
            note: Some("duplicada".into()),
            actor: admin,
            occurred_at: Utc::now(),
        };
        execute(&mut write_off, &WriteOffCommand::ChangeStatus(cmd)).unwrap();
        assert_eq!(write_off.workflow().status.code, codes::REJECTED);
    }

    #[test]
    fn authorize_only_when_reason_requires_it() {
        let (mut write_off, actor) = created(reason(false, false));
        add_line(&mut write_off, &actor, dec!(1), dec!(100));
        let cmd = Authorize {
            notes: None,
            actor: authorizer(),
            occurred_at: Utc::now(),
        };
        let err = write_off.handle(&WriteOffCommand::Authorize(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn confirm_requires_prior_authorization_when_needed() {
        let (mut write_off, actor) = created(reason(true, false));
        add_line(&mut write_off, &actor, dec!(1), dec!(100));

        let err = confirm(&mut write_off, actor.clone()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(write_off.workflow().status.code, codes::PENDING);

        let cmd = Authorize {
            notes: Some("procede".into()),
            actor: authorizer(),
            occurred_at: Utc::now(),
        };
        execute(&mut write_off, &WriteOffCommand::Authorize(cmd)).unwrap();
        assert_eq!(write_off.authorization_notes(), Some("procede"));

        let events = confirm(&mut write_off, actor).unwrap();
        assert!(matches!(&events[0], WriteOffEvent::AssetsWrittenOff { lines, .. } if lines.len() == 1));
        assert_eq!(write_off.workflow().status.code, codes::CONFIRMED);
        assert!(write_off.workflow().is_final());
    }

    #[test]
    fn confirm_without_lines_fails() {
        let (mut write_off, actor) = created(reason(false, false));
        let err = confirm(&mut write_off, actor).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn reject_needs_reason_and_closes_the_write_off() {
        let (mut write_off, _) = created(reason(true, false));
        let blank = Reject {
            reason: " ".into(),
            actor: authorizer(),
            occurred_at: Utc::now(),
        };
        assert!(write_off.handle(&WriteOffCommand::Reject(blank)).is_err());

        let cmd = Reject {
            reason: "Activo aún utilizable".into(),
            actor: authorizer(),
            occurred_at: Utc::now(),
        };
        execute(&mut write_off, &WriteOffCommand::Reject(cmd)).unwrap();
        assert!(write_off.workflow().is_final());
        assert_eq!(write_off.version(), 2);
    }
}
