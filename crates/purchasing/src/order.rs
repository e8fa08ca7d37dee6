use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestor_assets::AssetId;
use gestor_auth::{authorize, permissions, Principal};
use gestor_core::{
    contains_id, ensure_non_negative, ensure_not_blank, find_by_id, sum_checked, Aggregate,
    AggregateRoot, DomainError, Entity, UserId,
};
use gestor_events::Event;
use gestor_warehouse::{ArticleId, WarehouseId};
use gestor_workflow::{
    codes, decide_status_change, decide_transition, receive_line, ReceiptQuantities,
    StatusChanged, TransitionPolicy, WorkflowHeader, WorkflowState,
};

use crate::supplier::SupplierId;
use crate::totals::{line_subtotal, OrderTotals};

gestor_core::aggregate_id!(
    /// Purchase order identifier.
    PurchaseOrderId
);

gestor_core::aggregate_id!(
    /// Purchase order line identifier.
    OrderLineId
);

static POLICY: LazyLock<TransitionPolicy> = LazyLock::new(TransitionPolicy::purchase_orders);

/// Status catalog and transition rules for purchase orders.
pub fn policy() -> &'static TransitionPolicy {
    &POLICY
}

/// What a line buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderItem {
    Asset(AssetId),
    Article(ArticleId),
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub item: OrderItem,
    pub quantities: ReceiptQuantities,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub subtotal: Decimal,
    pub notes: Option<String>,
}

impl Entity for OrderLine {
    type Id = OrderLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    number: String,
    supplier_id: Option<SupplierId>,
    order_date: Option<NaiveDate>,
    expected_delivery: Option<NaiveDate>,
    actual_delivery: Option<NaiveDate>,
    destination_warehouse: Option<WarehouseId>,
    tax_rate: Decimal,
    totals: OrderTotals,
    notes: Option<String>,
    workflow: WorkflowState,
    lines: Vec<OrderLine>,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            number: String::new(),
            supplier_id: None,
            order_date: None,
            expected_delivery: None,
            actual_delivery: None,
            destination_warehouse: None,
            tax_rate: Decimal::ZERO,
            totals: OrderTotals::default(),
            notes: None,
            workflow: WorkflowState::new(policy().catalog.initial().clone(), UserId::default()),
            lines: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PurchaseOrderId {
        self.id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn order_date(&self) -> Option<NaiveDate> {
        self.order_date
    }

    pub fn expected_delivery(&self) -> Option<NaiveDate> {
        self.expected_delivery
    }

    pub fn actual_delivery(&self) -> Option<NaiveDate> {
        self.actual_delivery
    }

    pub fn destination_warehouse(&self) -> Option<WarehouseId> {
        self.destination_warehouse
    }

    pub fn totals(&self) -> OrderTotals {
        self.totals
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn line(&self, line_id: OrderLineId) -> Option<&OrderLine> {
        find_by_id(&self.lines, &line_id)
    }

    pub fn is_fully_received(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(|l| l.quantities.is_complete())
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    fn recompute(&self, lines: &[OrderLine], discount: Decimal) -> Result<OrderTotals, DomainError> {
        let subtotal = sum_checked("subtotal", lines.iter().map(|l| l.subtotal))?;
        OrderTotals::compute(subtotal, discount, self.tax_rate)
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl WorkflowHeader for PurchaseOrder {
    fn workflow(&self) -> &WorkflowState {
        &self.workflow
    }

    fn number(&self) -> &str {
        &self.number
    }
}

/// Command: CreatePurchaseOrder. `supplier_active` is the supplier's flag at
/// the time of the command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub order_id: PurchaseOrderId,
    pub number: String,
    pub supplier_id: SupplierId,
    pub supplier_active: bool,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub destination_warehouse: Option<WarehouseId>,
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine (only while the status permits editing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub line_id: OrderLineId,
    pub item: OrderItem,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub notes: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub line_id: OrderLineId,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetDiscount (header-level discount).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDiscount {
    pub discount: Decimal,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Authorize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorize {
    pub notes: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reject or Annul; both need a reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Close {
    pub reason: String,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveLine {
    pub line_id: OrderLineId,
    pub quantity: Decimal,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus (generic transition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub target: String,
    pub note: Option<String>,
    pub actor: Principal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    AddLine(AddLine),
    RemoveLine(RemoveLine),
    SetDiscount(SetDiscount),
    Authorize(Authorize),
    Reject(Close),
    Annul(Close),
    ReceiveLine(ReceiveLine),
    ChangeStatus(ChangeStatus),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub order_id: PurchaseOrderId,
    pub number: String,
    pub supplier_id: SupplierId,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    pub destination_warehouse: Option<WarehouseId>,
    pub tax_rate: Decimal,
    pub notes: Option<String>,
    pub change: StatusChanged,
}

/// Event: GoodsReceived.
///
/// Carries the item and quantity so the service layer can raise warehouse stock
/// in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceived {
    pub order_id: PurchaseOrderId,
    pub line_id: OrderLineId,
    pub item: OrderItem,
    pub quantity: Decimal,
    pub received_total: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    LineAdded {
        line: OrderLine,
        totals: OrderTotals,
        occurred_at: DateTime<Utc>,
    },
    LineRemoved {
        line_id: OrderLineId,
        totals: OrderTotals,
        occurred_at: DateTime<Utc>,
    },
    DiscountChanged {
        totals: OrderTotals,
        occurred_at: DateTime<Utc>,
    },
    GoodsReceived(GoodsReceived),
    StatusChanged(StatusChanged),
}

impl PurchaseOrderEvent {
    pub fn status_change(&self) -> Option<&StatusChanged> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => Some(&e.change),
            PurchaseOrderEvent::StatusChanged(c) => Some(c),
            _ => None,
        }
    }
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.order.created",
            PurchaseOrderEvent::LineAdded { .. } => "purchasing.order.line_added",
            PurchaseOrderEvent::LineRemoved { .. } => "purchasing.order.line_removed",
            PurchaseOrderEvent::DiscountChanged { .. } => "purchasing.order.discount_changed",
            PurchaseOrderEvent::GoodsReceived(_) => "purchasing.order.goods_received",
            PurchaseOrderEvent::StatusChanged(_) => "purchasing.order.status_changed",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.change.occurred_at,
            PurchaseOrderEvent::LineAdded { occurred_at, .. }
            | PurchaseOrderEvent::LineRemoved { occurred_at, .. }
            | PurchaseOrderEvent::DiscountChanged { occurred_at, .. } => *occurred_at,
            PurchaseOrderEvent::GoodsReceived(e) => e.occurred_at,
            PurchaseOrderEvent::StatusChanged(c) => c.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.number = e.number.clone();
                self.supplier_id = Some(e.supplier_id);
                self.order_date = Some(e.order_date);
                self.expected_delivery = e.expected_delivery;
                self.destination_warehouse = e.destination_warehouse;
                self.tax_rate = e.tax_rate;
                self.totals = OrderTotals::default();
                self.notes = e.notes.clone();
                self.workflow = WorkflowState::new(e.change.to.clone(), e.change.actor);
                self.lines.clear();
                self.created = true;
            }
            PurchaseOrderEvent::LineAdded { line, totals, .. } => {
                self.lines.push(line.clone());
                self.totals = *totals;
            }
            PurchaseOrderEvent::LineRemoved { line_id, totals, .. } => {
                self.lines.retain(|l| l.id != *line_id);
                self.totals = *totals;
            }
            PurchaseOrderEvent::DiscountChanged { totals, .. } => {
                self.totals = *totals;
            }
            PurchaseOrderEvent::GoodsReceived(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.id == e.line_id) {
                    line.quantities.received = e.received_total;
                }
                if self.is_fully_received() {
                    self.actual_delivery = Some(e.occurred_at.date_naive());
                }
            }
            PurchaseOrderEvent::StatusChanged(change) => {
                self.workflow.apply(change);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if !matches!(command, PurchaseOrderCommand::CreatePurchaseOrder(_)) && !self.created {
            return Err(DomainError::not_found(format!("purchase order {}", self.id)));
        }
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::AddLine(cmd) => self.handle_add_line(cmd),
            PurchaseOrderCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            PurchaseOrderCommand::SetDiscount(cmd) => self.handle_set_discount(cmd),
            PurchaseOrderCommand::Authorize(cmd) => self.handle_authorize(cmd),
            PurchaseOrderCommand::Reject(cmd) => self.handle_close(cmd, codes::REJECTED),
            PurchaseOrderCommand::Annul(cmd) => self.handle_close(cmd, codes::ANNULLED),
            PurchaseOrderCommand::ReceiveLine(cmd) => self.handle_receive(cmd),
            PurchaseOrderCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_may_edit(&self, actor: &Principal) -> Result<(), DomainError> {
        self.workflow.ensure_editable("purchase order")?;
        if actor.user_id != self.workflow.requester {
            authorize(actor, &permissions::purchasing::CHANGE)?;
        }
        Ok(())
    }

    fn find_line(&self, line_id: OrderLineId) -> Result<&OrderLine, DomainError> {
        self.line(line_id)
            .ok_or_else(|| DomainError::not_found(format!("purchase order line {line_id}")))
    }

    fn handle_create(
        &self,
        cmd: &CreatePurchaseOrder,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        authorize(&cmd.actor, &permissions::purchasing::CREATE)?;
        ensure_not_blank("numero", &cmd.number)?;
        ensure_non_negative("tasa_impuesto", cmd.tax_rate)?;

        if !cmd.supplier_active {
            return Err(DomainError::validation("proveedor: the supplier is not active"));
        }
        if let Some(expected) = cmd.expected_delivery {
            if expected < cmd.order_date {
                return Err(DomainError::validation(
                    "fecha_entrega_esperada: the expected delivery cannot precede the order date",
                ));
            }
        }

        let change = StatusChanged::created(
            policy().catalog.initial().clone(),
            cmd.actor.user_id,
            cmd.occurred_at,
        );

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(
            PurchaseOrderCreated {
                order_id: cmd.order_id,
                number: cmd.number.trim().to_string(),
                supplier_id: cmd.supplier_id,
                order_date: cmd.order_date,
                expected_delivery: cmd.expected_delivery,
                destination_warehouse: cmd.destination_warehouse,
                tax_rate: cmd.tax_rate,
                notes: cmd.notes.clone(),
                change,
            },
        )])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_may_edit(&cmd.actor)?;

        if matches!(cmd.item, OrderItem::Article(_)) && self.destination_warehouse.is_none() {
            return Err(DomainError::validation(
                "bodega_destino: article lines require a destination warehouse",
            ));
        }
        if contains_id(&self.lines, &cmd.line_id) {
            return Err(DomainError::conflict(format!("line {} already exists", cmd.line_id)));
        }

        let quantities = ReceiptQuantities::ordered(cmd.quantity)?;
        let subtotal = line_subtotal(cmd.quantity, cmd.unit_price, cmd.discount)?;
        let line = OrderLine {
            id: cmd.line_id,
            item: cmd.item,
            quantities,
            unit_price: cmd.unit_price,
            discount: cmd.discount,
            subtotal,
            notes: cmd.notes.clone(),
        };

        let mut lines = self.lines.clone();
        lines.push(line.clone());
        let totals = self.recompute(&lines, self.totals.discount)?;

        Ok(vec![PurchaseOrderEvent::LineAdded {
            line,
            totals,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_may_edit(&cmd.actor)?;
        self.find_line(cmd.line_id)?;

        let lines: Vec<OrderLine> = self
            .lines
            .iter()
            .filter(|l| l.id != cmd.line_id)
            .cloned()
            .collect();
        let subtotal = sum_checked("subtotal", lines.iter().map(|l| l.subtotal))?;
        let discount = self.totals.discount.min(subtotal);

        Ok(vec![PurchaseOrderEvent::LineRemoved {
            line_id: cmd.line_id,
            totals: self.recompute(&lines, discount)?,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_set_discount(&self, cmd: &SetDiscount) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        self.ensure_may_edit(&cmd.actor)?;
        ensure_non_negative("descuento", cmd.discount)?;
        if cmd.discount > self.totals.subtotal {
            return Err(DomainError::validation(
                "descuento: the discount cannot exceed the order subtotal",
            ));
        }

        Ok(vec![PurchaseOrderEvent::DiscountChanged {
            totals: self.recompute(&self.lines, cmd.discount)?,
            occurred_at: cmd.occurred_at,
        }])
    }

    fn handle_authorize(&self, cmd: &Authorize) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        let change = decide_transition(
            policy(),
            &self.workflow,
            codes::AUTHORIZED,
            &cmd.actor,
            cmd.notes.clone(),
            cmd.occurred_at,
        )?;
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "cannot authorize a purchase order without lines",
            ));
        }
        Ok(vec![PurchaseOrderEvent::StatusChanged(change)])
    }

    fn handle_close(&self, cmd: &Close, target: &str) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        ensure_not_blank("motivo", &cmd.reason)?;
        let change = decide_transition(
            policy(),
            &self.workflow,
            target,
            &cmd.actor,
            Some(cmd.reason.trim().to_string()),
            cmd.occurred_at,
        )?;
        Ok(vec![PurchaseOrderEvent::StatusChanged(change)])
    }

    fn handle_receive(&self, cmd: &ReceiveLine) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        // Invariant: Cannot receive before authorization.
        if self.workflow.status.code != codes::AUTHORIZED {
            return Err(DomainError::invalid_state(format!(
                "goods can only be received for authorized orders (status {})",
                self.workflow.status.code
            )));
        }
        authorize(&cmd.actor, &permissions::purchasing::RECEIVE)?;

        let line = self.find_line(cmd.line_id)?;
        let received = receive_line(&line.quantities, cmd.quantity)?;

        let mut events = vec![PurchaseOrderEvent::GoodsReceived(GoodsReceived {
            order_id: self.id,
            line_id: line.id,
            item: line.item,
            quantity: cmd.quantity,
            received_total: received.received,
            occurred_at: cmd.occurred_at,
        })];

        let completes_order = self
            .lines
            .iter()
            .all(|l| if l.id == line.id { received.is_complete() } else { l.quantities.is_complete() });
        if completes_order {
            let change = decide_transition(
                policy(),
                &self.workflow,
                codes::RECEIVED,
                &cmd.actor,
                Some("recepción completa".to_string()),
                cmd.occurred_at,
            )?;
            events.push(PurchaseOrderEvent::StatusChanged(change));
        }

        Ok(events)
    }

    fn handle_change_status(
        &self,
        cmd: &ChangeStatus,
    ) -> Result<Vec<PurchaseOrderEvent>, DomainError> {
        let change = decide_status_change(
            policy(),
            &self.workflow,
            &cmd.target,
            &cmd.actor,
            cmd.note.clone(),
            cmd.occurred_at,
        )?;
        Ok(vec![PurchaseOrderEvent::StatusChanged(change)])
    }
}
