use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use gestor_auth::{authorize, permissions, Principal};
use gestor_core::{Code, DomainError, ExpectedVersion};
use gestor_events::EventBus;
use gestor_purchasing::{
    policy, AddLine, Authorize, ChangeStatus, Close, CreatePurchaseOrder, GoodsReceived, OrderItem,
    OrderLineId, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderEvent, PurchaseOrderId,
    ReceiveLine, RemoveLine, SetDiscount, Supplier, SupplierData, SupplierId,
};
use gestor_warehouse::{MoveStock, MovementType, Operation, WarehouseId};
use gestor_workflow::{HistoryEntry, WorkflowHeader};

use crate::projections::NoticeEnvelope;
use crate::services::warehouse::move_article_stock;
use crate::services::{apply_workflow_events, clean, ServiceContext};
use crate::store::{decide, row, row_mut, StoreError, Tables};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPurchaseOrder {
    pub supplier_id: SupplierId,
    pub order_date: NaiveDate,
    pub expected_delivery: Option<NaiveDate>,
    /// Required for orders that buy warehouse articles.
    pub destination_warehouse: Option<WarehouseId>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderLine {
    pub item: OrderItem,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub notes: Option<String>,
}

/// Suppliers and purchase orders.
#[derive(Debug)]
pub struct PurchasingService<B> {
    ctx: Arc<ServiceContext<B>>,
}

impl<B> PurchasingService<B>
where
    B: EventBus<NoticeEnvelope>,
{
    pub fn new(ctx: Arc<ServiceContext<B>>) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, data, actor), fields(rut = %data.rut, actor = %actor.user_id))]
    pub fn register_supplier(
        &self,
        data: SupplierData,
        actor: &Principal,
    ) -> Result<SupplierId, StoreError> {
        authorize(actor, &permissions::purchasing::MANAGE_SUPPLIERS)?;
        let supplier = Supplier::register(data)?;

        self.ctx.commit(|tables| {
            ensure_unique_rut(tables, &supplier)?;
            let id = supplier.id;
            info!(supplier_id = %id, rut = %supplier.rut, "supplier registered");
            tables.suppliers.insert(id, supplier);
            Ok((id, Vec::new()))
        })
    }

    #[instrument(skip(self, data, actor), fields(%supplier_id, actor = %actor.user_id))]
    pub fn update_supplier(
        &self,
        supplier_id: SupplierId,
        data: SupplierData,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        authorize(actor, &permissions::purchasing::MANAGE_SUPPLIERS)?;

        self.ctx.commit(|tables| {
            let mut supplier = row(&tables.suppliers, &supplier_id, "supplier")?.clone();
            supplier.update(data)?;
            ensure_unique_rut(tables, &supplier)?;
            tables.suppliers.insert(supplier_id, supplier);
            Ok(((), Vec::new()))
        })
    }

    /// Soft delete. Suppliers referenced by any order are kept as they are.
    #[instrument(skip(self, actor), fields(%supplier_id, actor = %actor.user_id))]
    pub fn deactivate_supplier(
        &self,
        supplier_id: SupplierId,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        authorize(actor, &permissions::purchasing::MANAGE_SUPPLIERS)?;

        self.ctx.commit(|tables| {
            let orders = tables
                .purchase_orders
                .values()
                .filter(|o| o.supplier_id() == Some(supplier_id))
                .count();
            if orders > 0 {
                warn!(%supplier_id, orders, "supplier has purchase orders");
                return Err(DomainError::conflict(format!(
                    "supplier {supplier_id} has {orders} purchase order(s) and cannot be deleted"
                ))
                .into());
            }
            row_mut(&mut tables.suppliers, &supplier_id, "supplier")?.active = false;
            Ok(((), Vec::new()))
        })
    }

    #[instrument(skip(self, input, actor), fields(supplier_id = %input.supplier_id, actor = %actor.user_id))]
    pub fn create_order(
        &self,
        input: NewPurchaseOrder,
        actor: &Principal,
    ) -> Result<PurchaseOrderId, StoreError> {
        let numbers = self.ctx.config().purchase_order_numbers();
        let tax_rate = self.ctx.config().tax_rate;

        self.ctx.commit(|tables| {
            let supplier_active = row(&tables.suppliers, &input.supplier_id, "supplier")?.active;
            if let Some(warehouse_id) = &input.destination_warehouse {
                row(&tables.warehouses, warehouse_id, "warehouse")?;
            }

            let order_id = PurchaseOrderId::generate();
            let cmd = PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
                order_id,
                number: numbers.next(tables.purchase_orders.values().map(|o| o.number())),
                supplier_id: input.supplier_id,
                supplier_active,
                order_date: input.order_date,
                expected_delivery: input.expected_delivery,
                destination_warehouse: input.destination_warehouse,
                tax_rate,
                notes: clean(input.notes),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            });
            let header = PurchaseOrder::empty(order_id);
            let notices = commit_header(tables, header, ExpectedVersion::Exact(0), &cmd)?;
            Ok((order_id, notices))
        })
    }

    #[instrument(skip(self, input, actor), fields(%order_id, actor = %actor.user_id))]
    pub fn add_line(
        &self,
        order_id: PurchaseOrderId,
        input: NewOrderLine,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<OrderLineId, StoreError> {
        self.ctx.commit(|tables| {
            let header = row(&tables.purchase_orders, &order_id, "purchase order")?.clone();
            match input.item {
                OrderItem::Asset(asset_id) => {
                    row(&tables.assets, &asset_id, "asset")?;
                }
                OrderItem::Article(article_id) => {
                    let article = row(&tables.articles, &article_id, "article")?;
                    if header
                        .destination_warehouse()
                        .is_some_and(|w| w != article.warehouse_id())
                    {
                        return Err(DomainError::validation(
                            "articulo: the article is not stocked in the destination warehouse",
                        )
                        .into());
                    }
                }
            }

            let line_id = OrderLineId::generate();
            let cmd = PurchaseOrderCommand::AddLine(AddLine {
                line_id,
                item: input.item,
                quantity: input.quantity,
                unit_price: input.unit_price,
                discount: input.discount,
                notes: clean(input.notes),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            });
            let notices = commit_header(tables, header, expected, &cmd)?;
            Ok((line_id, notices))
        })
    }

    #[instrument(skip(self, actor), fields(%order_id, %line_id, actor = %actor.user_id))]
    pub fn remove_line(
        &self,
        order_id: PurchaseOrderId,
        line_id: OrderLineId,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            order_id,
            expected,
            PurchaseOrderCommand::RemoveLine(RemoveLine {
                line_id,
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Header-level discount.
    #[instrument(skip(self, actor), fields(%order_id, %discount, actor = %actor.user_id))]
    pub fn set_discount(
        &self,
        order_id: PurchaseOrderId,
        discount: Decimal,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            order_id,
            expected,
            PurchaseOrderCommand::SetDiscount(SetDiscount {
                discount,
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self, notes, actor), fields(%order_id, actor = %actor.user_id))]
    pub fn authorize(
        &self,
        order_id: PurchaseOrderId,
        notes: Option<String>,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            order_id,
            expected,
            PurchaseOrderCommand::Authorize(Authorize {
                notes: clean(notes),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self, reason, actor), fields(%order_id, actor = %actor.user_id))]
    pub fn reject(
        &self,
        order_id: PurchaseOrderId,
        reason: &str,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            order_id,
            expected,
            PurchaseOrderCommand::Reject(close(reason, actor)),
        )
    }

    #[instrument(skip(self, reason, actor), fields(%order_id, actor = %actor.user_id))]
    pub fn annul(
        &self,
        order_id: PurchaseOrderId,
        reason: &str,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            order_id,
            expected,
            PurchaseOrderCommand::Annul(close(reason, actor)),
        )
    }

    #[instrument(skip(self, note, actor), fields(%order_id, actor = %actor.user_id))]
    pub fn change_status(
        &self,
        order_id: PurchaseOrderId,
        status: &str,
        note: Option<String>,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        self.mutate(
            order_id,
            expected,
            PurchaseOrderCommand::ChangeStatus(ChangeStatus {
                target: status.to_string(),
                note: clean(note),
                actor: actor.clone(),
                occurred_at: Utc::now(),
            }),
        )
    }

    /// Receive goods on one line. Article lines enter stock in the same
    /// transaction; the order moves to RECIBIDA once every line is complete.
    #[instrument(skip(self, actor), fields(%order_id, %line_id, %quantity, actor = %actor.user_id))]
    pub fn receive(
        &self,
        order_id: PurchaseOrderId,
        line_id: OrderLineId,
        quantity: Decimal,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<(), StoreError> {
        let cmd = PurchaseOrderCommand::ReceiveLine(ReceiveLine {
            line_id,
            quantity,
            actor: actor.clone(),
            occurred_at: Utc::now(),
        });

        self.ctx.commit(|tables| {
            let header = row(&tables.purchase_orders, &order_id, "purchase order")?.clone();
            let events = decide(&header, expected, &cmd)?;

            for event in &events {
                if let PurchaseOrderEvent::GoodsReceived(received) = event {
                    receive_into_stock(tables, &header, received, actor)?;
                }
            }

            let notices = apply_header(tables, header, &events);
            Ok(((), notices))
        })
    }

    pub fn get(&self, order_id: PurchaseOrderId) -> Result<PurchaseOrder, StoreError> {
        self.ctx
            .read(|tables| row(&tables.purchase_orders, &order_id, "purchase order").cloned())?
            .map_err(StoreError::from)
    }

    pub fn history(&self, order_id: PurchaseOrderId) -> Result<Vec<HistoryEntry>, StoreError> {
        self.ctx
            .read(|tables| tables.purchase_order_history.for_header(order_id.0))
    }

    /// Active suppliers ordered by business name.
    pub fn suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        self.ctx.read(|tables| {
            let mut rows: Vec<Supplier> = tables
                .suppliers
                .values()
                .filter(|s| s.active)
                .cloned()
                .collect();
            rows.sort_by(|a, b| a.business_name.cmp(&b.business_name));
            rows
        })
    }

    fn mutate(
        &self,
        order_id: PurchaseOrderId,
        expected: ExpectedVersion,
        cmd: PurchaseOrderCommand,
    ) -> Result<(), StoreError> {
        self.ctx.commit(|tables| {
            let header = row(&tables.purchase_orders, &order_id, "purchase order")?.clone();
            let notices = commit_header(tables, header, expected, &cmd)?;
            Ok(((), notices))
        })
    }
}

fn close(reason: &str, actor: &Principal) -> Close {
    Close {
        reason: reason.to_string(),
        actor: actor.clone(),
        occurred_at: Utc::now(),
    }
}

fn ensure_unique_rut(tables: &Tables, supplier: &Supplier) -> Result<(), DomainError> {
    if tables
        .suppliers
        .values()
        .any(|s| s.id != supplier.id && s.rut == supplier.rut)
    {
        return Err(DomainError::conflict(format!(
            "a supplier with RUT {} already exists",
            supplier.rut
        )));
    }
    Ok(())
}

fn commit_header(
    tables: &mut Tables,
    header: PurchaseOrder,
    expected: ExpectedVersion,
    cmd: &PurchaseOrderCommand,
) -> Result<Vec<NoticeEnvelope>, StoreError> {
    let events = decide(&header, expected, cmd)?;
    Ok(apply_header(tables, header, &events))
}

fn apply_header(
    tables: &mut Tables,
    mut header: PurchaseOrder,
    events: &[PurchaseOrderEvent],
) -> Vec<NoticeEnvelope> {
    let id = header.id_typed();
    let notices = apply_workflow_events(
        policy().module,
        id.0,
        &mut header,
        &mut tables.purchase_order_history,
        events,
        PurchaseOrderEvent::status_change,
    );
    tables.purchase_orders.insert(id, header);
    notices
}

fn receive_into_stock(
    tables: &mut Tables,
    header: &PurchaseOrder,
    received: &GoodsReceived,
    actor: &Principal,
) -> Result<(), DomainError> {
    let OrderItem::Article(article_id) = received.item else {
        info!(line_id = %received.line_id, "asset line received");
        return Ok(());
    };

    let movement = move_article_stock(
        tables,
        ExpectedVersion::Any,
        MoveStock {
            article_id,
            operation: Operation::Entry,
            movement_type: Code::from_static(MovementType::PURCHASE),
            quantity: received.quantity,
            actor: actor.user_id,
            reason: format!("Recepción orden de compra {}", header.number()),
            reference: Some(header.number().to_string()),
            occurred_at: received.occurred_at,
        },
    )?;
    info!(
        %article_id,
        quantity = %movement.quantity,
        stock_after = %movement.stock_after,
        "goods received into stock"
    );
    Ok(())
}
