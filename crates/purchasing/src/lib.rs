//! Purchasing (compras) domain module.
//!
//! Suppliers identified by RUT, and purchase orders that walk the approval
//! workflow: pending → authorized → received. Reception is line by line and
//! the order closes itself once every line has been received in full.

pub mod order;
pub mod rut;
pub mod supplier;
pub mod totals;

pub use order::{
    AddLine, Authorize, ChangeStatus, Close, CreatePurchaseOrder, GoodsReceived, OrderItem,
    OrderLine, OrderLineId, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderCreated,
    PurchaseOrderEvent, PurchaseOrderId, ReceiveLine, RemoveLine, SetDiscount, policy,
};
pub use rut::Rut;
pub use supplier::{Supplier, SupplierData, SupplierId};
pub use totals::{line_subtotal, OrderTotals};
