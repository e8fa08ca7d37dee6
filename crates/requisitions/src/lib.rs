//! Requisitions (solicitudes) domain module.
//!
//! A requisition asks the warehouse for articles, or for assets to be assigned,
//! and walks the shared approval workflow: pending → approved → dispatched.

pub mod line;
pub mod requisition;

pub use line::{LineDecision, RequisitionItem, RequisitionKind, RequisitionLine, RequisitionLineId};
pub use requisition::{
    AddLine, Approve, Cancel, ChangeStatus, CreateRequisition, Dispatch, DispatchedLine, Reject,
    RemoveLine, Requisition, RequisitionCommand, RequisitionCreated, RequisitionEvent,
    RequisitionId, policy,
};
