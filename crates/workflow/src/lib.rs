//! `gestor-workflow`: the approval workflow shared by requisitions, purchase
//! orders and inventory write-offs.
//!
//! - `status`: status rows and catalogs
//! - `policy`: which transitions exist, who may take them, what they stamp
//! - `transition`: the generic guarded status change (decide + apply)
//! - `history`: append-only transition log
//! - `cascade`: line-item quantity rules (requested ≥ approved ≥ dispatched)

pub mod cascade;
pub mod history;
pub mod policy;
pub mod status;
pub mod transition;

pub use cascade::{approve_line, dispatch_line, receive_line, LineQuantities, ReceiptQuantities};
pub use history::{History, HistoryEntry};
pub use policy::{Stamp, TransitionPolicy, TransitionRule};
pub use status::{codes, Status, StatusCatalog};
pub use transition::{
    decide_status_change, decide_transition, transition, StatusChanged, WorkflowHeader,
    WorkflowState,
};
