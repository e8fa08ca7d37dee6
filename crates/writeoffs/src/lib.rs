//! Inventory write-offs (bajas de inventario).
//!
//! A write-off removes assets from the books for a given reason. Reasons decide
//! whether a supporting document and an explicit authorization are required
//! before the write-off can be confirmed.

pub mod reason;
pub mod writeoff;

pub use reason::WriteOffReason;
pub use writeoff::{
    AddLine, Authorize, ChangeStatus, Confirm, CreateWriteOff, Reject, RemoveLine, WriteOff,
    WriteOffCommand, WriteOffCreated, WriteOffEvent, WriteOffId, WriteOffLine, WriteOffLineId,
    policy,
};
