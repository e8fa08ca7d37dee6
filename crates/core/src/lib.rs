//! `gestor-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod numbering;
pub mod value_object;

pub use aggregate::{execute, Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::{contains_id, find_by_id, Entity};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, UserId};
pub use numbering::NumberSequence;
pub use value_object::{
    add_checked, ensure_non_negative, ensure_not_blank, ensure_positive, mul_checked, sum_checked,
    Code, ValueObject,
};
