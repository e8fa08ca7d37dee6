//! Infrastructure layer: transactional store, application services,
//! configuration, notifications and the user-facing error boundary.
//!
//! Domain crates decide; this crate composes their decisions inside one store
//! transaction, writes history rows and ledgers, and publishes the committed
//! status changes.

pub mod boundary;
pub mod config;
pub mod projections;
pub mod read_model;
pub mod services;
pub mod store;


pub use config::WorkflowConfig;
pub use store::{InMemoryStore, StoreError, Tables};
