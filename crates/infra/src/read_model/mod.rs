//! Disposable read models fed by projections.

pub mod key_value;

pub use key_value::{InMemoryKeyValueStore, KeyValueStore};
