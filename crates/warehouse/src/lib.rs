//! Warehouse domain module.
//!
//! Business rules for warehouse articles and their stock ledger, implemented
//! purely as deterministic domain logic (no IO, no storage).

pub mod article;
pub mod catalog;
pub mod queries;
pub mod stock;

pub use article::{
    Article, ArticleCommand, ArticleCreated, ArticleEvent, ArticleId, CreateArticle, StockMoved,
};
pub use catalog::{Category, CategoryId, MovementType, Warehouse, WarehouseId};
pub use queries::{at_reorder_point, below_minimum, movement_history};
pub use stock::{
    register_entry, register_exit, register_movement, MoveStock, Movement, MovementId, Operation,
};
