use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestor_core::{
    ensure_non_negative, ensure_not_blank, Aggregate, AggregateRoot, Code, DomainError,
};
use gestor_events::Event;

use crate::catalog::{CategoryId, WarehouseId};
use crate::stock::{register_movement, MoveStock, Movement};

gestor_core::aggregate_id!(
    /// Warehouse article identifier.
    ArticleId
);

/// Aggregate root: Article (a stocked consumable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    id: ArticleId,
    sku: Option<Code>,
    name: String,
    warehouse_id: WarehouseId,
    category_id: Option<CategoryId>,
    unit: String,
    stock: Decimal,
    stock_min: Decimal,
    stock_max: Option<Decimal>,
    reorder_point: Option<Decimal>,
    version: u64,
    created: bool,
}

impl Article {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ArticleId) -> Self {
        Self {
            id,
            sku: None,
            name: String::new(),
            warehouse_id: WarehouseId::generate(),
            category_id: None,
            unit: String::new(),
            stock: Decimal::ZERO,
            stock_min: Decimal::ZERO,
            stock_max: None,
            reorder_point: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ArticleId {
        self.id
    }

    pub fn sku(&self) -> Option<&Code> {
        self.sku.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn stock(&self) -> Decimal {
        self.stock
    }

    pub fn stock_min(&self) -> Decimal {
        self.stock_min
    }

    pub fn stock_max(&self) -> Option<Decimal> {
        self.stock_max
    }

    pub fn reorder_point(&self) -> Option<Decimal> {
        self.reorder_point
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for Article {
    type Id = ArticleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateArticle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateArticle {
    pub article_id: ArticleId,
    pub sku: String,
    pub name: String,
    pub warehouse_id: WarehouseId,
    pub category_id: Option<CategoryId>,
    pub unit: String,
    pub stock_min: Decimal,
    pub stock_max: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArticleCommand {
    CreateArticle(CreateArticle),
    MoveStock(MoveStock),
}

/// Event: ArticleCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCreated {
    pub article_id: ArticleId,
    pub sku: Code,
    pub name: String,
    pub warehouse_id: WarehouseId,
    pub category_id: Option<CategoryId>,
    pub unit: String,
    pub stock_min: Decimal,
    pub stock_max: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockMoved. Carries the ledger row written with the stock update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMoved {
    pub movement: Movement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArticleEvent {
    ArticleCreated(ArticleCreated),
    StockMoved(StockMoved),
}

impl Event for ArticleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ArticleEvent::ArticleCreated(_) => "warehouse.article.created",
            ArticleEvent::StockMoved(_) => "warehouse.article.stock_moved",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ArticleEvent::ArticleCreated(e) => e.occurred_at,
            ArticleEvent::StockMoved(e) => e.movement.occurred_at,
        }
    }
}

impl Aggregate for Article {
    type Command = ArticleCommand;
    type Event = ArticleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ArticleEvent::ArticleCreated(e) => {
                self.id = e.article_id;
                self.sku = Some(e.sku.clone());
                self.name = e.name.clone();
                self.warehouse_id = e.warehouse_id;
                self.category_id = e.category_id;
                self.unit = e.unit.clone();
                self.stock = Decimal::ZERO;
                self.stock_min = e.stock_min;
                self.stock_max = e.stock_max;
                self.reorder_point = e.reorder_point;
                self.created = true;
            }
            ArticleEvent::StockMoved(e) => {
                self.stock = e.movement.stock_after;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ArticleCommand::CreateArticle(cmd) => self.handle_create(cmd),
            ArticleCommand::MoveStock(cmd) => self.handle_move(cmd),
        }
    }
}

impl Article {
    fn handle_create(&self, cmd: &CreateArticle) -> Result<Vec<ArticleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("article already exists"));
        }
        ensure_not_blank("nombre", &cmd.name)?;
        ensure_not_blank("unidad_medida", &cmd.unit)?;
        ensure_non_negative("stock_minimo", cmd.stock_min)?;

        if let Some(max) = cmd.stock_max {
            if max < cmd.stock_min {
                return Err(DomainError::validation(
                    "stock_maximo must be greater than or equal to stock_minimo",
                ));
            }
        }
        if let Some(reorder) = cmd.reorder_point {
            if reorder < cmd.stock_min {
                return Err(DomainError::validation(
                    "punto_reorden must be greater than or equal to stock_minimo",
                ));
            }
        }

        Ok(vec![ArticleEvent::ArticleCreated(ArticleCreated {
            article_id: cmd.article_id,
            sku: Code::parse(&cmd.sku)?,
            name: cmd.name.trim().to_string(),
            warehouse_id: cmd.warehouse_id,
            category_id: cmd.category_id,
            unit: cmd.unit.trim().to_string(),
            stock_min: cmd.stock_min,
            stock_max: cmd.stock_max,
            reorder_point: cmd.reorder_point,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_move(&self, cmd: &MoveStock) -> Result<Vec<ArticleEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("article {}", cmd.article_id)));
        }
        if self.id != cmd.article_id {
            return Err(DomainError::invariant("article_id mismatch"));
        }

        let movement = register_movement(self, cmd)?;
        Ok(vec![ArticleEvent::StockMoved(StockMoved { movement })])
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::stock::Operation;
    use gestor_core::{execute, UserId};

    pub fn create_cmd(stock_max: Option<Decimal>) -> CreateArticle {
        CreateArticle {
            article_id: ArticleId::generate(),
            sku: "papel-a4".into(),
            name: "Resma papel A4".into(),
            warehouse_id: WarehouseId::generate(),
            category_id: None,
            unit: "resma".into(),
            stock_min: Decimal::ZERO,
            stock_max,
            reorder_point: None,
            occurred_at: Utc::now(),
        }
    }

    /// A created article holding `stock` units (reached through one entry).
    pub fn article_with_stock(stock: Decimal, stock_max: Option<Decimal>) -> Article {
        let cmd = create_cmd(stock_max);
        let mut article = Article::empty(cmd.article_id);
        execute(&mut article, &ArticleCommand::CreateArticle(cmd)).unwrap();
        if stock > Decimal::ZERO {
            let entry = MoveStock {
                article_id: article.id_typed(),
                operation: Operation::Entry,
                movement_type: Code::from_static("AJUSTE"),
                quantity: stock,
                actor: UserId::new(),
                reason: "saldo inicial".into(),
                reference: None,
                occurred_at: Utc::now(),
            };
            execute(&mut article, &ArticleCommand::MoveStock(entry)).unwrap();
        }
        article
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::stock::Operation;
    use gestor_core::{execute, UserId};
    use rust_decimal_macros::dec;

    #[test]
    fn create_normalizes_sku() {
        let cmd = create_cmd(None);
        let mut article = Article::empty(cmd.article_id);
        execute(&mut article, &ArticleCommand::CreateArticle(cmd)).unwrap();
        assert_eq!(article.sku().unwrap(), "PAPEL-A4");
        assert_eq!(article.stock(), Decimal::ZERO);
        assert_eq!(article.version(), 1);
    }

    #[test]
    fn create_rejects_maximum_below_minimum() {
        let mut cmd = create_cmd(Some(dec!(5)));
        cmd.stock_min = dec!(10);
        let article = Article::empty(cmd.article_id);
        let err = article
            .handle(&ArticleCommand::CreateArticle(cmd))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_reorder_point_below_minimum() {
        let mut cmd = create_cmd(None);
        cmd.stock_min = dec!(10);
        cmd.reorder_point = Some(dec!(2));
        let article = Article::empty(cmd.article_id);
        assert!(article.handle(&ArticleCommand::CreateArticle(cmd)).is_err());
    }

    #[test]
    fn create_twice_is_a_conflict() {
        let article = article_with_stock(Decimal::ZERO, None);
        let mut cmd = create_cmd(None);
        cmd.article_id = article.id_typed();
        let err = article.handle(&ArticleCommand::CreateArticle(cmd)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn failed_exit_leaves_stock_untouched() {
        let mut article = article_with_stock(dec!(4), None);
        let exit = MoveStock {
            article_id: article.id_typed(),
            operation: Operation::Exit,
            movement_type: Code::from_static("DESPACHO"),
            quantity: dec!(5),
            actor: UserId::new(),
            reason: "despacho".into(),
            reference: Some("SOL-00000001".into()),
            occurred_at: Utc::now(),
        };
        let version = article.version();
        assert!(execute(&mut article, &ArticleCommand::MoveStock(exit)).is_err());
        assert_eq!(article.stock(), dec!(4));
        assert_eq!(article.version(), version);
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::test_support::*;
    use super::*;
    use crate::stock::Operation;
    use gestor_core::{execute, UserId};
    use proptest::prelude::*;

    proptest! {
        /// Stock stays within [0, stock_max] across arbitrary entry/exit sequences.
        #[test]
        fn stock_stays_within_bounds(
            max in 1i64..500,
            ops in prop::collection::vec((any::<bool>(), 1i64..200), 0..40)
        ) {
            let maximum = Decimal::from(max);
            let mut article = article_with_stock(Decimal::ZERO, Some(maximum));

            for (is_entry, qty) in ops {
                let cmd = MoveStock {
                    article_id: article.id_typed(),
                    operation: if is_entry { Operation::Entry } else { Operation::Exit },
                    movement_type: Code::from_static("AJUSTE"),
                    quantity: Decimal::from(qty),
                    actor: UserId::new(),
                    reason: "prop".into(),
                    reference: None,
                    occurred_at: Utc::now(),
                };
                let before = article.stock();
                match execute(&mut article, &ArticleCommand::MoveStock(cmd)) {
                    Ok(events) => {
                        let ArticleEvent::StockMoved(moved) = &events[0] else {
                            panic!("expected StockMoved");
                        };
                        prop_assert_eq!(moved.movement.stock_before, before);
                        prop_assert_eq!(moved.movement.stock_after, article.stock());
                    }
                    Err(_) => {
                        prop_assert_eq!(article.stock(), before);
                    }
                }
                prop_assert!(article.stock() >= Decimal::ZERO);
                prop_assert!(article.stock() <= maximum);
            }
        }
    }
}
