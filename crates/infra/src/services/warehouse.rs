use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};

use gestor_auth::{authorize, permissions, Principal};
use gestor_core::{Code, DomainError, ExpectedVersion};
use gestor_events::EventBus;
use gestor_warehouse::{
    at_reorder_point, below_minimum, movement_history, Article, ArticleCommand, ArticleEvent,
    ArticleId, Category, CategoryId, CreateArticle, MoveStock, Movement, Operation, Warehouse,
    WarehouseId,
};

use crate::projections::NoticeEnvelope;
use crate::services::ServiceContext;
use crate::store::{apply_all, decide, row, StoreError, Tables};

/// Input for a new warehouse article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub sku: String,
    pub name: String,
    pub warehouse_id: WarehouseId,
    pub category_id: Option<CategoryId>,
    pub unit: String,
    pub stock_min: Decimal,
    pub stock_max: Option<Decimal>,
    pub reorder_point: Option<Decimal>,
}

/// Input for a manual stock entry or exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockOperation {
    pub operation: Operation,
    /// Movement type code (`COMPRA`, `DESPACHO`, `AJUSTE`, ...).
    pub movement_type: String,
    pub quantity: Decimal,
    pub reason: String,
    pub reference: Option<String>,
}

/// Apply a stock movement to an article inside an open transaction and write
/// the ledger row.
pub(crate) fn move_article_stock(
    tables: &mut Tables,
    expected: ExpectedVersion,
    op: MoveStock,
) -> Result<Movement, DomainError> {
    tables.movement_type(op.movement_type.as_str())?;

    let mut article = row(&tables.articles, &op.article_id, "article")?.clone();
    let events = decide(&article, expected, &ArticleCommand::MoveStock(op))?;
    apply_all(&mut article, &events);

    let movement = events
        .into_iter()
        .find_map(|event| match event {
            ArticleEvent::StockMoved(moved) => Some(moved.movement),
            ArticleEvent::ArticleCreated(_) => None,
        })
        .ok_or_else(|| DomainError::invariant("stock command produced no movement"))?;

    tables.articles.insert(article.id_typed(), article);
    tables.movements.push(movement.clone());
    Ok(movement)
}

/// Warehouses, categories, articles and their stock ledger.
#[derive(Debug)]
pub struct WarehouseService<B> {
    ctx: Arc<ServiceContext<B>>,
}

impl<B> WarehouseService<B>
where
    B: EventBus<NoticeEnvelope>,
{
    pub fn new(ctx: Arc<ServiceContext<B>>) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub fn create_warehouse(
        &self,
        code: &str,
        name: &str,
        actor: &Principal,
    ) -> Result<WarehouseId, StoreError> {
        authorize(actor, &permissions::warehouse::MANAGE_ARTICLES)?;
        let warehouse = Warehouse::new(code, name, Some(actor.user_id))?;

        self.ctx.commit(|tables| {
            if tables.warehouses.values().any(|w| w.code == warehouse.code) {
                return Err(DomainError::conflict(format!(
                    "a warehouse with code {} already exists",
                    warehouse.code
                ))
                .into());
            }
            let id = warehouse.id;
            tables.warehouses.insert(id, warehouse);
            Ok((id, Vec::new()))
        })
    }

    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub fn create_category(
        &self,
        code: &str,
        name: &str,
        actor: &Principal,
    ) -> Result<CategoryId, StoreError> {
        authorize(actor, &permissions::warehouse::MANAGE_ARTICLES)?;
        let category = Category::new(code, name)?;

        self.ctx.commit(|tables| {
            if tables.categories.values().any(|c| c.code == category.code) {
                return Err(DomainError::conflict(format!(
                    "a category with code {} already exists",
                    category.code
                ))
                .into());
            }
            let id = category.id;
            tables.categories.insert(id, category);
            Ok((id, Vec::new()))
        })
    }

    #[instrument(skip(self, input, actor), fields(sku = %input.sku, actor = %actor.user_id))]
    pub fn create_article(
        &self,
        input: NewArticle,
        actor: &Principal,
    ) -> Result<ArticleId, StoreError> {
        authorize(actor, &permissions::warehouse::MANAGE_ARTICLES)?;
        let sku = Code::parse(&input.sku)?;

        self.ctx.commit(|tables| {
            let warehouse = row(&tables.warehouses, &input.warehouse_id, "warehouse")?;
            if !warehouse.active {
                return Err(DomainError::validation("bodega: the warehouse is not active").into());
            }
            if let Some(category_id) = &input.category_id {
                row(&tables.categories, category_id, "category")?;
            }
            if tables.articles.values().any(|a| a.sku() == Some(&sku)) {
                return Err(
                    DomainError::conflict(format!("an article with SKU {sku} already exists")).into(),
                );
            }

            let article_id = ArticleId::generate();
            let cmd = CreateArticle {
                article_id,
                sku: sku.to_string(),
                name: input.name,
                warehouse_id: input.warehouse_id,
                category_id: input.category_id,
                unit: input.unit,
                stock_min: input.stock_min,
                stock_max: input.stock_max,
                reorder_point: input.reorder_point,
                occurred_at: Utc::now(),
            };
            let mut article = Article::empty(article_id);
            let events = decide(&article, ExpectedVersion::Exact(0), &ArticleCommand::CreateArticle(cmd))?;
            apply_all(&mut article, &events);
            tables.articles.insert(article_id, article);

            info!(%article_id, %sku, "article created");
            Ok((article_id, Vec::new()))
        })
    }

    /// Manual entry or exit (`register_movement`).
    #[instrument(skip(self, op, actor), fields(%article_id, actor = %actor.user_id))]
    pub fn move_stock(
        &self,
        article_id: ArticleId,
        op: StockOperation,
        expected: ExpectedVersion,
        actor: &Principal,
    ) -> Result<Movement, StoreError> {
        authorize(actor, &permissions::warehouse::MOVE_STOCK)?;
        let movement_type = Code::parse(&op.movement_type)?;

        self.ctx.commit(|tables| {
            let movement = move_article_stock(
                tables,
                expected,
                MoveStock {
                    article_id,
                    operation: op.operation,
                    movement_type,
                    quantity: op.quantity,
                    actor: actor.user_id,
                    reason: op.reason,
                    reference: op.reference,
                    occurred_at: Utc::now(),
                },
            )?;
            info!(
                %article_id,
                operation = ?movement.operation,
                quantity = %movement.quantity,
                stock_after = %movement.stock_after,
                "stock moved"
            );
            Ok((movement, Vec::new()))
        })
    }

    pub fn article(&self, article_id: ArticleId) -> Result<Article, StoreError> {
        self.ctx
            .read(|tables| row(&tables.articles, &article_id, "article").cloned())?
            .map_err(StoreError::from)
    }

    pub fn below_minimum(&self) -> Result<Vec<Article>, StoreError> {
        self.ctx.read(|tables| {
            below_minimum(tables.articles.values())
                .into_iter()
                .cloned()
                .collect()
        })
    }

    pub fn at_reorder_point(&self) -> Result<Vec<Article>, StoreError> {
        self.ctx.read(|tables| {
            at_reorder_point(tables.articles.values())
                .into_iter()
                .cloned()
                .collect()
        })
    }

    /// Ledger rows of one article, most recent first.
    pub fn movement_history(
        &self,
        article_id: ArticleId,
        limit: usize,
    ) -> Result<Vec<Movement>, StoreError> {
        self.ctx.read(|tables| {
            movement_history(&tables.movements, article_id, limit)
                .into_iter()
                .cloned()
                .collect()
        })
    }
}
