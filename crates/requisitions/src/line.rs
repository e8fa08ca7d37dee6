use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use gestor_assets::AssetId;
use gestor_core::Entity;
use gestor_warehouse::ArticleId;
use gestor_workflow::LineQuantities;

gestor_core::aggregate_id!(
    /// Requisition line identifier.
    RequisitionLineId
);

/// What a requisition asks for: assets or warehouse articles, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequisitionKind {
    #[serde(rename = "ACTIVO")]
    Asset,
    #[serde(rename = "ARTICULO")]
    Article,
}

/// The product a line refers to. One variant per row keeps asset and article
/// references mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequisitionItem {
    Asset(AssetId),
    Article(ArticleId),
}

impl RequisitionItem {
    pub fn kind(&self) -> RequisitionKind {
        match self {
            RequisitionItem::Asset(_) => RequisitionKind::Asset,
            RequisitionItem::Article(_) => RequisitionKind::Article,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionLine {
    pub id: RequisitionLineId,
    pub item: RequisitionItem,
    pub quantities: LineQuantities,
    pub notes: Option<String>,
}

impl Entity for RequisitionLine {
    type Id = RequisitionLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Per-line quantity decided by an approver or a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDecision {
    pub line_id: RequisitionLineId,
    pub quantity: Decimal,
}
