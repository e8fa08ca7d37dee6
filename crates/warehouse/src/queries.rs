//! Read-side queries over articles and the movement ledger.

use crate::article::{Article, ArticleId};
use crate::stock::Movement;

/// Articles whose stock is strictly below their minimum.
pub fn below_minimum<'a>(articles: impl IntoIterator<Item = &'a Article>) -> Vec<&'a Article> {
    articles
        .into_iter()
        .filter(|a| a.is_created() && a.stock() < a.stock_min())
        .collect()
}

/// Articles at or below their reorder point (articles without one are skipped).
pub fn at_reorder_point<'a>(articles: impl IntoIterator<Item = &'a Article>) -> Vec<&'a Article> {
    articles
        .into_iter()
        .filter(|a| a.reorder_point().is_some_and(|point| a.stock() <= point))
        .collect()
}

/// Movements of one article, most recent first, at most `limit` rows.
pub fn movement_history<'a>(
    movements: impl IntoIterator<Item = &'a Movement>,
    article_id: ArticleId,
    limit: usize,
) -> Vec<&'a Movement> {
    let mut rows: Vec<&Movement> = movements
        .into_iter()
        .filter(|m| m.article_id == article_id)
        .collect();
    rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    rows.truncate(limit);
    rows
}
