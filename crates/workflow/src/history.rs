use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gestor_core::{AggregateId, Code, UserId};

use crate::transition::StatusChanged;

/// Immutable transition log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub header_id: AggregateId,
    pub previous: Option<Code>,
    pub new: Code,
    pub actor: UserId,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

impl HistoryEntry {
    pub fn from_change(header_id: AggregateId, change: &StatusChanged) -> Self {
        Self {
            header_id,
            previous: change.from.clone(),
            new: change.to.code.clone(),
            actor: change.actor,
            at: change.occurred_at,
            note: change.note.clone(),
        }
    }
}

/// Append-only history table.
///
/// Rows are only ever appended.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows of one header, oldest first.
    pub fn for_header(&self, header_id: AggregateId) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.header_id == header_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCatalog;

    #[test]
    fn creation_row_has_no_previous_status() {
        let header = AggregateId::new();
        let initial = StatusCatalog::requisitions().initial().clone();
        let change = StatusChanged::created(initial, UserId::new(), Utc::now());

        let mut history = History::new();
        history.append(HistoryEntry::from_change(header, &change));
        history.append(HistoryEntry::from_change(AggregateId::new(), &change));

        let rows = history.for_header(header);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].previous.is_none());
        assert_eq!(rows[0].new, "PENDIENTE");
    }
}
