use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gestor_core::AggregateId;

/// A committed workflow event as it travels on the bus.
///
/// `sequence` is the header's version right after the event was applied, so
/// consumers can keep one cursor per header and ignore redeliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    id: Uuid,
    header_id: AggregateId,
    /// Owning module ("solicitudes", "compras", "bajas_inventario").
    module: String,
    sequence: u64,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        header_id: AggregateId,
        module: impl Into<String>,
        sequence: u64,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            header_id,
            module: module.into(),
            sequence,
            occurred_at,
            payload,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn header_id(&self) -> AggregateId {
        self.header_id
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// True when this envelope is newer than `cursor` for its header.
    pub fn is_after(&self, cursor: u64) -> bool {
        self.sequence > cursor
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelopes_get_distinct_ids() {
        let header = AggregateId::new();
        let first = EventEnvelope::new(header, "solicitudes", 1, Utc::now(), "creada");
        let second = EventEnvelope::new(header, "solicitudes", 2, Utc::now(), "aprobada");

        assert_ne!(first.id(), second.id());
        assert_eq!(second.header_id(), header);
        assert_eq!(second.module(), "solicitudes");
    }

    #[test]
    fn cursor_comparison() {
        let env = EventEnvelope::new(AggregateId::new(), "compras", 3, Utc::now(), ());
        assert!(env.is_after(2));
        assert!(!env.is_after(3));
        assert!(!env.is_after(7));
    }
}
