//! Application services.
//!
//! Each service method is one store transaction:
//!
//! ```text
//! authorize → load header (clone) → check ExpectedVersion → decide
//!   → side effects (stock / asset ledgers) → apply → history rows
//!   → commit → publish notices
//! ```
//!
//! Notices are published only after the transaction has committed; a failed
//! publish is logged and does not undo the commit.

use std::sync::Arc;

use tracing::{debug, info, warn};

use gestor_core::{Aggregate, AggregateId};
use gestor_events::{Event, EventBus, EventEnvelope};
use gestor_workflow::{History, HistoryEntry, StatusChanged, WorkflowHeader};

use crate::config::WorkflowConfig;
use crate::projections::{NoticeEnvelope, WorkflowNotice};
use crate::store::{InMemoryStore, StoreError, Tables};

pub mod assets;
pub mod purchasing;
pub mod requisitions;
pub mod warehouse;
pub mod writeoffs;

pub use assets::{AssetService, NewAsset, NewAssetMovement, NewLocation};
pub use purchasing::{NewOrderLine, NewPurchaseOrder, PurchasingService};
pub use requisitions::{NewRequisition, NewRequisitionLine, RequisitionService};
pub use warehouse::{NewArticle, StockOperation, WarehouseService};
pub use writeoffs::{NewWriteOff, NewWriteOffLine, WriteOffService};

/// Store, bus and configuration shared by every service.
#[derive(Debug)]
pub struct ServiceContext<B> {
    store: InMemoryStore,
    bus: B,
    config: WorkflowConfig,
}

impl<B> ServiceContext<B>
where
    B: EventBus<NoticeEnvelope>,
{
    pub fn new(store: InMemoryStore, bus: B, config: WorkflowConfig) -> Arc<Self> {
        Arc::new(Self { store, bus, config })
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Run `f` as one transaction and publish the notices it returns once
    /// the transaction has committed.
    pub(crate) fn commit<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> Result<(T, Vec<NoticeEnvelope>), StoreError>,
    ) -> Result<T, StoreError> {
        let (out, notices) = self.store.atomic(f).inspect_err(|err| {
            warn!(error = %err, "transaction rolled back");
        })?;

        for envelope in notices {
            let header_id = envelope.header_id();
            if let Err(err) = self.bus.publish(envelope) {
                warn!(%header_id, error = ?err, "failed to publish workflow notice");
            }
        }
        Ok(out)
    }

    pub(crate) fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        self.store.read(f)
    }
}

/// Apply decided events to a workflow header, appending one history row and
/// one notice per status change.
pub(crate) fn apply_workflow_events<A>(
    module: &'static str,
    header_id: AggregateId,
    header: &mut A,
    history: &mut History,
    events: &[A::Event],
    status_change: impl Fn(&A::Event) -> Option<&StatusChanged>,
) -> Vec<NoticeEnvelope>
where
    A: Aggregate + WorkflowHeader,
    A::Event: Event,
{
    let mut notices = Vec::new();
    for event in events {
        header.apply(event);
        debug!(module, event = event.event_type(), version = header.version(), "event applied");
        let Some(change) = status_change(event) else {
            continue;
        };

        history.append(HistoryEntry::from_change(header_id, change));
        info!(
            module,
            number = header.number(),
            from = ?change.from.as_ref().map(|c| c.as_str()),
            to = %change.to.code,
            actor = %change.actor,
            "status changed"
        );
        notices.push(EventEnvelope::new(
            header_id,
            module,
            header.version(),
            event.occurred_at(),
            WorkflowNotice::from_change(module, header_id, header, change),
        ));
    }
    notices
}

/// Trimmed, non-empty optional text.
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
