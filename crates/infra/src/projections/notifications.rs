use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use gestor_core::{AggregateId, Code, UserId};
use gestor_events::{EventEnvelope, Subscription};
use gestor_workflow::{StatusChanged, WorkflowHeader};

use crate::read_model::KeyValueStore;

gestor_core::aggregate_id!(
    /// Notification identifier.
    NotificationId
);

/// A committed status change, as published on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowNotice {
    /// Module that owns the header ("solicitudes", "compras", "bajas_inventario").
    pub module: String,
    pub header_id: AggregateId,
    pub number: String,
    pub requester: UserId,
    pub actor: UserId,
    pub previous: Option<Code>,
    pub status: Code,
    pub status_name: String,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl WorkflowNotice {
    pub fn from_change(
        module: &str,
        header_id: AggregateId,
        header: &impl WorkflowHeader,
        change: &StatusChanged,
    ) -> Self {
        Self {
            module: module.to_string(),
            header_id,
            number: header.number().to_string(),
            requester: header.workflow().requester,
            actor: change.actor,
            previous: change.from.clone(),
            status: change.to.code.clone(),
            status_name: change.to.name.clone(),
            note: change.note.clone(),
            occurred_at: change.occurred_at,
        }
    }
}

pub type NoticeEnvelope = EventEnvelope<WorkflowNotice>;

/// Stored notification for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub origin: UserId,
    pub title: String,
    pub message: String,
    pub module: String,
    pub reference: String,
    pub header_id: AggregateId,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationProjectionError {
    #[error("sequence number 0 is not a committed event (header {0})")]
    UncommittedSequence(AggregateId),

    #[error("notification {0} not found")]
    NotFound(NotificationId),

    #[error("projection state poisoned")]
    Poisoned,
}

/// Builds per-user notifications from committed status changes.
///
/// The requester of a header is told about every change someone else makes
/// to it. Replayed envelopes (sequence at or below the cursor of their
/// header) are ignored.
#[derive(Debug)]
pub struct NotificationsProjection<S>
where
    S: KeyValueStore<NotificationId, Notification>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> NotificationsProjection<S>
where
    S: KeyValueStore<NotificationId, Notification>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Apply one envelope. Returns the id of the stored notification, if one
    /// was created.
    pub fn apply_envelope(
        &self,
        envelope: &NoticeEnvelope,
    ) -> Result<Option<NotificationId>, NotificationProjectionError> {
        let header_id = envelope.header_id();
        let seq = envelope.sequence();
        if seq == 0 {
            return Err(NotificationProjectionError::UncommittedSequence(header_id));
        }

        let mut cursors = self
            .cursors
            .write()
            .map_err(|_| NotificationProjectionError::Poisoned)?;
        let cursor = cursors.get(&header_id).copied().unwrap_or(0);
        if !envelope.is_after(cursor) {
            return Ok(None);
        }
        cursors.insert(header_id, seq);

        let notice = envelope.payload();
        if notice.actor == notice.requester {
            return Ok(None);
        }

        let notification = Notification {
            id: NotificationId::generate(),
            recipient: notice.requester,
            origin: notice.actor,
            title: format!("{} {}: {}", module_label(&notice.module), notice.number, notice.status_name),
            message: message_for(notice),
            module: notice.module.clone(),
            reference: notice.number.clone(),
            header_id: notice.header_id,
            read: false,
            created_at: notice.occurred_at,
        };
        let id = notification.id;
        self.store.upsert(id, notification);
        Ok(Some(id))
    }

    /// Apply everything queued on `subscription`. Failures are logged and
    /// skipped; returns the number of notifications created.
    pub fn drain(&self, subscription: &Subscription<NoticeEnvelope>) -> usize {
        let mut created = 0;
        for envelope in subscription.drain() {
            match self.apply_envelope(&envelope) {
                Ok(Some(_)) => created += 1,
                Ok(None) => {}
                Err(err) => warn!(
                    header_id = %envelope.header_id(),
                    sequence = envelope.sequence(),
                    error = %err,
                    "failed to project workflow notice"
                ),
            }
        }
        created
    }

    /// Notifications of one user, newest first.
    pub fn list_for(&self, user: UserId) -> Vec<Notification> {
        let mut rows: Vec<Notification> = self
            .store
            .list()
            .into_iter()
            .filter(|n| n.recipient == user)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    pub fn unread_count(&self, user: UserId) -> usize {
        self.store
            .list()
            .iter()
            .filter(|n| n.recipient == user && !n.read)
            .count()
    }

    /// Mark one of `user`'s notifications as read. Other users' notifications
    /// are reported as not found.
    pub fn mark_read(&self, user: UserId, id: NotificationId) -> Result<(), NotificationProjectionError> {
        let mut notification = self
            .store
            .get(&id)
            .filter(|n| n.recipient == user)
            .ok_or(NotificationProjectionError::NotFound(id))?;
        notification.read = true;
        self.store.upsert(id, notification);
        Ok(())
    }

    pub fn mark_all_read(&self, user: UserId) -> usize {
        let mut marked = 0;
        for mut notification in self.store.list() {
            if notification.recipient == user && !notification.read {
                notification.read = true;
                self.store.upsert(notification.id, notification);
                marked += 1;
            }
        }
        marked
    }

    /// Rebuild from scratch by replaying envelopes in (header, sequence) order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = NoticeEnvelope>,
    ) -> Result<(), NotificationProjectionError> {
        self.cursors
            .write()
            .map_err(|_| NotificationProjectionError::Poisoned)?
            .clear();
        self.store.clear();

        let mut envelopes: Vec<_> = envelopes.into_iter().collect();
        envelopes.sort_by_key(|e| (e.header_id(), e.sequence()));
        for envelope in &envelopes {
            self.apply_envelope(envelope)?;
        }
        Ok(())
    }
}

fn module_label(module: &str) -> &str {
    match module {
        "solicitudes" => "Solicitud",
        "compras" => "Orden de compra",
        "bajas_inventario" => "Baja de inventario",
        other => other,
    }
}

fn message_for(notice: &WorkflowNotice) -> String {
    let mut message = match &notice.previous {
        Some(previous) => format!(
            "{} cambió de {} a {}.",
            notice.number, previous, notice.status_name
        ),
        None => format!("{} fue creada en estado {}.", notice.number, notice.status_name),
    };
    if let Some(note) = notice.note.as_deref().filter(|n| !n.trim().is_empty()) {
        message.push_str(" Observaciones: ");
        message.push_str(note);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::InMemoryKeyValueStore;

    fn notice(requester: UserId, actor: UserId) -> WorkflowNotice {
        WorkflowNotice {
            module: "solicitudes".into(),
            header_id: AggregateId::new(),
            number: "SOL-00000001".into(),
            requester,
            actor,
            previous: Some(Code::from_static("PENDIENTE")),
            status: Code::from_static("APROBADA"),
            status_name: "Aprobada".into(),
            note: Some("ok".into()),
            occurred_at: Utc::now(),
        }
    }

    fn envelope(notice: WorkflowNotice, seq: u64) -> NoticeEnvelope {
        EventEnvelope::new(notice.header_id, "solicitudes", seq, notice.occurred_at, notice)
    }

    fn projection() -> NotificationsProjection<InMemoryKeyValueStore<NotificationId, Notification>> {
        NotificationsProjection::new(InMemoryKeyValueStore::new())
    }

    #[test]
    fn requester_is_notified_of_changes_by_others() {
        let projection = projection();
        let requester = UserId::new();
        let env = envelope(notice(requester, UserId::new()), 3);

        let id = projection.apply_envelope(&env).unwrap().unwrap();
        let rows = projection.list_for(requester);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].title, "Solicitud SOL-00000001: Aprobada");
        assert!(rows[0].message.contains("PENDIENTE"));
        assert_eq!(projection.unread_count(requester), 1);
    }

    #[test]
    fn own_changes_and_replays_are_skipped() {
        let projection = projection();
        let requester = UserId::new();
        assert_eq!(
            projection.apply_envelope(&envelope(notice(requester, requester), 1)).unwrap(),
            None
        );

        let env = envelope(notice(requester, UserId::new()), 2);
        assert!(projection.apply_envelope(&env).unwrap().is_some());
        assert_eq!(projection.apply_envelope(&env).unwrap(), None);
        assert_eq!(projection.list_for(requester).len(), 1);
    }

    #[test]
    fn mark_read_is_scoped_to_the_recipient() {
        let projection = projection();
        let requester = UserId::new();
        let id = projection
            .apply_envelope(&envelope(notice(requester, UserId::new()), 1))
            .unwrap()
            .unwrap();

        assert_eq!(
            projection.mark_read(UserId::new(), id),
            Err(NotificationProjectionError::NotFound(id))
        );
        projection.mark_read(requester, id).unwrap();
        assert_eq!(projection.unread_count(requester), 0);
    }

    #[test]
    fn sequence_zero_is_rejected() {
        let projection = projection();
        let env = envelope(notice(UserId::new(), UserId::new()), 0);
        assert!(matches!(
            projection.apply_envelope(&env),
            Err(NotificationProjectionError::UncommittedSequence(_))
        ));
    }

    #[test]
    fn rebuild_replays_in_order() {
        let projection = projection();
        let requester = UserId::new();
        let first = notice(requester, UserId::new());
        let mut second = first.clone();
        second.previous = Some(Code::from_static("APROBADA"));
        second.status = Code::from_static("DESPACHADA");
        second.status_name = "Despachada".into();

        projection
            .rebuild_from_scratch(vec![envelope(second, 5), envelope(first, 2)])
            .unwrap();
        assert_eq!(projection.list_for(requester).len(), 2);
    }
}
