//! Projections (read model builders) fed by the event bus.
//!
//! Projections only see envelopes of committed transactions. They are
//! rebuildable from the envelopes and idempotent under at-least-once delivery.

pub mod notifications;

pub use notifications::{
    Notification, NotificationId, NotificationProjectionError, NotificationsProjection,
    NoticeEnvelope, WorkflowNotice,
};
