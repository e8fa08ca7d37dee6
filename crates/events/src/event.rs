use chrono::{DateTime, Utc};

/// A fact decided by an aggregate: a header was created, a line was added,
/// stock moved, a status changed.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, `module.record.fact` (e.g. "requisitions.requisition.status_changed").
    fn event_type(&self) -> &'static str;

    /// Business time of the fact.
    fn occurred_at(&self) -> DateTime<Utc>;
}
