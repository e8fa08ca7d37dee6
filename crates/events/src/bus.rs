//! Publish/subscribe seam between the store and its consumers.
//!
//! Only committed status changes reach the bus. History rows and ledgers are
//! written inside the store transaction, so losing a message never loses
//! data; consumers that miss one can be rebuilt. Delivery is at-least-once.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

/// One consumer's queue. Every subscription receives its own copy of each
/// message published after it was created.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub(crate) fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message. `None` once the bus is gone and the queue
    /// is empty.
    pub fn recv(&self) -> Option<M> {
        self.receiver.recv().ok()
    }

    pub fn try_recv(&self) -> Option<M> {
        self.receiver.try_recv().ok()
    }

    /// Everything queued right now, oldest first.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// ```text
/// service → store commit → EventBus::publish → subscriptions
///                                               └─ notifications
/// ```
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
