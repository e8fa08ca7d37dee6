//! Process-local bus backing the services and the test suites.

use std::fmt;
use std::sync::{mpsc, Mutex, MutexGuard};

use crate::bus::{EventBus, Subscription};

/// The fan-out list lock was poisoned by a panicking publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusPoisoned;

impl fmt::Display for BusPoisoned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("event bus lock poisoned")
    }
}

impl std::error::Error for BusPoisoned {}

#[derive(Debug)]
struct Fanout<M> {
    senders: Vec<mpsc::Sender<M>>,
    published: u64,
}

/// Synchronous fan-out over `std::sync::mpsc` channels.
///
/// Each message is cloned once per live subscription. A subscription whose
/// receiver was dropped is forgotten on the next publish.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    fanout: Mutex<Fanout<M>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self {
            fanout: Mutex::new(Fanout {
                senders: Vec::new(),
                published: 0,
            }),
        }
    }

    fn fanout(&self) -> Result<MutexGuard<'_, Fanout<M>>, BusPoisoned> {
        self.fanout.lock().map_err(|_| BusPoisoned)
    }

    pub fn subscriber_count(&self) -> usize {
        self.fanout().map(|f| f.senders.len()).unwrap_or(0)
    }

    /// Messages accepted since the bus was created.
    pub fn published_count(&self) -> u64 {
        self.fanout().map(|f| f.published).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = BusPoisoned;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut fanout = self.fanout()?;
        fanout.published += 1;
        fanout.senders.retain(|tx| tx.send(message.clone()).is_ok());
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        match self.fanout.lock() {
            Ok(mut fanout) => fanout.senders.push(tx),
            Err(poisoned) => poisoned.into_inner().senders.push(tx),
        }
        Subscription::new(rx)
    }
}
