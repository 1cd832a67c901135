use crate::sse::models::{EventReceiver, EventSender, PollEvent};
use crate::tally::Tally;
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 100;

/// Fans tally changes out to every live observer.
///
/// Publishing never waits on subscribers. Observers that connect later get
/// nothing from here; they are handed the current snapshot on connect instead.
#[derive(Clone)]
pub struct Broadcaster {
    tx: EventSender,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Returns how many observers the snapshot was queued for.
    pub fn publish_tally(&self, snapshot: Tally) -> usize {
        self.publish(PollEvent::TallyUpdate(snapshot))
    }

    pub fn publish_cooldown_clear(&self) -> usize {
        self.publish(PollEvent::CooldownClear)
    }

    fn publish(&self, event: PollEvent) -> usize {
        match self.tx.send(event) {
            Ok(reached) => {
                debug!(?event, reached, "published poll event");
                reached
            }
            Err(_) => {
                debug!(?event, "no live observers for poll event");
                0
            }
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
