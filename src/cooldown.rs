use crate::protocol::COOLDOWN_TICK;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

/// Client-local throttle on repeat voting.
///
/// At most one ticker task runs per guard. It is aborted when the countdown
/// is replaced, force-cleared or when the guard is dropped.
pub struct CooldownGuard {
    remaining: Arc<watch::Sender<u32>>,
    ticker: Option<JoinHandle<()>>,
}

impl CooldownGuard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            remaining: Arc::new(tx),
            ticker: None,
        }
    }

    pub fn can_vote(&self) -> bool {
        self.remaining() == 0
    }

    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    /// Presentation layers watch this to render the countdown.
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.remaining.subscribe()
    }

    pub fn start_cooldown(&mut self, seconds: u32) {
        self.stop_ticker();
        self.remaining.send_replace(seconds);
        if seconds == 0 {
            return;
        }

        let remaining = Arc::clone(&self.remaining);
        self.ticker = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + COOLDOWN_TICK, COOLDOWN_TICK);
            loop {
                ticks.tick().await;
                let mut left = 0;
                remaining.send_modify(|r| {
                    *r = r.saturating_sub(1);
                    left = *r;
                });
                if left == 0 {
                    break;
                }
            }
        }));
    }

    pub fn force_clear(&mut self) {
        self.stop_ticker();
        self.remaining.send_replace(0);
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Default for CooldownGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CooldownGuard {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::COOLDOWN_SECS;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn blocks_for_nine_ticks_then_reopens_on_the_tenth() {
        let mut guard = CooldownGuard::new();
        assert!(guard.can_vote());

        guard.start_cooldown(COOLDOWN_SECS);
        assert!(!guard.can_vote());

        // Sample half-way between ticks so the ticker has always run first.
        sleep(Duration::from_millis(500)).await;
        for tick in 1..=9u32 {
            sleep(Duration::from_secs(1)).await;
            assert!(!guard.can_vote(), "open after tick {tick}");
            assert_eq!(guard.remaining(), COOLDOWN_SECS - tick);
        }

        sleep(Duration::from_secs(1)).await;
        assert!(guard.can_vote());
        assert!(!guard.is_ticking());
    }

    #[tokio::test(start_paused = true)]
    async fn force_clear_reopens_immediately_and_stops_ticker() {
        let mut guard = CooldownGuard::new();
        let mut watcher = guard.subscribe();

        guard.start_cooldown(COOLDOWN_SECS);
        sleep(Duration::from_millis(3500)).await;
        assert_eq!(guard.remaining(), 7);

        guard.force_clear();
        assert!(guard.can_vote());
        assert!(!guard.is_ticking());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(guard.remaining(), 0);
        assert_eq!(*watcher.borrow_and_update(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_replaces_the_previous_countdown() {
        let mut guard = CooldownGuard::new();
        guard.start_cooldown(3);
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(guard.remaining(), 2);

        guard.start_cooldown(5);
        sleep(Duration::from_millis(1200)).await;
        // Only the new ticker is decrementing.
        assert_eq!(guard.remaining(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_guard_cancels_its_ticker() {
        let mut guard = CooldownGuard::new();
        let watcher = guard.subscribe();
        guard.start_cooldown(COOLDOWN_SECS);
        sleep(Duration::from_millis(2500)).await;
        drop(guard);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(*watcher.borrow(), 8);
    }
}
