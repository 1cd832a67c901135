use crate::error::PollError;
use crate::protocol::ClientMessage;
use crate::sse::{Broadcaster, EventReceiver};
use crate::tally::{Color, Tally, TallyStore};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Participant,
}

/// Decides what a reset needs before it is accepted.
#[derive(Debug, Clone, Default)]
pub struct ResetPolicy {
    admin_token: Option<Arc<str>>,
}

impl ResetPolicy {
    /// Anyone may reset.
    pub fn open() -> Self {
        Self { admin_token: None }
    }

    /// Only clients presenting `token` are admins.
    pub fn with_token(token: impl Into<Arc<str>>) -> Self {
        Self {
            admin_token: Some(token.into()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.admin_token.is_none()
    }

    pub fn role_for(&self, presented: Option<&str>) -> Role {
        match (&self.admin_token, presented) {
            (None, _) => Role::Admin,
            (Some(expected), Some(given)) if expected.as_ref() == given => Role::Admin,
            _ => Role::Participant,
        }
    }
}

/// Routes validated client intents into the store and out to observers.
#[derive(Clone)]
pub struct IngressHandler {
    store: TallyStore,
    broadcaster: Broadcaster,
}

impl IngressHandler {
    pub fn new(store: TallyStore, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Current tally, e.g. for a newly connected observer.
    pub async fn connect_snapshot(&self) -> Tally {
        self.store.snapshot().await
    }

    /// Subscribes to events and takes the connect-time snapshot atomically:
    /// the receiver yields exactly the events that follow the snapshot.
    pub async fn subscribe(&self) -> (Tally, EventReceiver) {
        let guard = self.store.read().await;
        let rx = self.broadcaster.subscribe();
        (guard.snapshot(), rx)
    }

    /// Parses a raw body and handles it. Nothing is mutated on a parse error.
    pub async fn handle_raw(&self, body: &[u8], role: Role) -> Result<Tally, PollError> {
        let message = ClientMessage::from_slice(body).inspect_err(|e| {
            warn!("rejected request: {e}");
        })?;
        self.handle(message, role).await
    }

    pub async fn handle(&self, message: ClientMessage, role: Role) -> Result<Tally, PollError> {
        match message {
            ClientMessage::Vote(color) => Ok(self.vote(color).await),
            ClientMessage::Reset => self.reset(role).await,
        }
    }

    pub async fn vote(&self, color: Color) -> Tally {
        let guard = self.store.apply_vote(color).await;
        let snapshot = guard.snapshot();
        self.broadcaster.publish_tally(snapshot);
        info!(%color, total = snapshot.total(), "vote applied");
        snapshot
    }

    pub async fn reset(&self, role: Role) -> Result<Tally, PollError> {
        if role != Role::Admin {
            warn!("reset refused for participant");
            return Err(PollError::Unauthorized);
        }

        let guard = self.store.reset().await;
        let snapshot = guard.snapshot();
        self.broadcaster.publish_tally(snapshot);
        self.broadcaster.publish_cooldown_clear();
        info!("poll reset");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::PollEvent;

    fn handler() -> IngressHandler {
        IngressHandler::new(TallyStore::new(), Broadcaster::default())
    }

    #[tokio::test]
    async fn vote_vote_reset_scenario() {
        let ingress = handler();
        let mut rx = ingress.broadcaster().subscribe();

        ingress.vote(Color::Agree).await;
        ingress.vote(Color::Disagree).await;
        let after_reset = ingress.reset(Role::Admin).await.unwrap();
        assert_eq!(after_reset, Tally::default());

        assert_eq!(
            rx.recv().await.unwrap(),
            PollEvent::TallyUpdate(Tally {
                agree: 1,
                neutral: 0,
                disagree: 0
            })
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            PollEvent::TallyUpdate(Tally {
                agree: 1,
                neutral: 0,
                disagree: 1
            })
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            PollEvent::TallyUpdate(Tally::default())
        );
        assert_eq!(rx.recv().await.unwrap(), PollEvent::CooldownClear);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn invalid_color_changes_nothing_and_broadcasts_nothing() {
        let ingress = handler();
        let mut rx = ingress.broadcaster().subscribe();
        ingress.vote(Color::Neutral).await;
        rx.recv().await.unwrap();

        let err = ingress
            .handle_raw(br#"{"type":"vote","color":"blue"}"#, Role::Participant)
            .await
            .unwrap_err();
        assert!(matches!(err, PollError::InvalidColor(_)));
        assert_eq!(
            ingress.connect_snapshot().await,
            Tally {
                agree: 0,
                neutral: 1,
                disagree: 0
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn participant_reset_is_refused_when_guarded() {
        let policy = ResetPolicy::with_token("sesame");
        let ingress = handler();
        ingress.vote(Color::Agree).await;
        let mut rx = ingress.broadcaster().subscribe();

        let role = policy.role_for(Some("wrong"));
        let err = ingress.handle(ClientMessage::Reset, role).await.unwrap_err();
        assert!(matches!(err, PollError::Unauthorized));
        assert_eq!(ingress.connect_snapshot().await.agree, 1);
        assert!(rx.try_recv().is_err());

        let role = policy.role_for(Some("sesame"));
        assert_eq!(
            ingress.handle(ClientMessage::Reset, role).await.unwrap(),
            Tally::default()
        );
    }

    #[tokio::test]
    async fn subscriber_sees_only_events_after_its_snapshot() {
        let ingress = handler();
        ingress.vote(Color::Agree).await;
        ingress.vote(Color::Disagree).await;
        ingress.vote(Color::Disagree).await;

        let (snapshot, mut rx) = ingress.subscribe().await;
        assert_eq!(
            snapshot,
            Tally {
                agree: 1,
                neutral: 0,
                disagree: 2
            }
        );
        assert!(rx.try_recv().is_err());

        ingress.vote(Color::Neutral).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            PollEvent::TallyUpdate(Tally {
                agree: 1,
                neutral: 1,
                disagree: 2
            })
        );
    }

    #[test]
    fn open_policy_makes_everyone_admin() {
        let policy = ResetPolicy::open();
        assert!(policy.is_open());
        assert_eq!(policy.role_for(None), Role::Admin);
        assert_eq!(
            ResetPolicy::with_token("t").role_for(None),
            Role::Participant
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_votes_broadcast_monotonic_totals() {
        let ingress = handler();
        let mut rx = ingress.broadcaster().subscribe();

        let mut handles = Vec::new();
        for i in 0..60 {
            let ingress = ingress.clone();
            handles.push(tokio::spawn(async move {
                ingress.vote(Color::ALL[i % 3]).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut last_total = 0;
        for _ in 0..60 {
            match rx.recv().await.unwrap() {
                PollEvent::TallyUpdate(tally) => {
                    assert_eq!(tally.total(), last_total + 1);
                    last_total = tally.total();
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(last_total, 60);
    }
}
