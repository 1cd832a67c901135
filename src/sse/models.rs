use crate::tally::Tally;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvent {
    TallyUpdate(Tally),
    CooldownClear,
}

pub type EventSender = tokio::sync::broadcast::Sender<PollEvent>;
pub type EventReceiver = tokio::sync::broadcast::Receiver<PollEvent>;
