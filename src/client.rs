//! WebSocket client for participants and admins.
//!
//! Holds a read-only view of the tally, a [`CooldownGuard`] that is reserved
//! when a vote goes out and released again if the server does not accept it,
//! and a background reader that applies pushed frames. Requests carry an id so
//! a late reply is never taken for the answer to a newer request. Dropping the
//! client tears all of it down.

use crate::cooldown::CooldownGuard;
use crate::error::PollError;
use crate::ingress::Role;
use crate::protocol::{COOLDOWN_SECS, ClientMessage, ServerMessage, request_id};
use crate::tally::{Color, Tally};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = Result<Tally, PollError>;

pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

struct RequestChannel {
    sink: SplitSink<WsStream, Message>,
    replies: mpsc::UnboundedReceiver<(Option<u64>, Reply)>,
    next_id: u64,
}

pub struct PollClient {
    role: Role,
    reply_timeout: Duration,
    requests: Mutex<RequestChannel>,
    tally: watch::Receiver<Tally>,
    cooldown: Arc<Mutex<CooldownGuard>>,
    reader: JoinHandle<()>,
}

impl PollClient {
    /// Connects to the socket endpoint, e.g. `ws://host/api/socket`.
    /// Admins on a guarded server also append `?admin_token=...`.
    pub async fn connect(url: &str, role: Role) -> Result<Self, PollError> {
        let (ws, _response) = connect_async(url).await?;
        let (sink, stream) = ws.split();

        let (tally_tx, tally_rx) = watch::channel(Tally::default());
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let cooldown = Arc::new(Mutex::new(CooldownGuard::new()));

        let reader = tokio::spawn(read_frames(
            stream,
            tally_tx,
            reply_tx,
            Arc::clone(&cooldown),
        ));

        Ok(Self {
            role,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            requests: Mutex::new(RequestChannel {
                sink,
                replies: reply_rx,
                next_id: 1,
            }),
            tally: tally_rx,
            cooldown,
            reader,
        })
    }

    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn tally(&self) -> Tally {
        *self.tally.borrow()
    }

    pub fn watch_tally(&self) -> watch::Receiver<Tally> {
        self.tally.clone()
    }

    pub async fn can_vote(&self) -> bool {
        self.cooldown.lock().await.can_vote()
    }

    pub async fn cooldown_remaining(&self) -> u32 {
        self.cooldown.lock().await.remaining()
    }

    pub async fn watch_cooldown(&self) -> watch::Receiver<u32> {
        self.cooldown.lock().await.subscribe()
    }

    /// Sends a vote unless cooling down. The cooldown is claimed before the
    /// vote is sent, so at most one vote per window leaves this client, and
    /// released again if the server rejects it or never answers.
    pub async fn vote(&self, color: Color) -> Result<Tally, PollError> {
        {
            let mut guard = self.cooldown.lock().await;
            if !guard.can_vote() {
                return Err(PollError::CoolingDown(guard.remaining()));
            }
            guard.start_cooldown(COOLDOWN_SECS);
        }

        match self.request(ClientMessage::Vote(color)).await {
            Ok(tally) => Ok(tally),
            Err(e) => {
                self.cooldown.lock().await.force_clear();
                Err(e)
            }
        }
    }

    /// Participants are refused locally. Nothing is sent.
    pub async fn reset(&self) -> Result<Tally, PollError> {
        if self.role != Role::Admin {
            return Err(PollError::Unauthorized);
        }
        self.request(ClientMessage::Reset).await
    }

    /// Sends raw text as-is. Lets callers exercise server-side validation.
    /// The reply is matched on whatever `id` the text carries, if any.
    pub async fn send_raw(&self, text: &str) -> Result<Tally, PollError> {
        let mut channel = self.requests.lock().await;
        channel.sink.send(Message::Text(text.to_string())).await?;
        await_reply(&mut channel.replies, request_id(text), self.reply_timeout).await
    }

    async fn request(&self, message: ClientMessage) -> Result<Tally, PollError> {
        let mut channel = self.requests.lock().await;
        let id = channel.next_id;
        channel.next_id += 1;

        let text = message.to_json_with_id(id).to_string();
        channel.sink.send(Message::Text(text)).await?;
        await_reply(&mut channel.replies, Some(id), self.reply_timeout).await
    }
}

impl Drop for PollClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Waits for the reply tagged `expected`, discarding replies to requests
/// that already timed out.
async fn await_reply(
    replies: &mut mpsc::UnboundedReceiver<(Option<u64>, Reply)>,
    expected: Option<u64>,
    reply_timeout: Duration,
) -> Reply {
    let matching = async {
        while let Some((id, reply)) = replies.recv().await {
            if id == expected {
                return reply;
            }
            debug!(?id, ?expected, "discarding stale reply");
        }
        Err(PollError::TransportUnavailable(
            "connection closed".to_string(),
        ))
    };

    tokio::time::timeout(reply_timeout, matching)
        .await
        .unwrap_or_else(|_| {
            Err(PollError::TransportUnavailable(
                "no reply from server".to_string(),
            ))
        })
}

async fn read_frames(
    mut stream: SplitStream<WsStream>,
    tally: watch::Sender<Tally>,
    replies: mpsc::UnboundedSender<(Option<u64>, Reply)>,
    cooldown: Arc<Mutex<CooldownGuard>>,
) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("socket read failed: {e}");
                break;
            }
        };

        match serde_json::from_str::<ServerMessage>(&text) {
            Ok(ServerMessage::TallyUpdate(snapshot)) => {
                tally.send_replace(snapshot);
            }
            Ok(ServerMessage::CooldownClear {}) => {
                cooldown.lock().await.force_clear();
            }
            Ok(ServerMessage::Accepted { id, tally: snapshot }) => {
                let _ = replies.send((id, Ok(snapshot)));
            }
            Ok(ServerMessage::Error { id, error, details }) => {
                let _ = replies.send((id, Err(remote_error(&error, details))));
            }
            Err(e) => debug!("ignoring unreadable frame: {e}"),
        }
    }
}

fn remote_error(label: &str, details: String) -> PollError {
    match label {
        "Invalid color" => PollError::InvalidColor(details),
        "Malformed request" => PollError::MalformedRequest(details),
        "Unauthorized" => PollError::Unauthorized,
        _ => PollError::TransportUnavailable(details),
    }
}
