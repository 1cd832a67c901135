use crate::protocol::{EVENT_COOLDOWN_CLEAR, EVENT_TALLY_UPDATE};
use crate::sse::models::PollEvent;
use crate::startup::AppState;
use crate::tally::Tally;
use axum::{
    extract::Extension,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Field order follows the struct: agree, neutral, disagree.
fn tally_event(tally: &Tally) -> Event {
    let data = serde_json::to_string(tally).unwrap_or_else(|e| {
        warn!("failed to encode tally: {e}");
        json!({ "error": "Transport unavailable", "details": e.to_string() }).to_string()
    });
    Event::default().event(EVENT_TALLY_UPDATE).data(data)
}

/// Live tally feed. Opens with the current snapshot, then relays every
/// tally update and cooldown clear in publish order.
pub async fn tally_sse(
    Extension(app_state): Extension<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ingress = app_state.ingress.clone();

    let stream = async_stream::stream! {
        let (current, mut rx) = ingress.subscribe().await;
        yield Ok(tally_event(&current));

        loop {
            match rx.recv().await {
                Ok(PollEvent::TallyUpdate(tally)) => yield Ok(tally_event(&tally)),
                Ok(PollEvent::CooldownClear) => {
                    yield Ok(Event::default()
                        .event(EVENT_COOLDOWN_CLEAR)
                        .data(json!({}).to_string()));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "sse observer lagged, resynchronising");
                    let (current, fresh) = ingress.subscribe().await;
                    rx = fresh;
                    yield Ok(tally_event(&current));
                }
                Err(RecvError::Closed) => {
                    debug!("broadcaster closed, ending sse stream");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(app_state.keep_alive)
            .text("keep-alive"),
    )
}
