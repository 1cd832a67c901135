use crate::config::Config;
use crate::ingress::{IngressHandler, ResetPolicy};
use crate::polls::{get_tally, health, submit};
use crate::socket::socket_handler;
use crate::sse::{Broadcaster, tally_sse};
use crate::tally::TallyStore;
use axum::{
    Router,
    extract::Extension,
    http::{
        HeaderName, Method, StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::IntoResponse,
    routing::get,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Clone)]
pub struct AppState {
    pub ingress: IngressHandler,
    pub reset_policy: ResetPolicy,
    pub keep_alive: Duration,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let reset_policy = match &config.admin_token {
            Some(token) => ResetPolicy::with_token(token.as_str()),
            None => {
                warn!("POLL_ADMIN_TOKEN is not set, any client may reset the poll");
                ResetPolicy::open()
            }
        };

        AppState {
            ingress: IngressHandler::new(
                TallyStore::new(),
                Broadcaster::new(config.broadcast_capacity),
            ),
            reset_policy,
            keep_alive: config.keep_alive,
        }
    }
}

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .route("/api/poll", get(get_tally).post(submit))
        .route("/api/tally", get(get_tally))
        .route("/api/poll/events", get(tally_sse))
        .route("/api/socket", get(socket_handler))
        .route("/health", get(health))
        .fallback(handler_404)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(app_state))
                .layer(
                    CorsLayer::new()
                        .allow_origin(AllowOrigin::mirror_request())
                        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                        .allow_headers([
                            CONTENT_TYPE,
                            ACCEPT,
                            HeaderName::from_static(ADMIN_TOKEN_HEADER),
                        ]),
                ),
        )
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
