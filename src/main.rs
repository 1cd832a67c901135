use pulse_poll::config::Config;
use pulse_poll::startup::{AppState, app};

#[macro_use]
extern crate tracing;

#[tokio::main]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "INFO");
        }
    }
    // initialize tracing
    tracing_subscriber::fmt::init();

    let config = Config::from_env().expect("Invalid configuration");
    let app_state = AppState::new(&config);
    let app = app(app_state);

    let addr = config.bind_addr;
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Unable to spawn tcp listener");

    axum::serve(listener, app).await.unwrap();
}
