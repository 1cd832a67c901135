pub mod client;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod ingress;
pub mod polls;
pub mod protocol;
pub mod socket;
pub mod sse;
pub mod startup;
pub mod tally;

pub use error::PollError;
pub use startup::{AppState, app};
