//! Core WebSocket infrastructure.
//!
//! This module owns the transport side of a session: dialing with linear backoff, the single
//! live socket and its write lock, and the reconnect state machine.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: Dials the endpoint, swaps in a new socket on reconnect and
//!   serializes writes
//! - [`config::Config`]: Endpoint, credentials, heartbeat and retry settings of a session

pub mod config;
pub mod connection;
pub mod error;

pub use config::{Config, ReconnectConfig};
pub use connection::{ConnectionManager, ConnectionState, Reconnect};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
