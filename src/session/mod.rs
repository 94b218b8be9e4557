#![expect(
    clippy::module_name_repetitions,
    reason = "Re-exported names intentionally match their modules for API clarity"
)]

//! Persistent streaming session.
//!
//! A [`Session`] keeps one WebSocket open to the XT stream, remembers which topics were
//! subscribed and restores them on every new socket, routes inbound events to per-topic
//! callbacks, and keeps the link alive with periodic `ping` frames.
//!
//! # Example
//!
//! ```rust, no_run
//! use tokio_util::sync::CancellationToken;
//! use xt_ws_client::Session;
//! use xt_ws_client::session::types::response::{Event, Ticker};
//! use xt_ws_client::ws::Config;
//!
//! #[tokio::main]
//! async fn main() -> xt_ws_client::Result<()> {
//!     let session = Session::connect(Config::default(), CancellationToken::new()).await?;
//!
//!     session.set_callback("ticker", |bytes| {
//!         if let Ok(event) = serde_json::from_slice::<Event<Ticker>>(bytes) {
//!             println!("{} closed at {}", event.data.symbol, event.data.close);
//!         }
//!     });
//!     session.subscribe_ticker(&["btc_usdt"]).await?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod client;
mod heartbeat;
mod reader;
pub mod registry;
pub mod router;
pub mod types;

pub use client::Session;
pub use registry::{SubscriptionEntry, SubscriptionRegistry};
pub use router::{Callback, CallbackRouter, Dispatch};
pub use types::request::{Command, SubscribeOptions};
