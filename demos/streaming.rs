//! Public market data explorer.
//!
//! Subscribes to BTC and ETH tickers plus the top five levels of the BTC order book, prints what
//! arrives for a while, forces one reconnect to show that subscriptions are restored, then shuts
//! down.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info cargo run --example streaming
//! ```

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use xt_ws_client::Session;
use xt_ws_client::session::types::response::{Depth, Event, Ticker};
use xt_ws_client::topic;
use xt_ws_client::ws::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::builder().heartbeat_interval("5s").build();
    let session = Session::connect(config, CancellationToken::new()).await?;
    info!(state = %session.state(), "connected");

    session.set_callback(topic::SPOT_TICKER, |bytes| {
        match serde_json::from_slice::<Event<Ticker>>(bytes) {
            Ok(event) => info!(
                stream = "ticker",
                symbol = %event.data.symbol,
                close = %event.data.close,
                change_rate = %event.data.change_rate
            ),
            Err(e) => warn!(stream = "ticker", error = %e),
        }
    });
    session.set_callback(topic::SPOT_DEPTH, |bytes| {
        match serde_json::from_slice::<Event<Depth>>(bytes) {
            Ok(event) => info!(
                stream = "depth",
                symbol = %event.data.symbol,
                best_ask = ?event.data.asks.first(),
                best_bid = ?event.data.bids.first()
            ),
            Err(e) => warn!(stream = "depth", error = %e),
        }
    });

    let tickers = session.subscribe_ticker(&["btc_usdt", "eth_usdt"]).await?;
    let depths = session.subscribe_depth(&["btc_usdt"], 5).await?;
    info!(?tickers, ?depths, "subscribed");

    sleep(Duration::from_secs(10)).await;

    let outcome = session.reconnect().await?;
    info!(?outcome, subscriptions = ?session.subscribed_topics(), "forced reconnect");

    sleep(Duration::from_secs(10)).await;

    session.unsubscribe(&depths).await?;
    info!(subscriptions = ?session.subscribed_topics(), "unsubscribed from depth");

    sleep(Duration::from_secs(5)).await;
    session.shutdown().await;

    Ok(())
}
