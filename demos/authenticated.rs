//! Signed request walkthrough.
//!
//! Logs in with the key pair from `XT_API_KEY` and `XT_SECRET`, subscribes to balance updates
//! and queries the status of an order through a signed request.
//!
//! Run with tracing enabled:
//! ```sh
//! XT_API_KEY=... XT_SECRET=... RUST_LOG=info cargo run --example authenticated
//! ```
//!
//! Optionally log to a file:
//! ```sh
//! LOG_FILE=authenticated.log XT_API_KEY=... XT_SECRET=... RUST_LOG=debug cargo run --example authenticated
//! ```

use std::fs::File;
use std::time::Duration;

use serde_json::json;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use xt_ws_client::Session;
use xt_ws_client::auth::{Credentials, RequestOptions};
use xt_ws_client::session::types::response::ApiResponse;
use xt_ws_client::topic;
use xt_ws_client::ws::Config;
use xt_ws_client::ws::config::PRIVATE_ENDPOINT;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Ok(path) = std::env::var("LOG_FILE") {
        let file = File::create(path)?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let credentials = Credentials::new(std::env::var("XT_API_KEY")?, std::env::var("XT_SECRET")?);
    let config = Config::builder()
        .endpoint(PRIVATE_ENDPOINT)
        .credentials(credentials)
        .build();
    let session = Session::connect(config, CancellationToken::new()).await?;

    session.set_callback(topic::SPOT_BALANCE, |bytes| {
        info!(stream = "balance", payload = %String::from_utf8_lossy(bytes));
    });
    // Signed responses carry the channel they answer as their topic
    session.set_callback(topic::SPOT_ORDER_STATUS, |bytes| {
        match serde_json::from_slice::<ApiResponse>(bytes) {
            Ok(response) => info!(
                req_id = %response.req_id,
                success = response.is_success(),
                result = ?response.data.result
            ),
            Err(e) => error!(error = %e, "unexpected order status payload"),
        }
    });

    session.subscribe(&[topic::SPOT_BALANCE.to_owned()]).await?;
    info!(login = %session.login_state(), "subscribed to balance updates");

    let req_id = session
        .api_request(
            topic::SPOT_ORDER_STATUS,
            &json!({ "symbol": "btc_usdt", "order_id": "1" }),
            &RequestOptions::builder().channel_id("demo").build(),
        )
        .await?;
    info!(%req_id, "order status requested");

    sleep(Duration::from_secs(15)).await;
    session.shutdown().await;

    Ok(())
}
