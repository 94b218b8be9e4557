use std::sync::Arc;

use tokio::time::{MissedTickBehavior, interval};

use super::client::SessionInner;
use crate::topic;

/// Start writing `ping` every heartbeat interval while the session is connected.
pub(super) fn spawn(inner: &Arc<SessionInner>) {
    let period = inner.config.heartbeat_interval();
    let session = Arc::downgrade(inner);
    let cancel = inner.cancel.clone();

    tracing::debug!(?period, "starting heartbeat");

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(inner) = session.upgrade() else {
                break;
            };
            if !inner.connection.state().is_connected() {
                continue;
            }

            if let Err(e) = inner.connection.write_text(topic::PING.to_owned()).await {
                tracing::warn!(error = %e, "failed to write heartbeat");
            }
        }

        tracing::debug!("heartbeat stopped");
    });
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use futures::StreamExt as _;
    use tokio::net::TcpListener;
    use tokio::time::sleep;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::Session;
    use crate::ws::{Config, ConnectionState};

    /// WebSocket server that only counts `ping` frames.
    async fn ping_counter() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let pings = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pings);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                let counter = Arc::clone(&counter);
                tokio::spawn(async move {
                    while let Some(Ok(message)) = ws_stream.next().await {
                        if message.to_text().is_ok_and(|text| text == topic::PING) {
                            counter.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        (format!("ws://{addr}"), pings)
    }

    #[tokio::test]
    async fn silent_unless_connected() {
        let (endpoint, pings) = ping_counter().await;
        let config = Config::builder()
            .endpoint(endpoint)
            .heartbeat_interval("50ms")
            .build();
        let session = Session::connect(config, CancellationToken::new())
            .await
            .unwrap();
        let connection = &session.inner.connection;

        sleep(Duration::from_millis(200)).await;
        assert!(pings.load(Ordering::SeqCst) > 0, "pings while connected");

        for state in [
            ConnectionState::Reconnecting { attempt: 1 },
            ConnectionState::Disconnected,
        ] {
            connection.set_state(state);
            // A tick that passed the state check just before the switch may still land
            sleep(Duration::from_millis(30)).await;
            let before = pings.load(Ordering::SeqCst);

            sleep(Duration::from_millis(300)).await;
            assert_eq!(pings.load(Ordering::SeqCst), before, "pinged while {state}");
        }

        connection.set_state(ConnectionState::Connected {
            since: Instant::now(),
        });
        let resumed_from = pings.load(Ordering::SeqCst);
        sleep(Duration::from_millis(200)).await;
        assert!(
            pings.load(Ordering::SeqCst) > resumed_from,
            "pings resume once connected again"
        );

        session.shutdown().await;
    }
}
