#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use xt_ws_client::auth::Credentials;
use xt_ws_client::ws::{Config, ReconnectConfig};

pub const API_KEY: &str = "test-api-key";
pub const SECRET: &str = "test-secret";

/// How long to wait for a frame before declaring that none arrives.
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Mock XT stream: records client frames, answers `ping` with `pong`, broadcasts server frames
/// and can drop every open connection on demand.
pub struct MockWsServer {
    addr: SocketAddr,
    /// Broadcast messages to ALL connected clients
    message_tx: broadcast::Sender<String>,
    /// Tells every open connection to drop without a close handshake
    disconnect_tx: broadcast::Sender<()>,
    /// Text frames received from clients, except `ping`
    frame_rx: mpsc::UnboundedReceiver<String>,
    pings: Arc<AtomicUsize>,
    connections: Arc<AtomicUsize>,
}

impl MockWsServer {
    /// Start a mock WebSocket server on a random port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (message_tx, _) = broadcast::channel::<String>(100);
        let (disconnect_tx, _) = broadcast::channel::<()>(4);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<String>();
        let pings = Arc::new(AtomicUsize::new(0));
        let connections = Arc::new(AtomicUsize::new(0));

        let broadcast_tx = message_tx.clone();
        let kill_tx = disconnect_tx.clone();
        let ping_count = Arc::clone(&pings);
        let connection_count = Arc::clone(&connections);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                connection_count.fetch_add(1, Ordering::SeqCst);

                let (mut write, mut read) = ws_stream.split();
                let frame_tx = frame_tx.clone();
                let mut msg_rx = broadcast_tx.subscribe();
                let mut kill_rx = kill_tx.subscribe();
                let ping_count = Arc::clone(&ping_count);

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) if text == "ping" => {
                                        ping_count.fetch_add(1, Ordering::SeqCst);
                                        if write.send(Message::Text("pong".into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Some(Ok(Message::Text(text))) => {
                                        drop(frame_tx.send(text.to_string()));
                                    }
                                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                }
                            }
                            msg = msg_rx.recv() => {
                                match msg {
                                    Ok(text) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(_) => break,
                                }
                            }
                            _ = kill_rx.recv() => break,
                        }
                    }
                });
            }
        });

        Self {
            addr,
            message_tx,
            disconnect_tx,
            frame_rx,
            pings,
            connections,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Send a message to all connected clients.
    pub fn send(&self, message: &str) {
        drop(self.message_tx.send(message.to_owned()));
    }

    /// Drop every open connection; new connections are accepted as usual.
    pub fn disconnect_all(&self) {
        drop(self.disconnect_tx.send(()));
    }

    /// Receive the next non-heartbeat frame sent by a client.
    pub async fn recv_frame(&mut self) -> Option<String> {
        timeout(Duration::from_secs(2), self.frame_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Assert that no client frame arrives for [`QUIET_PERIOD`].
    pub async fn assert_quiet(&mut self) {
        let frame = timeout(QUIET_PERIOD, self.frame_rx.recv()).await.ok().flatten();
        assert!(frame.is_none(), "unexpected frame: {frame:?}");
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Session configuration pointing at `server` with fast retries.
pub fn config(server: &MockWsServer) -> Config {
    Config::builder()
        .endpoint(server.ws_url())
        .reconnect(
            ReconnectConfig::builder()
                .max_attempts(5)
                .backoff_step(Duration::from_millis(10))
                .build(),
        )
        .build()
}

pub fn credentials() -> Credentials {
    Credentials::new(API_KEY.to_owned(), SECRET.to_owned())
}
