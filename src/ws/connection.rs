#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use backoff::backoff::Backoff as _;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use strum_macros::Display;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream, connect_async_tls_with_config,
};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::{Config, LinearBackoff};
use super::error::WsError;
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the best-effort close handshake of a replaced socket.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    /// Not connected, either shut down or out of dial retries
    Disconnected,
    /// Successfully connected
    Connected {
        /// When the current socket was established
        since: Instant,
    },
    /// Redialing after a failure
    Reconnecting {
        /// Retries performed so far in this reconnect episode
        attempt: u32,
    },
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    #[must_use]
    pub const fn is_reconnecting(self) -> bool {
        matches!(self, Self::Reconnecting { .. })
    }
}

/// Outcome of [`ConnectionManager::reconnect`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnect {
    /// This caller redialed, swapped the socket and ran the replay
    Completed,
    /// Another caller is already reconnecting
    InProgress,
    /// The failed socket had already been replaced
    Stale,
}

/// One dialed WebSocket, split into halves that are locked independently.
///
/// The sink mutex is the exclusive write lock: every frame goes out whole before the next
/// writer gets the sink.
pub(crate) struct Socket {
    generation: u64,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Socket {
    fn new(generation: u64, ws_stream: WsStream) -> Self {
        let (sink, stream) = ws_stream.split();
        Self {
            generation,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) async fn send(&self, message: Message) -> Result<()> {
        let mut sink = self.sink.lock().await;
        sink.send(message).await.map_err(WsError::WriteFailed)?;
        Ok(())
    }

    /// Next inbound message, `None` once the peer is gone.
    pub(crate) async fn next(&self) -> Option<std::result::Result<Message, tungstenite::Error>> {
        let mut stream = self.stream.lock().await;
        stream.next().await
    }

    /// Best-effort close; errors and slow peers are ignored.
    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        _ = timeout(CLOSE_TIMEOUT, sink.close()).await;
    }
}

/// Owns the single live socket of a session and its dial/redial state machine.
///
/// The socket is replaced wholesale on reconnect under the swap lock, so readers and writers
/// always act on a complete handle. Writes are serialized per socket.
pub struct ConnectionManager {
    config: Config,
    /// Custom TLS configuration, set when certificate verification is skipped
    tls: Option<Arc<rustls::ClientConfig>>,
    /// Swap lock around the current socket
    socket: RwLock<Arc<Socket>>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Dial `config.endpoint`, retrying with linear backoff until connected or out of retries.
    pub async fn connect(config: Config, cancel: CancellationToken) -> Result<Self> {
        Url::parse(&config.endpoint)?;

        let tls = config
            .skip_tls_verify
            .then(insecure_tls)
            .transpose()?
            .map(Arc::new);

        let ws_stream = dial(&config, tls.as_ref(), &cancel, |_| {}).await?;
        tracing::info!(endpoint = %config.endpoint, "connected");

        let (state_tx, _) = watch::channel(ConnectionState::Connected {
            since: Instant::now(),
        });

        Ok(Self {
            config,
            tls,
            socket: RwLock::new(Arc::new(Socket::new(0, ws_stream))),
            state_tx,
            cancel,
        })
    }

    /// The socket current at the time of the call.
    pub(crate) async fn current(&self) -> Arc<Socket> {
        Arc::clone(&*self.socket.read().await)
    }

    /// Generation of the current socket; starts at zero and grows by one per reconnect.
    pub async fn generation(&self) -> u64 {
        self.current().await.generation
    }

    /// Write one text frame to the current socket.
    ///
    /// Fails with [`WsError::ConnectionClosed`] once the manager is cancelled.
    pub async fn write_text(&self, frame: String) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(WsError::ConnectionClosed.into());
        }
        tracing::trace!(%frame, "Sending WebSocket text message");
        self.current().await.send(Message::Text(frame.into())).await
    }

    /// Replace the socket of generation `stale` with a freshly dialed one.
    ///
    /// Only the first caller for a given failure redials; concurrent callers get
    /// [`Reconnect::InProgress`] and callers holding an already replaced socket get
    /// [`Reconnect::Stale`]. `replay` runs against the new socket before the state flips back to
    /// [`ConnectionState::Connected`]. Exhausting the retry budget leaves the manager
    /// [`ConnectionState::Disconnected`].
    pub async fn reconnect<F, Fut>(&self, stale: u64, replay: F) -> Result<Reconnect>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        if self.cancel.is_cancelled() {
            return Err(WsError::Cancelled.into());
        }

        let current = self.current().await;
        if current.generation != stale {
            return Ok(Reconnect::Stale);
        }

        let mut previous = None;
        let claimed = self.state_tx.send_if_modified(|state| {
            if state.is_reconnecting() {
                return false;
            }
            previous = Some(*state);
            *state = ConnectionState::Reconnecting { attempt: 0 };
            true
        });
        if !claimed {
            return Ok(Reconnect::InProgress);
        }

        // Another caller may have finished a reconnect between the generation check and the claim
        if self.current().await.generation != stale {
            if let Some(previous) = previous {
                self.state_tx.send_replace(previous);
            }
            return Ok(Reconnect::Stale);
        }

        current.close().await;

        let ws_stream = match dial(
            &self.config,
            self.tls.as_ref(),
            &self.cancel,
            |attempt| {
                self.state_tx
                    .send_replace(ConnectionState::Reconnecting { attempt });
            },
        )
        .await
        {
            Ok(ws_stream) => ws_stream,
            Err(e) => {
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        {
            let mut slot = self.socket.write().await;
            let generation = slot.generation.wrapping_add(1);
            *slot = Arc::new(Socket::new(generation, ws_stream));
        }

        replay().await;

        self.state_tx.send_replace(ConnectionState::Connected {
            since: Instant::now(),
        });

        Ok(Reconnect::Completed)
    }

    /// Close the current socket and mark the manager disconnected.
    pub async fn close(&self) {
        self.state_tx.send_replace(ConnectionState::Disconnected);
        self.current().await.close().await;
    }

    /// Wait until no reconnect is running and return the resulting state.
    pub async fn settled(&self) -> ConnectionState {
        let mut state_rx = self.state_tx.subscribe();
        match state_rx.wait_for(|state| !state.is_reconnecting()).await {
            Ok(state) => *state,
            Err(_) => ConnectionState::Disconnected,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

/// Dial loop shared by the first connection and every reconnect episode.
///
/// The n-th retry sleeps `n * backoff_step`; the counter restarts with every call.
async fn dial<F>(
    config: &Config,
    tls: Option<&Arc<rustls::ClientConfig>>,
    cancel: &CancellationToken,
    mut on_retry: F,
) -> Result<WsStream>
where
    F: FnMut(u32),
{
    let mut backoff: LinearBackoff = config.reconnect.clone().into();

    loop {
        let attempt = connect_async_tls_with_config(
            config.endpoint.as_str(),
            None,
            false,
            tls.map(|tls| Connector::Rustls(Arc::clone(tls))),
        );
        // A peer that never finishes the handshake must not outlive the session
        let outcome = tokio::select! {
            () = cancel.cancelled() => return Err(WsError::Cancelled.into()),
            outcome = attempt => outcome,
        };

        match outcome {
            Ok((ws_stream, _)) => {
                if backoff.attempts() > 0 {
                    tracing::info!(
                        attempts = backoff.attempts(),
                        "reconnect succeeded after retrying"
                    );
                }
                return Ok(ws_stream);
            }
            Err(e) => {
                let Some(delay) = backoff.next_backoff() else {
                    tracing::error!(
                        attempts = backoff.attempts(),
                        "max reconnect time reached, giving up"
                    );
                    return Err(WsError::ConnectFailed {
                        attempts: backoff.attempts(),
                        source: e,
                    }
                    .into());
                };

                tracing::warn!(
                    endpoint = %config.endpoint,
                    attempt = backoff.attempts(),
                    error = %e,
                    "failed to connect, retrying in {delay:?}"
                );
                on_retry(backoff.attempts());

                tokio::select! {
                    () = cancel.cancelled() => return Err(WsError::Cancelled.into()),
                    () = sleep(delay) => {}
                }
            }
        }
    }
}

/// TLS configuration that accepts any server certificate.
fn insecure_tls() -> Result<rustls::ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    Ok(
        rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
            .with_no_client_auth(),
    )
}

#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
