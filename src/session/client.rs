use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::heartbeat;
use super::reader;
use super::registry::{SubscriptionEntry, SubscriptionRegistry};
use super::router::CallbackRouter;
use super::types::request::{Command, Request, SubscribeOptions};
use crate::auth::{AuthEnvelope, Credentials, LoginState, RequestOptions};
use crate::error::{Error, Synchronization};
use crate::ws::{Config, ConnectionManager, ConnectionState, Reconnect, WsError};
use crate::{Result, topic};

/// Handle to a persistent streaming session.
///
/// Cloning is cheap and every clone drives the same socket. The reader and heartbeat tasks stop
/// when the session's cancellation token is cancelled, when [`Session::shutdown`] is called, or
/// once the last handle is dropped.
///
/// Subscriptions survive reconnects: every topic whose latest command is a subscribe is
/// re-issued on the new socket before the session reports [`ConnectionState::Connected`] again.
#[derive(Clone)]
pub struct Session {
    pub(super) inner: Arc<SessionInner>,
}

pub(super) struct SessionInner {
    pub(super) connection: ConnectionManager,
    pub(super) registry: SubscriptionRegistry,
    pub(super) router: CallbackRouter,
    pub(super) config: Config,
    credentials: RwLock<Option<Credentials>>,
    login_tx: watch::Sender<LoginState>,
    pub(super) reader_started: AtomicBool,
    pub(super) cancel: CancellationToken,
    _shutdown_on_drop: DroppingCancellationToken,
}

/// Cancels the session's tasks once the last [`Session`] handle is gone.
struct DroppingCancellationToken(CancellationToken);

impl Drop for DroppingCancellationToken {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("endpoint", &self.inner.connection.endpoint())
            .field("state", &self.inner.connection.state())
            .field("login_state", &self.login_state())
            .field("subscriptions", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Dial `config.endpoint` and start the reader and heartbeat tasks.
    ///
    /// Blocks until the first dial succeeds or the retry budget is exhausted. Cancelling
    /// `cancel` shuts the session down.
    pub async fn connect(config: Config, cancel: CancellationToken) -> Result<Self> {
        let cancel = cancel.child_token();
        let connection = ConnectionManager::connect(config.clone(), cancel.clone()).await?;
        let (login_tx, _) = watch::channel(LoginState::default());

        let session = Self {
            inner: Arc::new(SessionInner {
                connection,
                registry: SubscriptionRegistry::new(),
                router: CallbackRouter::new(),
                credentials: RwLock::new(config.credentials.clone()),
                config,
                login_tx,
                reader_started: AtomicBool::new(false),
                _shutdown_on_drop: DroppingCancellationToken(cancel.clone()),
                cancel,
            }),
        };

        session.ensure_reader();
        heartbeat::spawn(&session.inner);

        Ok(session)
    }

    /// Subscribe to `topics`, e.g. `["ticker@btc_usdt"]`.
    ///
    /// Auth-required topics log the session in first and fail with
    /// [`crate::error::Kind::Authentication`] before any frame is written when no credentials
    /// are configured. Returns once the frame is written.
    pub async fn subscribe(&self, topics: &[String]) -> Result<()> {
        self.subscribe_with_options(topics, None).await
    }

    /// [`Session::subscribe`] with a caller chosen frame id.
    pub async fn subscribe_with_options(
        &self,
        topics: &[String],
        options: Option<SubscribeOptions>,
    ) -> Result<()> {
        validate(topics)?;
        self.ensure_reader();

        if let Some(private) = topics.iter().find(|topic| topic::requires_auth(topic)) {
            let credentials = self.inner.credentials_for(private)?;
            self.inner.ensure_login(&credentials).await?;
        }

        self.inner
            .send_command(Command::Subscribe, topics, options.as_ref())
            .await
    }

    pub async fn unsubscribe(&self, topics: &[String]) -> Result<()> {
        validate(topics)?;
        self.ensure_reader();

        self.inner
            .send_command(Command::Unsubscribe, topics, None)
            .await
    }

    /// Subscribe to the 24h ticker of every symbol and return the subscribed topics.
    pub async fn subscribe_ticker<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Vec<String>> {
        let topics: Vec<String> = symbols
            .iter()
            .map(|symbol| topic::ticker(symbol.as_ref()))
            .collect();

        self.subscribe(&topics).await?;
        Ok(topics)
    }

    /// Subscribe to `level` levels of the order book of every symbol and return the subscribed
    /// topics.
    pub async fn subscribe_depth<S: AsRef<str>>(
        &self,
        symbols: &[S],
        level: u32,
    ) -> Result<Vec<String>> {
        let topics: Vec<String> = symbols
            .iter()
            .map(|symbol| topic::depth(symbol.as_ref(), level))
            .collect();

        self.subscribe(&topics).await?;
        Ok(topics)
    }

    /// Route frames whose `topic` field equals `topic` to `callback`, replacing any previous
    /// handler for it.
    ///
    /// The callback runs on the reader task; a slow callback delays every other topic.
    pub fn set_callback<S, F>(&self, topic: S, callback: F)
    where
        S: Into<String>,
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.inner.router.set_callback(topic, callback);
    }

    pub fn remove_callback(&self, topic: &str) -> bool {
        self.inner.router.remove_callback(topic)
    }

    /// Sign `params` for `channel` and write the envelope, logging the session in first.
    ///
    /// Returns the `req_id` of the envelope so the caller can match the response; the session
    /// does not correlate responses itself.
    pub async fn api_request<P: Serialize + ?Sized>(
        &self,
        channel: &str,
        params: &P,
        options: &RequestOptions,
    ) -> Result<String> {
        if channel.is_empty() {
            return Err(Error::validation("channel cannot be empty"));
        }

        let credentials = self.inner.credentials_for(channel)?;
        self.ensure_reader();
        self.inner.ensure_login(&credentials).await?;

        self.inner
            .send_envelope(&credentials, channel, params, options)
            .await
    }

    /// Force a reconnect of the current socket, replaying subscriptions on the new one.
    pub async fn reconnect(&self) -> Result<Reconnect> {
        let generation = self.inner.connection.generation().await;
        let outcome = self.inner.reconnect_from(generation).await?;
        self.ensure_reader();

        Ok(outcome)
    }

    /// Stop the reader and heartbeat tasks and close the socket.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.connection.close().await;
    }

    /// Replace the credentials used by later subscriptions and signed requests.
    pub fn set_credentials(&self, credentials: Credentials) {
        *self
            .inner
            .credentials
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(credentials);
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state_receiver()
    }

    #[must_use]
    pub fn login_state(&self) -> LoginState {
        *self.inner.login_tx.borrow()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Topics with a registered callback.
    #[must_use]
    pub fn callback_topics(&self) -> Vec<String> {
        self.inner.router.topics()
    }

    /// Topics that would be restored by a reconnect.
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.inner.registry.subscribed_topics()
    }

    /// Every subscribe and unsubscribe recorded for `topic`, oldest first.
    #[must_use]
    pub fn history(&self, topic: &str) -> Vec<SubscriptionEntry> {
        self.inner.registry.history(topic)
    }

    fn ensure_reader(&self) {
        if !self.inner.reader_started.swap(true, Ordering::AcqRel) {
            reader::spawn(&self.inner);
        }
    }
}

impl SessionInner {
    /// Redial if `generation` is still the current socket, then re-issue the recorded
    /// subscriptions.
    ///
    /// The replay plan is read after the new socket is installed. A subscribe issued by a caller
    /// in that window is recorded before the plan is taken and goes out a second time as part of
    /// the replay; duplicate subscribes are idempotent on the server.
    pub(super) async fn reconnect_from(&self, generation: u64) -> Result<Reconnect> {
        self.connection
            .reconnect(generation, || self.replay())
            .await
    }

    async fn replay(&self) {
        for entry in self.registry.replay_plan() {
            let topics = [entry.topic];

            match self
                .send_command(entry.command, &topics, entry.options.as_ref())
                .await
            {
                Ok(()) => {
                    if self.config.show_reconnect_msg {
                        tracing::info!(topic = %topics[0], "resubscribed after reconnect");
                    }
                }
                Err(e) => {
                    let [topic] = topics;
                    let error = WsError::ReplayFailed { topic };
                    tracing::warn!(%error, cause = %e, "replay entry failed");
                }
            }
        }
    }

    /// Write one control frame and record it once it is on the wire.
    async fn send_command(
        &self,
        command: Command,
        topics: &[String],
        options: Option<&SubscribeOptions>,
    ) -> Result<()> {
        let frame = serde_json::to_string(&Request::new(command, topics, options))?;

        self.connection.write_text(frame).await?;
        self.registry.record(topics, command, options);

        Ok(())
    }

    async fn send_envelope<P: Serialize + ?Sized>(
        &self,
        credentials: &Credentials,
        channel: &str,
        params: &P,
        options: &RequestOptions,
    ) -> Result<String> {
        let envelope = AuthEnvelope::new(credentials, channel, params, options, crate::now())?;
        let frame = serde_json::to_string(&envelope)?;

        tracing::debug!(%channel, req_id = %envelope.req_id, "sending signed request");
        self.connection.write_text(frame).await?;

        Ok(envelope.req_id)
    }

    /// Usable credentials, or an authentication error naming `topic`.
    fn credentials_for(&self, topic: &str) -> Result<Credentials> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|credentials| !credentials.is_empty())
            .cloned()
            .ok_or_else(|| Error::authentication_missing(topic))
    }

    /// Log in at most once per session. Concurrent callers wait for the one that claimed the
    /// login; if that login fails the next caller tries again.
    async fn ensure_login(&self, credentials: &Credentials) -> Result<()> {
        let mut login_rx = self.login_tx.subscribe();

        loop {
            let claimed = self.login_tx.send_if_modified(|state| {
                if *state != LoginState::NotAuthenticated {
                    return false;
                }
                *state = LoginState::InFlight;
                true
            });

            if claimed {
                let channel = topic::login(self.config.app);
                let result = self
                    .send_envelope(credentials, channel, &json!({}), &RequestOptions::default())
                    .await;

                return match result {
                    Ok(_) => {
                        self.login_tx.send_replace(LoginState::Authenticated);
                        tracing::info!(%channel, "logged in");
                        Ok(())
                    }
                    Err(e) => {
                        self.login_tx.send_replace(LoginState::NotAuthenticated);
                        Err(e)
                    }
                };
            }

            let state = *login_rx
                .wait_for(|state| *state != LoginState::InFlight)
                .await
                .map_err(|_recv| Synchronization)?;

            if state == LoginState::Authenticated {
                return Ok(());
            }
        }
    }
}

fn validate(topics: &[String]) -> Result<()> {
    if topics.is_empty() {
        return Err(Error::validation("topics cannot be empty"));
    }
    if topics.iter().any(String::is_empty) {
        return Err(Error::validation("topic cannot be empty"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[test]
    fn validate_rejects_empty_input() {
        assert_eq!(validate(&[]).unwrap_err().kind(), Kind::Validation);
        assert_eq!(
            validate(&["ticker@btc_usdt".to_owned(), String::new()])
                .unwrap_err()
                .kind(),
            Kind::Validation
        );
        assert!(validate(&["ticker@btc_usdt".to_owned()]).is_ok(), "one topic is valid");
    }
}
