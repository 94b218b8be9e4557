use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::client::SessionInner;
use crate::ws::Reconnect;

/// Start the single reader task of a session.
pub(super) fn spawn(inner: &Arc<SessionInner>) {
    let session = Arc::downgrade(inner);
    let cancel = inner.cancel.clone();

    tokio::spawn(async move {
        read_loop(&session, &cancel).await;
        tracing::info!("closing reader");

        let Some(inner) = session.upgrade() else {
            return;
        };
        if cancel.is_cancelled() {
            inner.connection.close().await;
        } else {
            // Lets the next subscribe or reconnect start a fresh reader
            inner.reader_started.store(false, Ordering::Release);
        }
    });
}

/// Read from whichever socket is current, routing frames until cancelled or until the socket
/// cannot be restored.
async fn read_loop(session: &Weak<SessionInner>, cancel: &CancellationToken) {
    loop {
        let Some(inner) = session.upgrade() else {
            return;
        };
        let socket = inner.connection.current().await;
        drop(inner);

        let message = tokio::select! {
            () = cancel.cancelled() => return,
            message = socket.next() => message,
        };

        let Some(inner) = session.upgrade() else {
            return;
        };

        let recovered = match message {
            Some(Ok(Message::Text(text))) => {
                tracing::trace!(%text, "Received WebSocket text message");
                inner.router.dispatch(text.as_bytes());
                true
            }
            Some(Ok(Message::Binary(bytes))) => {
                inner.router.dispatch(&bytes);
                true
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "WebSocket closed by server");
                recover(&inner, socket.generation(), cancel).await
            }
            // Protocol level ping/pong is answered by tungstenite
            Some(Ok(_)) => true,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "websocket read failed");
                recover(&inner, socket.generation(), cancel).await
            }
            None => {
                tracing::warn!("websocket stream ended");
                recover(&inner, socket.generation(), cancel).await
            }
        };

        if !recovered {
            return;
        }
    }
}

/// Restore the connection after the socket of `generation` failed. Returns whether reading can
/// continue.
async fn recover(inner: &SessionInner, generation: u64, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }

    match inner.reconnect_from(generation).await {
        Ok(Reconnect::Completed) => {
            tracing::info!("reconnect success, continue reading");
            true
        }
        Ok(Reconnect::Stale) => true,
        Ok(Reconnect::InProgress) => {
            tokio::select! {
                () = cancel.cancelled() => false,
                state = inner.connection.settled() => {
                    if !state.is_connected() {
                        tracing::error!(%state, "concurrent reconnect failed, reader exiting");
                    }
                    state.is_connected()
                }
            }
        }
        Err(e) => {
            if !cancel.is_cancelled() {
                tracing::error!(error = %e, "reconnect failed, reader exiting");
            }
            false
        }
    }
}
