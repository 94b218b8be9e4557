#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

/// WebSocket error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Dialing gave up after exhausting the configured retry budget
    ConnectFailed {
        /// Number of retries performed before giving up
        attempts: u32,
        /// Error returned by the last dial attempt
        source: tokio_tungstenite::tungstenite::Error,
    },
    /// Writing a frame to the socket failed
    WriteFailed(tokio_tungstenite::tungstenite::Error),
    /// Re-issuing a recorded command after reconnect failed
    ReplayFailed {
        /// Topic whose command could not be replayed
        topic: String,
    },
    /// The session was shut down, so nothing more can be written
    ConnectionClosed,
    /// The session was cancelled while the operation was pending
    Cancelled,
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed { attempts, source } => {
                write!(f, "max reconnect time {attempts} reached, giving up: {source}")
            }
            Self::WriteFailed(e) => write!(f, "Failed to write WebSocket frame: {e}"),
            Self::ReplayFailed { topic } => write!(f, "Failed to replay topic `{topic}`"),
            Self::ConnectionClosed => write!(f, "WebSocket connection closed by shutdown"),
            Self::Cancelled => write!(f, "WebSocket session cancelled"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::WriteFailed(e) | Self::ConnectFailed { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

// Integration with main Error type
impl From<WsError> for crate::error::Error {
    fn from(e: WsError) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, e)
    }
}
