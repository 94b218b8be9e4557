use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;

use crate::topic;

/// Handler for the raw bytes of inbound frames of one topic.
pub type Callback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// What happened to an inbound frame.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Delivered to the handler of its topic
    Delivered,
    /// Heartbeat acknowledgement, dropped undecoded
    Pong,
    /// Decoded, but nobody listens to the topic
    Unhandled,
    /// Valid JSON without a usable `topic`
    NoTopic,
    /// Not a JSON object
    Malformed,
}

#[derive(Deserialize)]
struct TopicFrame<'frame> {
    #[serde(borrow, default)]
    topic: Option<Cow<'frame, str>>,
}

/// Topic keyed table of handlers. Registering a topic again replaces its handler.
#[derive(Default)]
pub struct CallbackRouter {
    callbacks: DashMap<String, Callback>,
}

impl fmt::Debug for CallbackRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRouter")
            .field("topics", &self.topics())
            .finish()
    }
}

impl CallbackRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_callback<S, F>(&self, topic: S, callback: F)
    where
        S: Into<String>,
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.callbacks.insert(topic.into(), Arc::new(callback));
    }

    /// Returns whether a handler was registered for `topic`.
    pub fn remove_callback(&self, topic: &str) -> bool {
        self.callbacks.remove(topic).is_some()
    }

    /// Topics with a registered handler, sorted.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .callbacks
            .iter()
            .map(|callback| callback.key().clone())
            .collect();
        topics.sort();
        topics
    }

    /// Route one inbound frame to the handler of its `topic`.
    ///
    /// The handler runs on the calling task, outside of any lock of the table.
    pub fn dispatch(&self, payload: &[u8]) -> Dispatch {
        if payload == topic::PONG.as_bytes() {
            return Dispatch::Pong;
        }

        let Ok(frame) = serde_json::from_slice::<TopicFrame<'_>>(payload) else {
            tracing::trace!(len = payload.len(), "dropping undecodable frame");
            return Dispatch::Malformed;
        };

        let Some(topic) = frame.topic.filter(|topic| !topic.is_empty()) else {
            tracing::warn!(
                frame = %String::from_utf8_lossy(payload),
                "received event without topic"
            );
            return Dispatch::NoTopic;
        };

        let Some(callback) = self
            .callbacks
            .get(topic.as_ref())
            .map(|callback| Arc::clone(callback.value()))
        else {
            tracing::trace!(%topic, "no callback registered");
            return Dispatch::Unhandled;
        };

        callback(payload);
        Dispatch::Delivered
    }
}
