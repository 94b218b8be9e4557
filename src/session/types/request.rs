use bon::Builder;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::topic;

/// Kind of control command sent for a topic.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Command {
    Subscribe,
    Unsubscribe,
}

impl Command {
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::Subscribe => topic::SUBSCRIBE,
            Self::Unsubscribe => topic::UNSUBSCRIBE,
        }
    }
}

/// Per-call options of a subscribe.
#[non_exhaustive]
#[derive(Clone, Debug, Default, PartialEq, Eq, Builder)]
pub struct SubscribeOptions {
    /// Caller chosen id placed in the control frame
    #[builder(into)]
    pub id: Option<String>,
    /// Set on commands re-issued after a reconnect
    #[builder(default)]
    pub is_replay: bool,
}

impl SubscribeOptions {
    /// Copy of these options marked as a replay.
    #[must_use]
    pub fn replayed(&self) -> Self {
        Self {
            id: self.id.clone(),
            is_replay: true,
        }
    }
}

/// Control frame: `{"id"?, "method", "params"}`.
#[non_exhaustive]
#[derive(Clone, Debug, Serialize)]
pub struct Request<'req> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'req str>,
    pub method: Command,
    pub params: &'req [String],
}

impl<'req> Request<'req> {
    #[must_use]
    pub fn new(
        command: Command,
        topics: &'req [String],
        options: Option<&'req SubscribeOptions>,
    ) -> Self {
        Self {
            id: options.and_then(|options| options.id.as_deref()),
            method: command,
            params: topics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_absent_id() -> crate::Result<()> {
        let topics = vec!["ticker@btc_usdt".to_owned()];
        let frame = serde_json::to_string(&Request::new(Command::Subscribe, &topics, None))?;

        assert_eq!(frame, r#"{"method":"subscribe","params":["ticker@btc_usdt"]}"#);
        Ok(())
    }

    #[test]
    fn request_carries_custom_id() -> crate::Result<()> {
        let topics = vec!["depth@btc_usdt,5".to_owned(), "trade@btc_usdt".to_owned()];
        let options = SubscribeOptions::builder().id("sub-7").build();
        let frame = serde_json::to_string(&Request::new(
            Command::Unsubscribe,
            &topics,
            Some(&options),
        ))?;

        assert_eq!(
            frame,
            r#"{"id":"sub-7","method":"unsubscribe","params":["depth@btc_usdt,5","trade@btc_usdt"]}"#
        );
        Ok(())
    }

    #[test]
    fn replayed_keeps_id() {
        let options = SubscribeOptions::builder().id("a").build();
        let replayed = options.replayed();

        assert!(replayed.is_replay);
        assert_eq!(replayed.id.as_deref(), Some("a"));
        assert!(!options.is_replay);
    }
}
