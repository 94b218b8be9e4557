use bon::Builder;
use hmac::{Hmac, Mac as _};
/// Secret string types that redact values in debug output for security.
pub use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::value::{RawValue, Value};
use sha2::Sha512;
use strum_macros::Display;
use uuid::Uuid;

use crate::{Result, Timestamp};

/// Domain tag that prefixes every canonical message.
pub const API_DOMAIN: &str = "api";
/// Header key carrying the channel-routing id inside `req_header`.
pub const CHANNEL_ID_HEADER: &str = "X-Gate-Channel-Id";
/// Channel-routing id used when the caller does not provide one.
pub const DEFAULT_CHANNEL_ID: &str = "T_channel_id";

/// API key and secret used to sign authenticated command envelopes.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Credentials {
    #[serde(alias = "apiKey")]
    pub(crate) key: String,
    pub(crate) secret: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(key: String, secret: String) -> Self {
        Self {
            key,
            secret: SecretString::from(secret),
        }
    }

    /// Returns the API key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the secret.
    #[must_use]
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Whether the key or the secret is blank, making the credentials unusable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key.is_empty() || self.secret.expose_secret().is_empty()
    }
}

/// Progress of the one-time login handshake of a session.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoginState {
    #[default]
    NotAuthenticated,
    /// A caller won the right to log in and is writing the login envelope
    InFlight,
    Authenticated,
}

/// Caller overrides for an authenticated request.
#[non_exhaustive]
#[derive(Clone, Debug, Default, Builder)]
pub struct RequestOptions {
    /// Request id echoed back by the server. When absent a random uuid (simple form) is used
    /// instead of a fixed placeholder, so concurrent requests stay distinguishable
    #[builder(into)]
    pub req_id: Option<String>,
    /// Channel-routing id placed in `req_header`, `T_channel_id` when absent
    #[builder(into)]
    pub channel_id: Option<String>,
}

/// Signed wrapper around the parameters of an authenticated command.
#[non_exhaustive]
#[derive(Debug, Serialize)]
pub struct AuthEnvelope {
    pub api_key: String,
    pub signature: String,
    pub timestamp: String,
    pub req_id: String,
    pub req_header: Value,
    pub req_param: Box<RawValue>,
}

impl AuthEnvelope {
    /// Serializes `params`, signs them for `channel` at `timestamp` and bundles the result.
    ///
    /// The signed bytes and the `req_param` bytes on the wire are identical.
    pub fn new<P: Serialize + ?Sized>(
        credentials: &Credentials,
        channel: &str,
        params: &P,
        options: &RequestOptions,
        timestamp: Timestamp,
    ) -> Result<Self> {
        let req_param = serde_json::value::to_raw_value(params)?;
        let signature = sign(
            &credentials.secret,
            &to_message(channel, req_param.get(), timestamp),
        )?;

        let req_id = options
            .req_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let channel_id = options.channel_id.as_deref().unwrap_or(DEFAULT_CHANNEL_ID);

        Ok(Self {
            api_key: credentials.key.clone(),
            signature,
            timestamp: timestamp.to_string(),
            req_id,
            req_header: json!({ CHANNEL_ID_HEADER: channel_id }),
            req_param,
        })
    }
}

/// Builds the canonical message covered by the signature.
#[must_use]
pub fn to_message(channel: &str, params: &str, timestamp: Timestamp) -> String {
    format!("{API_DOMAIN}\n{channel}\n{params}\n{timestamp}")
}

/// Lowercase hex HMAC-SHA512 of `message` keyed by `secret`.
pub fn sign(secret: &SecretString, message: &str) -> Result<String> {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.expose_secret().as_bytes())?;
    mac.update(message.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const SECRET: &str = "secret";
    const TIMESTAMP: Timestamp = 1_700_000_000;

    fn credentials() -> Credentials {
        Credentials::new("api-key".to_owned(), SECRET.to_owned())
    }

    #[test]
    fn sign_matches_rfc4231_vector() -> Result<()> {
        let signature = sign(
            &SecretString::from("Jefe".to_owned()),
            "what do ya want for nothing?",
        )?;

        assert_eq!(
            signature,
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea2505549758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
        Ok(())
    }

    #[test]
    fn sign_is_deterministic_and_sensitive() -> Result<()> {
        let secret = SecretString::from(SECRET.to_owned());
        let message = to_message("spot.order_place", r#"{"symbol":"btc_usdt"}"#, TIMESTAMP);

        let first = sign(&secret, &message)?;
        let second = sign(&secret, &message)?;
        let altered = sign(&secret, &message.replace("btc", "eth"))?;

        assert_eq!(first, second);
        assert_ne!(first, altered);
        assert_eq!(first.len(), 128);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        Ok(())
    }

    #[test]
    fn to_message_is_newline_delimited() {
        assert_eq!(
            to_message("spot.login", "{}", 1),
            "api\nspot.login\n{}\n1"
        );
    }

    #[test]
    fn envelope_should_succeed() -> Result<()> {
        let options = RequestOptions::builder()
            .req_id("req-1")
            .channel_id("my-channel")
            .build();
        let envelope = AuthEnvelope::new(
            &credentials(),
            "spot.order_place",
            &json!({ "symbol": "btc_usdt" }),
            &options,
            TIMESTAMP,
        )?;

        assert_eq!(envelope.api_key, "api-key");
        assert_eq!(envelope.timestamp, "1700000000");
        assert_eq!(envelope.req_id, "req-1");
        assert_eq!(
            envelope.signature,
            "f2c1467ea9a908d85b762d89f6627c7a01958f56268ca75d29bd1d00c0a72ae0d09cf8540f5414399616c0943cd7bb1c3c89f321ec4809b43f7236fecfd988a1"
        );

        let value = serde_json::to_value(&envelope)?;
        assert_eq!(value["req_header"], json!({ "X-Gate-Channel-Id": "my-channel" }));
        assert_eq!(value["req_param"], json!({ "symbol": "btc_usdt" }));
        Ok(())
    }

    #[test]
    fn envelope_defaults_request_and_channel_ids() -> Result<()> {
        let envelope = AuthEnvelope::new(
            &credentials(),
            "spot.login",
            &json!({}),
            &RequestOptions::default(),
            TIMESTAMP,
        )?;

        assert_eq!(envelope.req_id.len(), 32);
        assert_eq!(envelope.req_header, json!({ "X-Gate-Channel-Id": "T_channel_id" }));
        assert_eq!(
            envelope.signature,
            "03cd3c385a7f3b5002acb584da5556d0b47b19b8430534b567283f5f56d6016f341e3bd9aa8565c8fdd81c0d5c76afe725c4ca712083f9823069d0f5ccf69226"
        );
        Ok(())
    }

    #[test]
    fn empty_credentials_are_detected() {
        assert!(Credentials::default().is_empty());
        assert!(Credentials::new("key".to_owned(), String::new()).is_empty());
        assert!(!credentials().is_empty());
    }

    #[test]
    fn debug_does_not_expose_secrets() {
        let secret_value = "my_super_secret_value_12345";
        let credentials = Credentials::new("key".to_owned(), secret_value.to_owned());

        let debug_output = format!("{credentials:?}");

        assert!(
            !debug_output.contains(secret_value),
            "Debug output should NOT contain the secret value. Got: {debug_output}"
        );
    }
}
