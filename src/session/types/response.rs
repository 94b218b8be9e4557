//! Payload shapes of inbound frames.
//!
//! The session itself only looks at the `topic` field of a frame. These types are for callbacks
//! that want a typed view of the bytes they receive, e.g.
//! `serde_json::from_slice::<Event<Ticker>>(bytes)`.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

/// Pushed market or account update.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize)]
pub struct Event<T> {
    /// Channel name the update belongs to, e.g. `ticker`
    pub topic: String,
    /// Subscribed topic that produced the update, e.g. `ticker@btc_usdt`
    #[serde(default)]
    pub event: String,
    pub data: T,
}

/// 24h rolling ticker of one symbol.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize)]
pub struct Ticker {
    #[serde(rename = "s")]
    pub symbol: String,
    /// Time of the last trade in Unix milliseconds
    #[serde(rename = "t")]
    pub time: i64,
    /// 24h price change
    #[serde(rename = "cv")]
    pub price_change: Decimal,
    /// 24h price change, in percent
    #[serde(rename = "cr")]
    pub change_rate: Decimal,
    #[serde(rename = "o")]
    pub open: Decimal,
    #[serde(rename = "c")]
    pub close: Decimal,
    #[serde(rename = "h")]
    pub high: Decimal,
    #[serde(rename = "l")]
    pub low: Decimal,
    /// Traded quantity
    #[serde(rename = "q")]
    pub quantity: Decimal,
    /// Traded value
    #[serde(rename = "v")]
    pub volume: Decimal,
}

/// Order book snapshot limited to the subscribed number of levels.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize)]
pub struct Depth {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "i")]
    pub update_id: i64,
    #[serde(rename = "t")]
    pub time: i64,
    /// `[price, quantity]` pairs, best first
    #[serde(rename = "a", default)]
    pub asks: Vec<[Decimal; 2]>,
    #[serde(rename = "b", default)]
    pub bids: Vec<[Decimal; 2]>,
}

/// Acknowledgement of a subscribe or unsubscribe frame.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize)]
pub struct CommandResponse {
    #[serde(default)]
    pub id: String,
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub method: String,
}

impl CommandResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// Reply to an authenticated request, correlated by `req_id`.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub client_id: String,
    pub req_id: String,
    #[serde(default)]
    pub resp_time_ms: i64,
    pub status: i64,
    #[serde(default)]
    pub req_header: ApiResponseHeader,
    #[serde(default)]
    pub data: ApiResponseData,
}

#[non_exhaustive]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponseHeader {
    #[serde(rename = "x-gate-channel-id", default)]
    pub channel_id: String,
}

#[non_exhaustive]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponseData {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl ApiResponse {
    /// Whether the server accepted the request and returned no error object.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == 200 && self.data.error.as_ref().is_none_or(Value::is_null)
    }
}
