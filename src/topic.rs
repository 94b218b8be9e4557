//! Topic names understood by the XT stream and helpers to build per-symbol topics.
//!
//! A subscribed topic is a channel name optionally followed by `@` and channel arguments,
//! e.g. `ticker@btc_usdt` or `depth@btc_usdt,5`. Inbound events carry the bare channel name
//! in their `topic` field, which is what callbacks are registered against.

use phf::phf_set;

use crate::ws::config::App;

pub const SUBSCRIBE: &str = "subscribe";
pub const UNSUBSCRIBE: &str = "unsubscribe";

/// Outbound liveness frame.
pub const PING: &str = "ping";
/// Inbound liveness acknowledgement.
pub const PONG: &str = "pong";

// spot channels
pub const SPOT_DEPTH: &str = "depth";
pub const SPOT_DEPTH_UPDATE: &str = "depth_update";
pub const SPOT_TICKER: &str = "ticker";
pub const SPOT_TICKERS: &str = "tickers";
pub const SPOT_TRADE: &str = "trade";
pub const SPOT_KLINE: &str = "kline";
pub const SPOT_BALANCE: &str = "balance";
pub const SPOT_ORDER: &str = "order";

pub const SPOT_LOGIN: &str = "spot.login";
pub const SPOT_ORDER_AMEND: &str = "spot.order_amend";
pub const SPOT_ORDER_CANCEL: &str = "spot.order_cancel";
pub const SPOT_ORDER_CANCEL_CP: &str = "spot.order_cancel_cp";
pub const SPOT_ORDER_CANCEL_IDS: &str = "spot.order_cancel_ids";
pub const SPOT_ORDER_PLACE: &str = "spot.order_place";
pub const SPOT_ORDER_STATUS: &str = "spot.order_status";

// futures channels
pub const FUTURES_TICKERS: &str = "futures.tickers";
pub const FUTURES_TRADES: &str = "futures.trades";
pub const FUTURES_ORDER_BOOK: &str = "futures.order_book";
pub const FUTURES_BOOK_TICKER: &str = "futures.book_ticker";
pub const FUTURES_ORDER_BOOK_UPDATE: &str = "futures.order_book_update";
pub const FUTURES_CANDLESTICKS: &str = "futures.candlesticks";
pub const FUTURES_ORDERS: &str = "futures.orders";
pub const FUTURES_USER_TRADES: &str = "futures.usertrades";
pub const FUTURES_LIQUIDATES: &str = "futures.liquidates";
pub const FUTURES_AUTO_DELEVERAGES: &str = "futures.auto_deleverages";
pub const FUTURES_POSITION_CLOSES: &str = "futures.position_closes";
pub const FUTURES_BALANCES: &str = "futures.balances";
pub const FUTURES_REDUCE_RISK_LIMITS: &str = "futures.reduce_risk_limits";
pub const FUTURES_POSITIONS: &str = "futures.positions";
pub const FUTURES_AUTO_ORDERS: &str = "futures.autoorders";

pub const FUTURES_LOGIN: &str = "futures.login";
pub const FUTURES_ORDER_AMEND: &str = "futures.order_amend";
pub const FUTURES_ORDER_CANCEL: &str = "futures.order_cancel";
pub const FUTURES_ORDER_CANCEL_CP: &str = "futures.order_cancel_cp";
pub const FUTURES_ORDER_PLACE: &str = "futures.order_place";
pub const FUTURES_ORDER_BATCH_PLACE: &str = "futures.order_batch_place";
pub const FUTURES_ORDER_STATUS: &str = "futures.order_status";
pub const FUTURES_ORDER_LIST: &str = "futures.order_list";

/// Channels that need an API key and secret, both for subscriptions and signed requests.
static AUTH_CHANNELS: phf::Set<&'static str> = phf_set! {
    "balance",
    "order",
    "spot.login",
    "spot.order_amend",
    "spot.order_cancel",
    "spot.order_cancel_cp",
    "spot.order_cancel_ids",
    "spot.order_place",
    "spot.order_status",
    "futures.orders",
    "futures.usertrades",
    "futures.liquidates",
    "futures.auto_deleverages",
    "futures.position_closes",
    "futures.balances",
    "futures.reduce_risk_limits",
    "futures.positions",
    "futures.autoorders",
    "futures.login",
    "futures.order_amend",
    "futures.order_cancel",
    "futures.order_cancel_cp",
    "futures.order_place",
    "futures.order_batch_place",
    "futures.order_status",
    "futures.order_list",
};

/// Suffixes of liveness topics, which are never recorded for replay.
const HEARTBEAT_SUFFIXES: [&str; 2] = [".ping", ".time"];

/// The channel part of a topic, i.e. everything before the first `@`.
#[must_use]
pub fn channel(topic: &str) -> &str {
    topic.split_once('@').map_or(topic, |(channel, _)| channel)
}

/// Whether subscribing to or requesting `topic` requires credentials.
#[must_use]
pub fn requires_auth(topic: &str) -> bool {
    AUTH_CHANNELS.contains(channel(topic))
}

/// Whether `topic` is a liveness topic that is meaningless to replay.
#[must_use]
pub fn is_heartbeat(topic: &str) -> bool {
    HEARTBEAT_SUFFIXES
        .iter()
        .any(|suffix| topic.ends_with(suffix))
}

/// The login channel for the given product.
#[must_use]
pub const fn login(app: App) -> &'static str {
    match app {
        App::Spot => SPOT_LOGIN,
        App::Futures => FUTURES_LOGIN,
    }
}

/// `ticker@{symbol}`
#[must_use]
pub fn ticker(symbol: &str) -> String {
    format!("{SPOT_TICKER}@{symbol}")
}

/// `depth@{symbol},{level}`
#[must_use]
pub fn depth(symbol: &str, level: u32) -> String {
    format!("{SPOT_DEPTH}@{symbol},{level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_symbol_topics() {
        assert_eq!(ticker("btc_usdt"), "ticker@btc_usdt");
        assert_eq!(depth("btc_usdt", 5), "depth@btc_usdt,5");
    }

    #[test]
    fn channel_strips_arguments() {
        assert_eq!(channel("depth@btc_usdt,5"), "depth");
        assert_eq!(channel("spot.order_place"), "spot.order_place");
    }

    #[test]
    fn auth_is_decided_by_channel() {
        assert!(requires_auth(SPOT_ORDER_PLACE));
        assert!(requires_auth("order@btc_usdt"));
        assert!(!requires_auth("ticker@btc_usdt"));
        assert!(!requires_auth(SPOT_DEPTH));
    }

    #[test]
    fn heartbeat_topics_are_suffix_matched() {
        assert!(is_heartbeat("spot.ping"));
        assert!(is_heartbeat("futures.time"));
        assert!(!is_heartbeat("ticker@btc_usdt"));
        assert!(!is_heartbeat("ping.ticker"));
    }

    #[test]
    fn login_follows_app() {
        assert_eq!(login(App::Spot), "spot.login");
        assert_eq!(login(App::Futures), "futures.login");
    }
}
