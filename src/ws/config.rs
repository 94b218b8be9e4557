#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::backoff::Backoff;
use bon::Builder;
use strum_macros::Display;

use crate::auth::Credentials;

/// Public market data stream.
pub const DEFAULT_ENDPOINT: &str = "wss://stream.xt.com/public";
/// User data stream, requires credentials.
pub const PRIVATE_ENDPOINT: &str = "wss://stream.xt.com/private";
/// Heartbeat interval used when none (or an unparseable one) is configured.
pub const DEFAULT_HEARTBEAT_INTERVAL: &str = "10s";

const FALLBACK_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Which product the session trades, selecting the login topic for authenticated calls.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum App {
    #[default]
    Spot,
    Futures,
}

/// Configuration for a streaming [`crate::session::Session`].
///
/// ```
/// use xt_ws_client::auth::Credentials;
/// use xt_ws_client::ws::config::Config;
///
/// let config = Config::builder()
///     .credentials(Credentials::new("key".to_owned(), "secret".to_owned()))
///     .heartbeat_interval("5s")
///     .build();
///
/// assert_eq!(config.heartbeat_interval(), std::time::Duration::from_secs(5));
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// WebSocket endpoint to dial
    #[builder(default = DEFAULT_ENDPOINT.to_owned(), into)]
    pub endpoint: String,
    /// Product the session belongs to
    #[builder(default)]
    pub app: App,
    /// API key and secret; required for auth-required topics and signed requests
    pub credentials: Option<Credentials>,
    /// Dial retry strategy, shared by the first connection and every reconnect
    #[builder(default)]
    pub reconnect: ReconnectConfig,
    /// Accept any server certificate when dialing `wss://` endpoints
    #[builder(default)]
    pub skip_tls_verify: bool,
    /// Log every topic re-subscribed after a reconnect
    #[builder(default = true)]
    pub show_reconnect_msg: bool,
    /// Duration string such as `10s`, `500ms` or `1m30s`
    #[builder(default = DEFAULT_HEARTBEAT_INTERVAL.to_owned(), into)]
    pub heartbeat_interval: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Config {
    /// Resolves [`Self::heartbeat_interval`], falling back to the default interval when the
    /// configured string cannot be parsed.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        if let Some(interval) = parse_interval(&self.heartbeat_interval) {
            return interval;
        }

        tracing::warn!(
            interval = %self.heartbeat_interval,
            "failed to parse heartbeat interval, using default {DEFAULT_HEARTBEAT_INTERVAL} instead"
        );
        parse_interval(DEFAULT_HEARTBEAT_INTERVAL).unwrap_or(FALLBACK_HEARTBEAT_INTERVAL)
    }
}

/// Configuration for dial retries.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct ReconnectConfig {
    /// Maximum number of retries after a failed dial before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// The n-th retry waits `n * backoff_step`
    #[builder(default = DEFAULT_BACKOFF_STEP)]
    pub backoff_step: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        // Infinite reconnection by default
        Self::builder().build()
    }
}

impl From<ReconnectConfig> for LinearBackoff {
    fn from(config: ReconnectConfig) -> Self {
        Self {
            step: config.backoff_step,
            attempt: 0,
            max_attempts: config.max_attempts,
        }
    }
}

/// Backoff whose delay grows by a fixed step on every retry, without an upper bound.
///
/// Returns `None` once `max_attempts` retries have been handed out.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    step: Duration,
    attempt: u32,
    max_attempts: Option<u32>,
}

impl LinearBackoff {
    /// Number of retries handed out since the last reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempt
    }
}

impl Backoff for LinearBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts
            && self.attempt >= max
        {
            return None;
        }

        self.attempt = self.attempt.saturating_add(1);
        Some(self.step.saturating_mul(self.attempt))
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Parses a duration string made of decimal numbers with unit suffixes, e.g. `300ms`, `1.5h` or
/// `2h45m`. Valid units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`.
///
/// Zero and negative durations are rejected since they cannot drive a ticker.
#[must_use]
pub fn parse_interval(input: &str) -> Option<Duration> {
    let mut rest = input.trim();
    rest = rest.strip_prefix('+').unwrap_or(rest);
    if rest.is_empty() {
        return None;
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, tail) = rest.split_at(int_len);

        let (frac_part, tail) = match tail.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
                after_dot.split_at(frac_len)
            }
            None => ("", tail),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let unit_len: usize = tail
            .chars()
            .take_while(|c| !c.is_ascii_digit() && *c != '.')
            .map(char::len_utf8)
            .sum();
        let (unit, tail) = tail.split_at(unit_len);
        let unit_nanos = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SECOND,
            "m" => 60 * NANOS_PER_SECOND,
            "h" => 3_600 * NANOS_PER_SECOND,
            _ => return None,
        };

        let whole = if int_part.is_empty() {
            0
        } else {
            int_part.parse::<u128>().ok()?.checked_mul(unit_nanos)?
        };
        total = total.checked_add(whole)?.checked_add(fraction_nanos(frac_part, unit_nanos)?)?;
        rest = tail;
    }

    if total == 0 {
        return None;
    }

    let secs = u64::try_from(total / NANOS_PER_SECOND).ok()?;
    let nanos = u32::try_from(total % NANOS_PER_SECOND).ok()?;
    Some(Duration::new(secs, nanos))
}

/// Nanoseconds represented by the digits after the decimal point of a `unit_nanos` quantity.
fn fraction_nanos(digits: &str, unit_nanos: u128) -> Option<u128> {
    let mut scale: u128 = 1;
    let mut value: u128 = 0;
    // Precision below a nanosecond is dropped
    for digit in digits.bytes().take(18) {
        value = value.checked_mul(10)?.checked_add(u128::from(digit - b'0'))?;
        scale = scale.checked_mul(10)?;
    }

    Some(value.checked_mul(unit_nanos)? / scale)
}
