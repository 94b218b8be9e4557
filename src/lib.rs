#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod auth;
pub mod error;
pub mod session;
pub mod topic;
pub mod ws;

use crate::error::Error;

pub use crate::session::Session;

pub type Result<T> = std::result::Result<T, Error>;

/// Timestamp in seconds since [`std::time::UNIX_EPOCH`]
pub(crate) type Timestamp = i64;

/// Current [`Timestamp`] used to sign authenticated envelopes.
pub(crate) fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}
