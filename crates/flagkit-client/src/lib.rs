//! Async client for a remote flag evaluation endpoint: cache-first lookups,
//! batch evaluation and background polling.

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod transport;

pub use client::{FlagClient, PollHandle};
pub use config::ClientConfig;
pub use error::ClientError;
pub use transport::{EvaluationTransport, HttpTransport};
