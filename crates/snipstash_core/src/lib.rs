//! Core domain library for SnipStash (config, codec, store access, models).

/// Batched/pipelined store access with per-key result correlation.
pub mod batch;
/// Payload compression codec.
pub mod codec;
/// Configuration loading and defaults.
pub mod config;
/// Shared default values.
pub mod constants;
/// Password digest helpers.
pub mod credentials;
/// Application error types (store/domain).
pub mod error;
/// Store key naming.
pub mod keys;
/// Gist, snippet and account models.
pub mod models;
/// Dual-dimension request rate limiting.
pub mod ratelimit;
/// Key-value store contract and backends.
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use codec::{Codec, Compression};
pub use config::Config;
pub use constants::DEFAULT_PORT;
pub use error::AppError;
pub use models::{account::Account, gist::GistStore};
pub use ratelimit::{RateLimiter, RateLimits};
pub use store::{KeyValueStore, SharedStore, StoreError};
