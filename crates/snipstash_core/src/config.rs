//! Configuration loading from environment variables.
//!
//! Everything is resolved once at startup into an immutable [`Config`] and
//! passed down explicitly; nothing below the binary reads the environment.

use crate::codec::Compression;
use crate::constants::{
    DEFAULT_GUARD_TTL, DEFAULT_MAX_BODY_SIZE, DEFAULT_PASSWORD_COST, DEFAULT_PORT,
    DEFAULT_STORE_URL,
};
use crate::ratelimit::RateLimits;
use std::env;
use std::time::Duration;

/// Runtime configuration for SnipStash.
#[derive(Debug, Clone)]
pub struct Config {
    /// Current store (`memory://`, `redis://host:port`, or bare `host:port`).
    pub store_url: String,
    /// Store holding snippets written under the legacy scheme, if any.
    pub legacy_store_url: Option<String>,
    pub port: u16,
    pub compression: Compression,
    pub rate_limits: RateLimits,
    /// Lifetime of migration guard markers.
    pub guard_ttl: Duration,
    pub password_cost: u32,
    pub max_body_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: DEFAULT_STORE_URL.to_string(),
            legacy_store_url: None,
            port: DEFAULT_PORT,
            compression: Compression::Identity,
            rate_limits: RateLimits::default(),
            guard_ttl: DEFAULT_GUARD_TTL,
            password_cost: DEFAULT_PASSWORD_COST,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

/// Parse a duration such as `90s`, `15m`, `1h`, `2d`, `250ms`, or plain
/// seconds.
///
/// # Returns
/// `Some(duration)` for a well-formed value, otherwise `None`.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);
    let amount: u64 = amount.parse().ok()?;
    let seconds = match unit.trim() {
        "ms" => return Some(Duration::from_millis(amount)),
        "" | "s" => amount,
        "m" => amount.checked_mul(60)?,
        "h" => amount.checked_mul(60 * 60)?,
        "d" => amount.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };
    Some(Duration::from_secs(seconds))
}

/// Parse a rate-limit ceiling.
///
/// Empty values mean "unlimited". Anything that is not a non-negative
/// integer is ignored with a warning.
pub fn parse_limit(name: &str, value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<i64>() {
        Ok(limit) if limit >= 0 => Some(limit),
        _ => {
            tracing::warn!("Ignoring invalid {}='{}'; dimension stays unlimited", name, value);
            None
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            store_url: non_empty_var("STORE_URL")
                .or_else(|| non_empty_var("REDIS_ADDR"))
                .unwrap_or(defaults.store_url),
            legacy_store_url: non_empty_var("LEGACY_STORE_URL"),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            compression: Compression::from_name(&env::var("COMPRESSION").unwrap_or_default()),
            rate_limits: RateLimits {
                hits: non_empty_var("LIMIT_HITS").and_then(|v| parse_limit("LIMIT_HITS", &v)),
                bytes: non_empty_var("LIMIT_BYTES").and_then(|v| parse_limit("LIMIT_BYTES", &v)),
            },
            guard_ttl: match non_empty_var("CACHING_TIME") {
                Some(raw) => parse_duration(&raw).unwrap_or_else(|| {
                    tracing::warn!(
                        "Invalid CACHING_TIME='{}'; using {:?}",
                        raw,
                        defaults.guard_ttl
                    );
                    defaults.guard_ttl
                }),
                None => defaults.guard_ttl,
            },
            password_cost: env::var("BCRYPT_COST")
                .ok()
                .and_then(|c| c.parse().ok())
                .unwrap_or(defaults.password_cost),
            max_body_size: env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
        }
    }
}
