//! Per-client request rate limiting on two independent dimensions.
//!
//! Every request bumps a hit counter by one and a byte counter by its declared
//! payload length, both in one round trip. Counters only grow here; resetting
//! them (for example on a schedule) belongs to whoever owns the store.

use crate::batch::Batch;
use crate::keys;
use crate::store::{SharedStore, StoreError};
use std::time::{Duration, Instant};

/// Configured ceilings. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimits {
    pub hits: Option<i64>,
    pub bytes: Option<i64>,
}

/// A counted dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Hits,
    Bytes,
}

impl Dimension {
    /// Name used in response annotations.
    pub fn label(self) -> &'static str {
        match self {
            Self::Hits => "Hits",
            Self::Bytes => "Bytes",
        }
    }

    fn key(self, client: &str) -> String {
        match self {
            Self::Hits => keys::ratelimit_hits(client),
            Self::Bytes => keys::ratelimit_bytes(client),
        }
    }
}

/// Result of comparing a counter with its ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitState {
    Ok,
    Blocked,
}

impl LimitState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Blocked => "BLOCKED",
        }
    }
}

/// Evaluation of one dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionReport {
    pub dimension: Dimension,
    /// Counter value after this request's increment.
    pub value: i64,
    pub limit: Option<i64>,
    /// `None` when the dimension is unlimited.
    pub state: Option<LimitState>,
}

impl DimensionReport {
    fn evaluate(dimension: Dimension, value: i64, limit: Option<i64>) -> Self {
        let state = limit.map(|limit| {
            if value > limit {
                LimitState::Blocked
            } else {
                LimitState::Ok
            }
        });
        Self {
            dimension,
            value,
            limit,
            state,
        }
    }

    fn blocked(&self) -> bool {
        self.state == Some(LimitState::Blocked)
    }
}

/// Outcome of a rate-limit check for one request.
#[derive(Debug, Clone)]
pub struct RateLimitVerdict {
    /// Evaluated dimensions, hits first. Evaluation stops at the first breach.
    pub reports: Vec<DimensionReport>,
    pub latency: Duration,
}

impl RateLimitVerdict {
    /// Whether the request must be rejected.
    pub fn is_blocked(&self) -> bool {
        self.reports.iter().any(DimensionReport::blocked)
    }

    /// Report for `dimension`, if it was evaluated.
    pub fn report(&self, dimension: Dimension) -> Option<&DimensionReport> {
        self.reports
            .iter()
            .find(|report| report.dimension == dimension)
    }

    /// Response annotations as `(header, value)` pairs.
    ///
    /// `X-Ratelimit-<Dim>` always, `-Limit` and `-State` when a ceiling is
    /// configured, then `X-Ratelimit-Latency`.
    pub fn annotations(&self) -> Vec<(String, String)> {
        let mut annotations = Vec::with_capacity(self.reports.len() * 3 + 1);
        for report in &self.reports {
            let prefix = format!("X-Ratelimit-{}", report.dimension.label());
            annotations.push((prefix.clone(), report.value.to_string()));
            if let Some(limit) = report.limit {
                annotations.push((format!("{}-Limit", prefix), limit.to_string()));
            }
            if let Some(state) = report.state {
                annotations.push((format!("{}-State", prefix), state.as_str().to_string()));
            }
        }
        annotations.push((
            "X-Ratelimit-Latency".to_string(),
            format!("{}us", self.latency.as_micros()),
        ));
        annotations
    }
}

/// Counts requests per client and compares them against [`RateLimits`].
pub struct RateLimiter {
    store: SharedStore,
    limits: RateLimits,
}

impl RateLimiter {
    pub fn new(store: SharedStore, limits: RateLimits) -> Self {
        Self { store, limits }
    }

    /// Count one request of `content_length` bytes from `client` and judge it.
    ///
    /// # Errors
    /// Returns the store failure when the counters could not be bumped; the
    /// caller decides whether to admit the request.
    pub async fn check(
        &self,
        client: &str,
        content_length: u64,
    ) -> Result<RateLimitVerdict, StoreError> {
        let started = Instant::now();
        let hits_key = Dimension::Hits.key(client);
        let bytes_key = Dimension::Bytes.key(client);
        let delta = i64::try_from(content_length).unwrap_or(i64::MAX);

        let mut batch = Batch::new();
        batch.incr_by(hits_key.as_str(), 1).incr_by(bytes_key.as_str(), delta);
        let mut replies = batch.execute(self.store.as_ref()).await;
        let hits = replies.integer(&hits_key)?;
        let bytes = replies.integer(&bytes_key)?;

        let mut reports = vec![DimensionReport::evaluate(
            Dimension::Hits,
            hits,
            self.limits.hits,
        )];
        if !reports[0].blocked() {
            reports.push(DimensionReport::evaluate(
                Dimension::Bytes,
                bytes,
                self.limits.bytes,
            ));
        }

        Ok(RateLimitVerdict {
            reports,
            latency: started.elapsed(),
        })
    }
}
