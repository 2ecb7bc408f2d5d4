//! Key-value store contract shared by every storage consumer.
//!
//! A store exposes a single round-trip primitive, [`KeyValueStore::pipeline`],
//! plus convenience single-command helpers built on top of it. Pipelines are
//! not transactions: commands from concurrent pipelines may interleave.

/// In-process store used for tests and single-node deployments.
pub mod memory;
/// Redis-backed store.
pub mod redis;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Shared handle passed explicitly to every component that talks to a store.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Store-level failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store command failed: {0}")]
    Command(String),

    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        command: &'static str,
        reply: String,
    },

    #[error("unsupported store url: {0}")]
    UnsupportedUrl(String),
}

/// A single store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: Vec<u8>,
        ttl: Option<Duration>,
    },
    Del {
        key: String,
    },
    Exists {
        key: String,
    },
    SAdd {
        key: String,
        member: String,
    },
    SMembers {
        key: String,
    },
    IncrBy {
        key: String,
        delta: i64,
    },
}

impl Command {
    /// Key this command addresses.
    pub fn key(&self) -> &str {
        match self {
            Self::Get { key }
            | Self::Set { key, .. }
            | Self::Del { key }
            | Self::Exists { key }
            | Self::SAdd { key, .. }
            | Self::SMembers { key }
            | Self::IncrBy { key, .. } => key,
        }
    }

    /// Wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get { .. } => "GET",
            Self::Set { .. } => "SET",
            Self::Del { .. } => "DEL",
            Self::Exists { .. } => "EXISTS",
            Self::SAdd { .. } => "SADD",
            Self::SMembers { .. } => "SMEMBERS",
            Self::IncrBy { .. } => "INCRBY",
        }
    }
}

/// Reply to a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nil,
    Ok,
    Bytes(Vec<u8>),
    Integer(i64),
    Members(Vec<String>),
}

impl Reply {
    fn unexpected(self, command: &'static str) -> StoreError {
        StoreError::UnexpectedReply {
            command,
            reply: format!("{:?}", self),
        }
    }

    /// Interpret a `GET` reply.
    ///
    /// # Errors
    /// Returns [`StoreError::UnexpectedReply`] for non-value replies.
    pub fn into_bytes(self) -> Result<Option<Vec<u8>>, StoreError> {
        match self {
            Self::Nil => Ok(None),
            Self::Bytes(bytes) => Ok(Some(bytes)),
            other => Err(other.unexpected("GET")),
        }
    }

    /// Interpret an integer reply (`DEL`, `EXISTS`, `SADD`, `INCRBY`).
    ///
    /// # Errors
    /// Returns [`StoreError::UnexpectedReply`] for non-integer replies.
    pub fn into_integer(self) -> Result<i64, StoreError> {
        match self {
            Self::Integer(value) => Ok(value),
            other => Err(other.unexpected("integer command")),
        }
    }

    /// Interpret a `SMEMBERS` reply. A missing set is empty.
    ///
    /// # Errors
    /// Returns [`StoreError::UnexpectedReply`] for non-set replies.
    pub fn into_members(self) -> Result<Vec<String>, StoreError> {
        match self {
            Self::Members(members) => Ok(members),
            Self::Nil => Ok(Vec::new()),
            other => Err(other.unexpected("SMEMBERS")),
        }
    }
}

/// Remote key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Execute `commands` as one round trip.
    ///
    /// Commands against the same key apply in submission order. The outer
    /// error reports a failed round trip; inner results are per command.
    async fn pipeline(
        &self,
        commands: &[Command],
    ) -> Result<Vec<Result<Reply, StoreError>>, StoreError>;

    /// Run a single command.
    async fn execute(&self, command: Command) -> Result<Reply, StoreError> {
        let name = command.name();
        let mut replies = self.pipeline(std::slice::from_ref(&command)).await?;
        match replies.pop() {
            Some(reply) if replies.is_empty() => reply,
            _ => Err(StoreError::UnexpectedReply {
                command: name,
                reply: "reply count mismatch".to_string(),
            }),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.execute(Command::Get {
            key: key.to_string(),
        })
        .await?
        .into_bytes()
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError> {
        self.execute(Command::Set {
            key: key.to_string(),
            value: value.to_vec(),
            ttl,
        })
        .await
        .map(|_| ())
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        let removed = self
            .execute(Command::Del {
                key: key.to_string(),
            })
            .await?
            .into_integer()?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let found = self
            .execute(Command::Exists {
                key: key.to_string(),
            })
            .await?
            .into_integer()?;
        Ok(found > 0)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let added = self
            .execute(Command::SAdd {
                key: key.to_string(),
                member: member.to_string(),
            })
            .await?
            .into_integer()?;
        Ok(added > 0)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.execute(Command::SMembers {
            key: key.to_string(),
        })
        .await?
        .into_members()
    }
}

/// Open a store from a URL.
///
/// `memory://` yields a fresh [`MemoryStore`]; `redis://`, `rediss://` and
/// `redis+unix://` URLs connect to Redis. A bare `host:port` is treated as a
/// plain Redis address.
///
/// # Errors
/// Returns an error when the URL is unsupported or the connection fails.
pub async fn connect(url: &str) -> Result<SharedStore, StoreError> {
    let url = url.trim();
    if url == "memory://" || url == "memory" {
        return Ok(Arc::new(MemoryStore::new()));
    }
    if url.starts_with("redis://") || url.starts_with("rediss://") || url.starts_with("redis+unix://")
    {
        return Ok(Arc::new(RedisStore::connect(url).await?));
    }
    if !url.is_empty() && !url.contains("://") {
        let address = format!("redis://{}", url);
        return Ok(Arc::new(RedisStore::connect(&address).await?));
    }
    Err(StoreError::UnsupportedUrl(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_accepts_memory_url() {
        let store = connect("memory://").await.expect("memory store");
        store.set("k", b"v", None).await.expect("set");
        assert_eq!(store.get("k").await.expect("get"), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn connect_rejects_unknown_schemes() {
        let err = match connect("mongodb://localhost").await {
            Ok(_) => panic!("unknown scheme should be rejected"),
            Err(err) => err,
        };
        assert!(matches!(err, StoreError::UnsupportedUrl(_)));
    }

    #[test]
    fn reply_conversions_reject_mismatched_shapes() {
        assert_eq!(Reply::Nil.into_bytes(), Ok(None));
        assert_eq!(Reply::Integer(3).into_integer(), Ok(3));
        assert_eq!(Reply::Nil.into_members(), Ok(Vec::new()));
        assert!(Reply::Ok.into_integer().is_err());
        assert!(Reply::Integer(1).into_bytes().is_err());
    }
}
