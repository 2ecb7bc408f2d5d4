//! Batched store access.
//!
//! A [`Batch`] queues commands and sends them in one round trip. Replies are
//! grouped by key so callers read outcomes back by key, never by position.
//! Several commands against one key are answered in the order they were
//! queued; nothing is promised about ordering across keys.

use crate::store::{Command, KeyValueStore, Reply, StoreError};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Outcome of a batched read for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Found(Vec<u8>),
    Missing,
    Failed(StoreError),
}

impl KeyOutcome {
    fn from_reply(reply: Option<Result<Reply, StoreError>>) -> Self {
        match reply.map(|reply| reply.and_then(Reply::into_bytes)) {
            Some(Ok(Some(bytes))) => Self::Found(bytes),
            Some(Ok(None)) => Self::Missing,
            Some(Err(err)) => Self::Failed(err),
            None => Self::Failed(StoreError::UnexpectedReply {
                command: "GET",
                reply: "no reply for key".to_string(),
            }),
        }
    }
}

/// Commands queued for a single round trip.
#[derive(Debug, Default, Clone)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    /// Start an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no commands are queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&mut self, key: impl Into<String>) -> &mut Self {
        self.commands.push(Command::Get { key: key.into() });
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value: value.into(),
            ttl: None,
        });
        self
    }

    /// Queue a `SET` that expires after `ttl`.
    pub fn set_with_ttl(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Vec<u8>>,
        ttl: Duration,
    ) -> &mut Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value: value.into(),
            ttl: Some(ttl),
        });
        self
    }

    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.commands.push(Command::Del { key: key.into() });
        self
    }

    pub fn exists(&mut self, key: impl Into<String>) -> &mut Self {
        self.commands.push(Command::Exists { key: key.into() });
        self
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.commands.push(Command::SAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn incr_by(&mut self, key: impl Into<String>, delta: i64) -> &mut Self {
        self.commands.push(Command::IncrBy {
            key: key.into(),
            delta,
        });
        self
    }

    /// Send the batch and group replies by key.
    ///
    /// A failed round trip is reported as that failure on every key.
    pub async fn execute(self, store: &dyn KeyValueStore) -> BatchReplies {
        let round_trip = if self.is_empty() {
            Ok(Vec::new())
        } else {
            store.pipeline(&self.commands).await
        };
        let mut replies = match round_trip {
            Ok(replies) => replies.into_iter(),
            Err(err) => {
                tracing::error!(
                    "Batch of {} command(s) failed: {}",
                    self.commands.len(),
                    err
                );
                vec![Err(err); self.commands.len()].into_iter()
            }
        };

        let mut by_key: HashMap<String, VecDeque<Result<Reply, StoreError>>> = HashMap::new();
        for command in self.commands {
            let name = command.name();
            let reply = replies.next().unwrap_or_else(|| {
                Err(StoreError::UnexpectedReply {
                    command: name,
                    reply: "missing reply".to_string(),
                })
            });
            let key = match command {
                Command::Get { key }
                | Command::Set { key, .. }
                | Command::Del { key }
                | Command::Exists { key }
                | Command::SAdd { key, .. }
                | Command::SMembers { key }
                | Command::IncrBy { key, .. } => key,
            };
            by_key.entry(key).or_default().push_back(reply);
        }
        BatchReplies { by_key }
    }

    /// Send the batch, reporting only whether every command succeeded.
    ///
    /// # Errors
    /// Returns the first failure observed (round trip or per command).
    pub async fn write(self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        if self.is_empty() {
            return Ok(());
        }
        let count = self.commands.len();
        for reply in store.pipeline(&self.commands).await? {
            if let Err(err) = reply {
                tracing::error!("Batched write of {} command(s) failed: {}", count, err);
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Replies from an executed [`Batch`], addressed by key.
#[derive(Debug, Default)]
pub struct BatchReplies {
    by_key: HashMap<String, VecDeque<Result<Reply, StoreError>>>,
}

impl BatchReplies {
    /// Take the next unread reply for `key`, in submission order.
    pub fn take(&mut self, key: &str) -> Option<Result<Reply, StoreError>> {
        self.by_key.get_mut(key).and_then(VecDeque::pop_front)
    }

    /// Take the next reply for `key` as a value read.
    pub fn value(&mut self, key: &str) -> KeyOutcome {
        KeyOutcome::from_reply(self.take(key))
    }

    /// Take the next reply for `key` as an integer.
    ///
    /// # Errors
    /// Returns the per-key failure, or an error when no reply is pending.
    pub fn integer(&mut self, key: &str) -> Result<i64, StoreError> {
        self.take(key)
            .unwrap_or_else(|| {
                Err(StoreError::UnexpectedReply {
                    command: "integer command",
                    reply: format!("no reply for '{}'", key),
                })
            })
            .and_then(Reply::into_integer)
    }

    /// Take the next reply for `key` as an `EXISTS` flag.
    ///
    /// # Errors
    /// Same as [`BatchReplies::integer`].
    pub fn flag(&mut self, key: &str) -> Result<bool, StoreError> {
        self.integer(key).map(|count| count > 0)
    }
}

/// Read many keys in one round trip.
///
/// Every requested key appears in the result with its own outcome.
pub async fn read_keys<I, K>(store: &dyn KeyValueStore, keys: I) -> HashMap<String, KeyOutcome>
where
    I: IntoIterator<Item = K>,
    K: Into<String>,
{
    let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
    let mut batch = Batch::new();
    for key in &keys {
        batch.get(key.as_str());
    }
    let mut replies = batch.execute(store).await;
    keys.into_iter()
        .map(|key| {
            let outcome = replies.value(&key);
            (key, outcome)
        })
        .collect()
}
