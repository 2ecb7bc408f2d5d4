//! In-process store with Redis-like semantics for the command subset we use.

use super::{Command, KeyValueStore, Reply, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

/// Store kept in process memory.
///
/// A pipeline runs under one lock acquisition, so its commands apply in
/// submission order without interleaving.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

fn wrong_type(command: &Command) -> StoreError {
    StoreError::Command(format!(
        "WRONGTYPE {} against key '{}' holding the wrong kind of value",
        command.name(),
        command.key()
    ))
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store state is poisoned".to_string()))
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|entries| entries.values().filter(|entry| entry.live(now)).count())
            .unwrap_or(0)
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply(
        entries: &mut HashMap<String, Entry>,
        command: &Command,
        now: Instant,
    ) -> Result<Reply, StoreError> {
        let key = command.key();
        if entries.get(key).is_some_and(|entry| !entry.live(now)) {
            entries.remove(key);
        }

        match command {
            Command::Get { .. } => match entries.get(key) {
                None => Ok(Reply::Nil),
                Some(Entry {
                    value: Value::Bytes(bytes),
                    ..
                }) => Ok(Reply::Bytes(bytes.clone())),
                Some(_) => Err(wrong_type(command)),
            },
            Command::Set { value, ttl, .. } => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Bytes(value.clone()),
                        expires_at: ttl.map(|ttl| now + ttl),
                    },
                );
                Ok(Reply::Ok)
            }
            Command::Del { .. } => Ok(Reply::Integer(i64::from(entries.remove(key).is_some()))),
            Command::Exists { .. } => Ok(Reply::Integer(i64::from(entries.contains_key(key)))),
            Command::SAdd { member, .. } => {
                let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                    value: Value::Set(BTreeSet::new()),
                    expires_at: None,
                });
                match &mut entry.value {
                    Value::Set(members) => {
                        Ok(Reply::Integer(i64::from(members.insert(member.clone()))))
                    }
                    Value::Bytes(_) => Err(wrong_type(command)),
                }
            }
            Command::SMembers { .. } => match entries.get(key) {
                None => Ok(Reply::Members(Vec::new())),
                Some(Entry {
                    value: Value::Set(members),
                    ..
                }) => Ok(Reply::Members(members.iter().cloned().collect())),
                Some(_) => Err(wrong_type(command)),
            },
            Command::IncrBy { delta, .. } => {
                let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                    value: Value::Bytes(b"0".to_vec()),
                    expires_at: None,
                });
                let Value::Bytes(bytes) = &mut entry.value else {
                    return Err(wrong_type(command));
                };
                let current: i64 = std::str::from_utf8(bytes)
                    .ok()
                    .and_then(|text| text.parse().ok())
                    .ok_or_else(|| {
                        StoreError::Command("value is not an integer or out of range".to_string())
                    })?;
                let next = current.checked_add(*delta).ok_or_else(|| {
                    StoreError::Command("increment or decrement would overflow".to_string())
                })?;
                *bytes = next.to_string().into_bytes();
                Ok(Reply::Integer(next))
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn pipeline(
        &self,
        commands: &[Command],
    ) -> Result<Vec<Result<Reply, StoreError>>, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        Ok(commands
            .iter()
            .map(|command| Self::apply(&mut entries, command, now))
            .collect())
    }
}
