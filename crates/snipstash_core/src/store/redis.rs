//! Redis store over a multiplexed async connection.

use super::{Command, KeyValueStore, Reply, StoreError};
use ::redis::aio::MultiplexedConnection;
use ::redis::{from_redis_value, FromRedisValue, RedisError, Value};
use async_trait::async_trait;

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Redis-backed [`KeyValueStore`].
///
/// Each pipeline is sent as a single Redis pipeline (not `MULTI`/`EXEC`).
#[derive(Clone)]
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    /// Connect to the Redis server at `url`.
    ///
    /// # Errors
    /// Returns an error when the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = ::redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        tracing::info!("Connected to redis store at {}", url);
        Ok(Self { connection })
    }
}

fn queue(pipe: &mut ::redis::Pipeline, command: &Command) {
    match command {
        Command::Get { key } => {
            pipe.cmd("GET").arg(key);
        }
        Command::Set { key, value, ttl } => {
            pipe.cmd("SET").arg(key).arg(value.as_slice());
            if let Some(ttl) = ttl {
                // PX rejects zero.
                let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                pipe.arg("PX").arg(millis);
            }
        }
        Command::Del { key } => {
            pipe.cmd("DEL").arg(key);
        }
        Command::Exists { key } => {
            pipe.cmd("EXISTS").arg(key);
        }
        Command::SAdd { key, member } => {
            pipe.cmd("SADD").arg(key).arg(member);
        }
        Command::SMembers { key } => {
            pipe.cmd("SMEMBERS").arg(key);
        }
        Command::IncrBy { key, delta } => {
            pipe.cmd("INCRBY").arg(key).arg(*delta);
        }
    }
}

fn convert<T: FromRedisValue>(value: &Value) -> Result<T, StoreError> {
    from_redis_value(value).map_err(StoreError::from)
}

fn to_reply(command: &Command, value: &Value) -> Result<Reply, StoreError> {
    match command {
        Command::Get { .. } => Ok(match convert::<Option<Vec<u8>>>(value)? {
            Some(bytes) => Reply::Bytes(bytes),
            None => Reply::Nil,
        }),
        Command::Set { .. } => convert::<String>(value).map(|_| Reply::Ok),
        Command::Del { .. }
        | Command::Exists { .. }
        | Command::SAdd { .. }
        | Command::IncrBy { .. } => convert::<i64>(value).map(Reply::Integer),
        Command::SMembers { .. } => convert::<Vec<String>>(value).map(Reply::Members),
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn pipeline(
        &self,
        commands: &[Command],
    ) -> Result<Vec<Result<Reply, StoreError>>, StoreError> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = ::redis::pipe();
        for command in commands {
            queue(&mut pipe, command);
        }

        let mut connection = self.connection.clone();
        let values: Vec<Value> = pipe.query_async(&mut connection).await?;
        if values.len() != commands.len() {
            return Err(StoreError::UnexpectedReply {
                command: "PIPELINE",
                reply: format!("{} replies for {} commands", values.len(), commands.len()),
            });
        }

        Ok(commands
            .iter()
            .zip(values.iter())
            .map(|(command, value)| to_reply(command, value))
            .collect())
    }
}
