//! Redis backend: connections opened through the `redis` crate.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::command::{Command, Reply};
use super::connection::{Connection, Connector};
use super::error::KvsError;

/// How long a single connection attempt may take.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Opens multiplexed Redis connections to a fixed endpoint.
pub struct RedisConnector {
    client: ::redis::Client,
    host: String,
    port: u16,
}

impl RedisConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, KvsError> {
        let host = host.into();
        let client = ::redis::Client::open((host.clone(), port))?;
        Ok(Self { client, host, port })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Conn = RedisConnection;

    async fn connect(&self) -> Result<RedisConnection, KvsError> {
        debug!("connecting to redis at {}", self.endpoint());
        let attempt = self.client.get_multiplexed_async_connection();
        match tokio::time::timeout(CONNECT_TIMEOUT, attempt).await {
            Ok(Ok(inner)) => Ok(RedisConnection { inner }),
            Ok(Err(e)) => Err(KvsError::Transport(format!(
                "connect to {} failed: {e}",
                self.endpoint()
            ))),
            Err(_) => Err(KvsError::Transport(format!(
                "connect to {} timed out after {CONNECT_TIMEOUT:?}",
                self.endpoint()
            ))),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub struct RedisConnection {
    inner: ::redis::aio::MultiplexedConnection,
}

#[async_trait]
impl Connection for RedisConnection {
    async fn send(&mut self, cmd: &Command) -> Result<Reply, KvsError> {
        let value: ::redis::Value = cmd.to_redis().query_async(&mut self.inner).await?;
        Ok(Reply::from(value))
    }
}
