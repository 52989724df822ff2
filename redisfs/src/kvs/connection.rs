//! Connection abstraction between the executor and a concrete store.

use async_trait::async_trait;

use super::command::{Command, Reply};
use super::error::KvsError;

/// A live session to the store. One command is sent at a time.
#[async_trait]
pub trait Connection: Send {
    /// Send `cmd` and wait for its reply.
    ///
    /// Implementations must report failures where no reply was obtained as
    /// [`KvsError::Transport`] and errors answered by the store as
    /// [`KvsError::Store`]; the executor relies on that split to decide
    /// whether a reconnect is worth it.
    async fn send(&mut self, cmd: &Command) -> Result<Reply, KvsError>;
}

/// Opens new sessions to the store.
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    async fn connect(&self) -> Result<Self::Conn, KvsError>;

    /// Human readable endpoint, for logs.
    fn endpoint(&self) -> String;
}
