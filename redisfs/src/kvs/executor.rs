//! Command execution with a single reconnect-and-retry on transport failure.

use log::{error, info, warn};
use tokio::sync::Mutex;

use super::command::{Command, Reply};
use super::connection::{Connection, Connector};
use super::error::KvsError;

/// Liveness of the store link. `Aborted` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Reconnecting,
    Aborted,
}

struct Link<T> {
    conn: Option<T>,
    state: LinkState,
}

/// Owns the store connection and runs one command at a time over it.
pub struct Executor<C: Connector> {
    connector: C,
    link: Mutex<Link<C::Conn>>,
}

impl<C: Connector> Executor<C> {
    /// Wrap an already established connection.
    pub fn new(connector: C, conn: C::Conn) -> Self {
        Self {
            connector,
            link: Mutex::new(Link {
                conn: Some(conn),
                state: LinkState::Connected,
            }),
        }
    }

    /// Open the first connection. Failing here is fatal for the caller.
    pub async fn connect(connector: C) -> Result<Self, KvsError> {
        let conn = match connector.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("initial connection to {} failed: {e}", connector.endpoint());
                return Err(e);
            }
        };
        info!("connected to store at {}", connector.endpoint());
        Ok(Self::new(connector, conn))
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub async fn state(&self) -> LinkState {
        self.link.lock().await.state
    }

    /// Run `cmd`, reconnecting and retrying once if no reply could be obtained.
    ///
    /// Store errors are returned as they are. A transport failure on the retry,
    /// or a failed reconnect, aborts the link and yields
    /// [`KvsError::Unavailable`] for this and every later call.
    pub async fn execute(&self, cmd: &Command) -> Result<Reply, KvsError> {
        let mut guard = self.link.lock().await;
        let link = &mut *guard;
        let first = match (link.state, link.conn.as_mut()) {
            (LinkState::Connected, Some(conn)) => conn.send(cmd).await,
            _ => return Err(KvsError::Unavailable("store link aborted".to_string())),
        };
        match first {
            Err(KvsError::Transport(reason)) => self.reconnect_and_retry(link, cmd, reason).await,
            other => other,
        }
    }

    async fn reconnect_and_retry(
        &self,
        link: &mut Link<C::Conn>,
        cmd: &Command,
        reason: String,
    ) -> Result<Reply, KvsError> {
        warn!(
            "{} failed on {}: {reason}; reconnecting",
            cmd.name(),
            self.connector.endpoint()
        );
        link.conn = None;
        link.state = LinkState::Reconnecting;

        let mut conn = match self.connector.connect().await {
            Ok(conn) => conn,
            Err(e) => return Err(Self::abort(link, format!("reconnect failed: {e}"))),
        };
        match conn.send(cmd).await {
            Err(KvsError::Transport(reason)) => Err(Self::abort(
                link,
                format!("{} failed again after reconnect: {reason}", cmd.name()),
            )),
            outcome => {
                info!("reconnected to store at {}", self.connector.endpoint());
                link.conn = Some(conn);
                link.state = LinkState::Connected;
                outcome
            }
        }
    }

    fn abort(link: &mut Link<C::Conn>, reason: String) -> KvsError {
        error!("store link aborted: {reason}");
        link.conn = None;
        link.state = LinkState::Aborted;
        KvsError::Unavailable(reason)
    }
}
