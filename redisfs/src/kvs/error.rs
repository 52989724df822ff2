use thiserror::Error;

/// Outcome of a failed round trip to the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvsError {
    /// No reply could be obtained: the connection is broken, refused or timed out.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The store answered with an application-level error. Never retried.
    #[error("store error: {0}")]
    Store(String),

    /// The store answered, but not with the reply shape the command expects.
    #[error("unexpected reply to {command}: expected {expected}, got {got}")]
    Protocol {
        command: &'static str,
        expected: &'static str,
        got: &'static str,
    },

    /// The single reconnect-and-retry also failed; the link is gone for good.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl KvsError {
    pub fn is_transport(&self) -> bool {
        matches!(self, KvsError::Transport(_))
    }
}

impl From<::redis::RedisError> for KvsError {
    fn from(err: ::redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            KvsError::Transport(err.to_string())
        } else {
            KvsError::Store(err.to_string())
        }
    }
}
