//! In-memory store with Redis string semantics, for local development and tests.
//!
//! Besides the data it keeps a log of every command received and a queue of
//! injected faults, so callers can observe round trips and exercise the
//! reconnect path without a real server.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::command::{Command, Reply};
use super::connection::{Connection, Connector};
use super::error::KvsError;

/// Largest value Redis accepts for a string (`proto-max-bulk-len` default).
pub const MAX_VALUE_LEN: usize = 512 * 1024 * 1024;

/// A fault consumed by the next command sent on any connection.
#[derive(Clone, Debug)]
pub enum Fault {
    /// The connection breaks; this and every later command on it fail.
    Disconnect,
    /// The store answers with an error reply.
    StoreError(String),
    /// The store answers with this reply instead of the real one.
    Reply(Reply),
}

#[derive(Default)]
struct State {
    data: BTreeMap<String, Vec<u8>>,
    faults: VecDeque<Fault>,
    refused_connects: usize,
    connects: usize,
    history: Vec<Command>,
}

/// Shared in-memory keyspace. Clones refer to the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            store: self.clone(),
        }
    }

    pub async fn insert(&self, key: &str, value: &[u8]) {
        self.state
            .lock()
            .await
            .data
            .insert(key.to_string(), value.to_vec());
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.state.lock().await.data.get(key).cloned()
    }

    pub async fn inject(&self, fault: Fault) {
        self.state.lock().await.faults.push_back(fault);
    }

    /// Make the next `n` connection attempts fail.
    pub async fn refuse_connects(&self, n: usize) {
        self.state.lock().await.refused_connects = n;
    }

    /// Number of successful connection attempts so far.
    pub async fn connects(&self) -> usize {
        self.state.lock().await.connects
    }

    /// Every command received, in order, including failed ones.
    pub async fn history(&self) -> Vec<Command> {
        self.state.lock().await.history.clone()
    }

    pub async fn clear_history(&self) {
        self.state.lock().await.history.clear();
    }
}

pub struct MemoryConnector {
    store: MemoryStore,
}

#[async_trait]
impl Connector for MemoryConnector {
    type Conn = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, KvsError> {
        let mut state = self.store.state.lock().await;
        if state.refused_connects > 0 {
            state.refused_connects -= 1;
            return Err(KvsError::Transport("connection refused".to_string()));
        }
        state.connects += 1;
        Ok(MemoryConnection {
            store: self.store.clone(),
            broken: false,
        })
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}

pub struct MemoryConnection {
    store: MemoryStore,
    broken: bool,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn send(&mut self, cmd: &Command) -> Result<Reply, KvsError> {
        let mut state = self.store.state.lock().await;
        state.history.push(cmd.clone());
        if self.broken {
            return Err(KvsError::Transport("connection reset by peer".to_string()));
        }
        let fault = state.faults.pop_front();
        match fault {
            Some(Fault::Disconnect) => {
                self.broken = true;
                Err(KvsError::Transport("connection reset by peer".to_string()))
            }
            Some(Fault::StoreError(msg)) => Err(KvsError::Store(msg)),
            Some(Fault::Reply(reply)) => Ok(reply),
            None => apply(&mut state.data, cmd),
        }
    }
}

fn apply(data: &mut BTreeMap<String, Vec<u8>>, cmd: &Command) -> Result<Reply, KvsError> {
    let reply = match cmd {
        Command::Exists { key } => Reply::Integer(data.contains_key(key) as i64),
        Command::StrLen { key } => Reply::Integer(data.get(key).map_or(0, |v| v.len()) as i64),
        Command::Set { key, value } => {
            data.insert(key.clone(), value.to_vec());
            Reply::Status("OK".to_string())
        }
        Command::GetRange { key, start, end } => {
            let value = data.get(key).map(Vec::as_slice).unwrap_or_default();
            Reply::Data(get_range(value, *start, *end).to_vec())
        }
        Command::SetRange { key, offset, value } => {
            let offset = usize::try_from(*offset)
                .map_err(|_| KvsError::Store("ERR offset is out of range".to_string()))?;
            if value.is_empty() {
                return Ok(Reply::Integer(data.get(key).map_or(0, |v| v.len()) as i64));
            }
            let end = offset + value.len();
            if end > MAX_VALUE_LEN {
                return Err(KvsError::Store(
                    "ERR string exceeds maximum allowed size (proto-max-bulk-len)".to_string(),
                ));
            }
            let current = data.entry(key.clone()).or_default();
            if current.len() < end {
                current.resize(end, 0);
            }
            current[offset..end].copy_from_slice(value);
            Reply::Integer(current.len() as i64)
        }
        Command::Del { key } => Reply::Integer(data.remove(key).is_some() as i64),
        Command::Rename { key, new_key } => {
            let value = data
                .remove(key)
                .ok_or_else(|| KvsError::Store("ERR no such key".to_string()))?;
            data.insert(new_key.clone(), value);
            Reply::Status("OK".to_string())
        }
        Command::Keys { pattern } => Reply::List(
            data.keys()
                .filter(|k| pattern == "*" || *k == pattern)
                .map(|k| Reply::Data(k.as_bytes().to_vec()))
                .collect(),
        ),
    };
    Ok(reply)
}

/// `GETRANGE` index arithmetic: negative indexes count from the end, the end
/// index is inclusive and clamped to the value.
fn get_range(value: &[u8], start: i64, end: i64) -> &[u8] {
    if start < 0 && end < 0 && start > end {
        return &[];
    }
    let len = value.len() as i64;
    let mut start = if start < 0 { len + start } else { start };
    let mut end = if end < 0 { len + end } else { end };
    start = start.max(0);
    end = end.max(0);
    if end >= len {
        end = len - 1;
    }
    if len == 0 || start > end {
        return &[];
    }
    &value[start as usize..=end as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    async fn send(conn: &mut MemoryConnection, cmd: Command) -> Result<Reply, KvsError> {
        conn.send(&cmd).await
    }

    #[test]
    fn test_get_range_clamping() {
        let v = b"hello";
        assert_eq!(get_range(v, 0, 4), b"hello");
        assert_eq!(get_range(v, 1, 100), b"ello");
        assert_eq!(get_range(v, 5, 10), b"");
        assert_eq!(get_range(v, 0, -1), b"hello");
        assert_eq!(get_range(v, -3, -1), b"llo");
        assert_eq!(get_range(v, 3, 1), b"");
        assert_eq!(get_range(b"", 0, 10), b"");
    }

    #[tokio::test]
    async fn test_set_range_zero_fills() {
        let store = MemoryStore::new();
        let mut conn = store.connector().connect().await.unwrap();
        let reply = send(
            &mut conn,
            Command::SetRange {
                key: "k".into(),
                offset: 4,
                value: Bytes::from_static(b"ab"),
            },
        )
        .await;
        assert_eq!(reply, Ok(Reply::Integer(6)));
        assert_eq!(store.get("k").await.unwrap(), b"\0\0\0\0ab");
    }

    #[tokio::test]
    async fn test_set_range_empty_value_does_not_create() {
        let store = MemoryStore::new();
        let mut conn = store.connector().connect().await.unwrap();
        let reply = send(
            &mut conn,
            Command::SetRange {
                key: "k".into(),
                offset: 10,
                value: Bytes::new(),
            },
        )
        .await;
        assert_eq!(reply, Ok(Reply::Integer(0)));
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_rename_overwrites_and_requires_source() {
        let store = MemoryStore::new();
        store.insert("a", b"1").await;
        store.insert("b", b"2").await;
        let mut conn = store.connector().connect().await.unwrap();
        let reply = send(
            &mut conn,
            Command::Rename {
                key: "a".into(),
                new_key: "b".into(),
            },
        )
        .await;
        assert_eq!(reply, Ok(Reply::Status("OK".into())));
        assert_eq!(store.get("b").await.unwrap(), b"1");
        assert!(store.get("a").await.is_none());

        let reply = send(
            &mut conn,
            Command::Rename {
                key: "a".into(),
                new_key: "c".into(),
            },
        )
        .await;
        assert!(matches!(reply, Err(KvsError::Store(_))));
    }

    #[tokio::test]
    async fn test_broken_connection_stays_broken() {
        let store = MemoryStore::new();
        let mut conn = store.connector().connect().await.unwrap();
        store.inject(Fault::Disconnect).await;
        let cmd = Command::Keys {
            pattern: "*".into(),
        };
        assert!(send(&mut conn, cmd.clone()).await.unwrap_err().is_transport());
        assert!(send(&mut conn, cmd).await.unwrap_err().is_transport());
    }
}
