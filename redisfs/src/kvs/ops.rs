//! Typed store primitives on top of [`Executor::execute`].
//!
//! Each primitive checks that the reply has the shape its command produces and
//! reports anything else as [`KvsError::Protocol`].

use bytes::Bytes;

use super::command::{Command, Reply};
use super::connection::Connector;
use super::error::KvsError;
use super::executor::Executor;

fn mismatch(cmd: &Command, expected: &'static str, got: &Reply) -> KvsError {
    KvsError::Protocol {
        command: cmd.name(),
        expected,
        got: got.kind(),
    }
}

impl<C: Connector> Executor<C> {
    async fn integer(&self, cmd: Command) -> Result<i64, KvsError> {
        match self.execute(&cmd).await? {
            Reply::Integer(n) => Ok(n),
            other => Err(mismatch(&cmd, "integer", &other)),
        }
    }

    async fn count(&self, cmd: Command) -> Result<u64, KvsError> {
        let n = self.integer(cmd.clone()).await?;
        u64::try_from(n).map_err(|_| KvsError::Protocol {
            command: cmd.name(),
            expected: "non-negative integer",
            got: "negative integer",
        })
    }

    async fn data(&self, cmd: Command) -> Result<Vec<u8>, KvsError> {
        match self.execute(&cmd).await? {
            Reply::Data(bytes) => Ok(bytes),
            other => Err(mismatch(&cmd, "bulk string", &other)),
        }
    }

    async fn status(&self, cmd: Command) -> Result<(), KvsError> {
        match self.execute(&cmd).await? {
            Reply::Status(_) => Ok(()),
            other => Err(mismatch(&cmd, "status", &other)),
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, KvsError> {
        let n = self.integer(Command::Exists { key: key.into() }).await?;
        Ok(n > 0)
    }

    /// Length of the value; 0 for a missing key.
    pub async fn length(&self, key: &str) -> Result<u64, KvsError> {
        self.count(Command::StrLen { key: key.into() }).await
    }

    pub async fn set(&self, key: &str, value: impl Into<Bytes>) -> Result<(), KvsError> {
        self.status(Command::Set {
            key: key.into(),
            value: value.into(),
        })
        .await
    }

    /// Bytes `[start, end]`, both inclusive, clamped to the value.
    pub async fn get_range(&self, key: &str, start: i64, end: i64) -> Result<Vec<u8>, KvsError> {
        self.data(Command::GetRange {
            key: key.into(),
            start,
            end,
        })
        .await
    }

    /// Overwrite at `offset`, zero-filling any gap past the end. Returns the new length.
    pub async fn set_range(
        &self,
        key: &str,
        offset: i64,
        value: impl Into<Bytes>,
    ) -> Result<u64, KvsError> {
        self.count(Command::SetRange {
            key: key.into(),
            offset,
            value: value.into(),
        })
        .await
    }

    /// Returns whether the key existed.
    pub async fn delete(&self, key: &str) -> Result<bool, KvsError> {
        let n = self.integer(Command::Del { key: key.into() }).await?;
        Ok(n > 0)
    }

    /// Rename, replacing `new_key` if it exists.
    pub async fn rename(&self, key: &str, new_key: &str) -> Result<(), KvsError> {
        self.status(Command::Rename {
            key: key.into(),
            new_key: new_key.into(),
        })
        .await
    }

    pub async fn list_keys(&self) -> Result<Vec<String>, KvsError> {
        let cmd = Command::Keys {
            pattern: "*".into(),
        };
        let items = match self.execute(&cmd).await? {
            Reply::List(items) => items,
            other => return Err(mismatch(&cmd, "array", &other)),
        };
        items
            .into_iter()
            .map(|item| match item {
                Reply::Data(name) => Ok(String::from_utf8_lossy(&name).into_owned()),
                other => Err(mismatch(&cmd, "bulk string", &other)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::kvs::error::KvsError;
    use crate::kvs::executor::Executor;
    use crate::kvs::memory::{Fault, MemoryConnector, MemoryStore};
    use crate::kvs::command::Reply;

    async fn setup() -> (MemoryStore, Executor<MemoryConnector>) {
        let store = MemoryStore::new();
        let exec = Executor::connect(store.connector()).await.unwrap();
        (store, exec)
    }

    #[tokio::test]
    async fn test_primitives() {
        let (_store, exec) = setup().await;
        assert!(!exec.exists("f").await.unwrap());
        exec.set("f", &b"hello"[..]).await.unwrap();
        assert!(exec.exists("f").await.unwrap());
        assert_eq!(exec.length("f").await.unwrap(), 5);
        assert_eq!(exec.get_range("f", 1, 3).await.unwrap(), b"ell");
        assert_eq!(exec.set_range("f", 7, &b"!"[..]).await.unwrap(), 8);
        assert_eq!(exec.get_range("f", 0, 7).await.unwrap(), b"hello\0\0!");

        exec.rename("f", "g").await.unwrap();
        assert_eq!(exec.list_keys().await.unwrap(), vec!["g".to_string()]);
        assert!(exec.delete("g").await.unwrap());
        assert!(!exec.delete("g").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_shape_is_protocol_error() {
        let (store, exec) = setup().await;
        store.inject(Fault::Reply(Reply::List(vec![]))).await;
        let err = exec.exists("f").await.unwrap_err();
        assert_eq!(
            err,
            KvsError::Protocol {
                command: "EXISTS",
                expected: "integer",
                got: "array"
            }
        );

        store.inject(Fault::Reply(Reply::Integer(3))).await;
        let err = exec.list_keys().await.unwrap_err();
        assert!(matches!(err, KvsError::Protocol { command: "KEYS", .. }));
    }

    #[tokio::test]
    async fn test_list_with_non_string_element() {
        let (store, exec) = setup().await;
        store
            .inject(Fault::Reply(Reply::List(vec![
                Reply::Data(b"a".to_vec()),
                Reply::Integer(1),
            ])))
            .await;
        let err = exec.list_keys().await.unwrap_err();
        assert!(matches!(
            err,
            KvsError::Protocol {
                expected: "bulk string",
                ..
            }
        ));
    }
}
