//! Typed command templates and the decoded reply union.
//!
//! Every round trip to the store is described by a [`Command`] and answered by
//! a [`Reply`]. Replies are decoded once, at the connection boundary, so the
//! layers above match on variants instead of inspecting raw protocol values.

use bytes::Bytes;

/// One store command. Keys are file names without the leading `/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Exists { key: String },
    StrLen { key: String },
    Set { key: String, value: Bytes },
    GetRange { key: String, start: i64, end: i64 },
    SetRange { key: String, offset: i64, value: Bytes },
    Del { key: String },
    Rename { key: String, new_key: String },
    Keys { pattern: String },
}

impl Command {
    /// Protocol name of the command, used in logs and protocol errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Exists { .. } => "EXISTS",
            Command::StrLen { .. } => "STRLEN",
            Command::Set { .. } => "SET",
            Command::GetRange { .. } => "GETRANGE",
            Command::SetRange { .. } => "SETRANGE",
            Command::Del { .. } => "DEL",
            Command::Rename { .. } => "RENAME",
            Command::Keys { .. } => "KEYS",
        }
    }

    /// Build the wire command understood by the `redis` crate.
    pub fn to_redis(&self) -> ::redis::Cmd {
        let mut cmd = ::redis::cmd(self.name());
        match self {
            Command::Exists { key } | Command::StrLen { key } | Command::Del { key } => {
                cmd.arg(key);
            }
            Command::Set { key, value } => {
                cmd.arg(key).arg(value.as_ref());
            }
            Command::GetRange { key, start, end } => {
                cmd.arg(key).arg(*start).arg(*end);
            }
            Command::SetRange { key, offset, value } => {
                cmd.arg(key).arg(*offset).arg(value.as_ref());
            }
            Command::Rename { key, new_key } => {
                cmd.arg(key).arg(new_key);
            }
            Command::Keys { pattern } => {
                cmd.arg(pattern);
            }
        }
        cmd
    }
}

/// A store reply, decoded from the wire representation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Nil,
    Integer(i64),
    Data(Vec<u8>),
    Status(String),
    List(Vec<Reply>),
    /// A reply type this filesystem never asks for (maps, doubles, ...).
    Unsupported(String),
}

impl Reply {
    /// Short name of the variant, used in protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Nil => "nil",
            Reply::Integer(_) => "integer",
            Reply::Data(_) => "bulk string",
            Reply::Status(_) => "status",
            Reply::List(_) => "array",
            Reply::Unsupported(_) => "unsupported",
        }
    }
}

impl From<::redis::Value> for Reply {
    fn from(value: ::redis::Value) -> Self {
        use ::redis::Value;
        match value {
            Value::Nil => Reply::Nil,
            Value::Int(n) => Reply::Integer(n),
            Value::BulkString(data) => Reply::Data(data),
            Value::SimpleString(s) => Reply::Status(s),
            Value::Okay => Reply::Status("OK".to_string()),
            Value::Array(items) | Value::Set(items) => {
                Reply::List(items.into_iter().map(Reply::from).collect())
            }
            other => Reply::Unsupported(format!("{other:?}")),
        }
    }
}
