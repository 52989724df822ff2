//! Store access layer (kvs)
//!
//! Responsibilities:
//! - Own the single connection to the key-value store and run one command at a
//!   time over it (`executor`).
//! - Classify every round trip as success, transport failure, store error or
//!   protocol error, and recover from one transport failure by reconnecting.
//! - Expose the typed primitives the filesystem is built from (`ops`).
//!
//! Submodules:
//! - `command`: command templates and the decoded reply union
//! - `connection`: connector/connection traits
//! - `remote`: Redis backend
//! - `memory`: in-memory backend with fault injection
pub mod command;
pub mod connection;
pub mod error;
pub mod executor;
pub mod memory;
mod ops;
pub mod remote;

pub use command::{Command, Reply};
pub use connection::{Connection, Connector};
pub use error::KvsError;
pub use executor::{Executor, LinkState};
pub use memory::{MemoryConnector, MemoryStore};
pub use remote::{CONNECT_TIMEOUT, RedisConnector};
