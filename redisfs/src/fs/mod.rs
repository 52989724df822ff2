//! Filesystem semantics over the store (fs)
//!
//! The namespace is one directory, `/`, whose entries are the store's keys.
//! A file's content is the key's value and its size is the value length.
//! Handlers are path based and keep no per-file state.
pub mod adapter;
pub mod attr;
pub mod error;

pub use adapter::KvFs;
pub use attr::{BLOCK_SIZE, DEFAULT_PERM, FileAttr, FileKind};
pub use error::FsError;
