// Library crate for redisfs: a flat FUSE filesystem whose files are Redis keys.
pub mod cli;
pub mod config;
pub mod fs;
pub mod fuse;
pub mod kvs;
