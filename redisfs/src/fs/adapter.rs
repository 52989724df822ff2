//! Path-based filesystem over a flat key-value namespace.
//!
//! Every handler re-resolves the file by name and talks to the store through
//! the executor; no file or directory handle state is kept between calls.

use std::ops::ControlFlow;

use bytes::Bytes;
use log::{debug, info};

use super::attr::{FileAttr, is_root, key_of};
use super::error::FsError;
use crate::kvs::{Connector, Executor};

/// Single zero byte written at `size - 1` to grow a value; the store fills the gap.
const ZERO: &[u8] = &[0];

fn is_regular(mode: u32) -> bool {
    mode & (libc::S_IFMT as u32) == libc::S_IFREG as u32
}

fn to_offset(offset: u64) -> Result<i64, FsError> {
    i64::try_from(offset).map_err(|_| FsError::InvalidArgument)
}

pub struct KvFs<C: Connector> {
    exec: Executor<C>,
}

impl<C: Connector> KvFs<C> {
    pub fn new(exec: Executor<C>) -> Self {
        Self { exec }
    }

    pub fn executor(&self) -> &Executor<C> {
        &self.exec
    }

    pub async fn init(&self) {
        info!("filesystem initialised on {}", self.exec.connector().endpoint());
    }

    pub async fn destroy(&self) {
        info!("filesystem destroyed");
    }

    /// Root is a synthetic directory; everything else is a regular file whose
    /// size is the current value length.
    pub async fn getattr(&self, path: &str) -> Result<FileAttr, FsError> {
        debug!("getattr path={path}");
        if is_root(path) {
            return Ok(FileAttr::root());
        }
        let key = key_of(path);
        // STRLEN reports 0 for missing keys, so existence is checked first.
        if !self.exec.exists(key).await? {
            return Err(FsError::NotFound);
        }
        let size = self.exec.length(key).await?;
        Ok(FileAttr::file(size))
    }

    /// Same as [`KvFs::getattr`]; there are no open-file handles to consult.
    pub async fn fgetattr(&self, path: &str) -> Result<FileAttr, FsError> {
        self.getattr(path).await
    }

    /// Create an empty regular file.
    pub async fn mknod(&self, path: &str, mode: u32, exclusive: bool) -> Result<(), FsError> {
        debug!("mknod path={path} mode={mode:#o} exclusive={exclusive}");
        if !is_regular(mode) {
            return Err(FsError::InvalidArgument);
        }
        if is_root(path) {
            return Err(FsError::AlreadyExists);
        }
        let key = key_of(path);
        if exclusive && self.exec.exists(key).await? {
            return Err(FsError::AlreadyExists);
        }
        self.exec.set(key, Bytes::new()).await?;
        Ok(())
    }

    /// Create-and-open: exclusive creation with `O_EXCL`, otherwise an open
    /// with `O_CREAT` so an existing file is only emptied under `O_TRUNC`.
    pub async fn create(&self, path: &str, mode: u32, flags: i32) -> Result<(), FsError> {
        debug!("create path={path} mode={mode:#o} flags={flags:#o}");
        if !is_regular(mode) {
            return Err(FsError::InvalidArgument);
        }
        if flags & libc::O_EXCL != 0 {
            self.mknod(path, mode, true).await
        } else {
            self.open(path, flags | libc::O_CREAT).await
        }
    }

    pub async fn open(&self, path: &str, flags: i32) -> Result<(), FsError> {
        debug!("open path={path} flags={flags:#o}");
        if is_root(path) {
            return Err(FsError::IsADirectory);
        }
        let key = key_of(path);
        if !self.exec.exists(key).await? {
            if flags & libc::O_CREAT == 0 {
                return Err(FsError::NotFound);
            }
            self.exec.set(key, Bytes::new()).await?;
        } else if flags & libc::O_TRUNC != 0 {
            self.exec.set(key, Bytes::new()).await?;
        }
        Ok(())
    }

    /// Read up to `size` bytes at `offset`. Fewer bytes near the end of the
    /// file and none past it are normal outcomes.
    pub async fn read(&self, path: &str, offset: u64, size: u32) -> Result<Vec<u8>, FsError> {
        debug!("read path={path} offset={offset} size={size}");
        if is_root(path) {
            return Err(FsError::IsADirectory);
        }
        if size == 0 {
            // GETRANGE k o o-1 would mean "to the end" when o is 0.
            return Ok(Vec::new());
        }
        let start = to_offset(offset)?;
        let end = start
            .checked_add(i64::from(size) - 1)
            .ok_or(FsError::InvalidArgument)?;
        Ok(self.exec.get_range(key_of(path), start, end).await?)
    }

    /// Write `data` at `offset`. Writing past the end zero-fills the gap.
    pub async fn write(&self, path: &str, offset: u64, data: &[u8]) -> Result<usize, FsError> {
        debug!("write path={path} offset={offset} size={}", data.len());
        if is_root(path) {
            return Err(FsError::IsADirectory);
        }
        let offset = to_offset(offset)?;
        if data.is_empty() {
            return Ok(0);
        }
        self.exec
            .set_range(key_of(path), offset, Bytes::copy_from_slice(data))
            .await?;
        Ok(data.len())
    }

    /// Grow or shrink a file to exactly `size` bytes.
    ///
    /// Shrinking reads the kept prefix and overwrites the value with it in a
    /// second round trip; a concurrent writer between the two can lose its
    /// write or undo the truncation.
    pub async fn truncate(&self, path: &str, size: u64) -> Result<(), FsError> {
        debug!("truncate path={path} size={size}");
        if is_root(path) {
            return Err(FsError::IsADirectory);
        }
        let key = key_of(path);
        if !self.exec.exists(key).await? {
            return Err(FsError::NotFound);
        }
        let current = self.exec.length(key).await?;
        if size == current {
            return Ok(());
        }
        if size > current {
            self.exec
                .set_range(key, to_offset(size - 1)?, Bytes::from_static(ZERO))
                .await?;
        } else if size == 0 {
            self.exec.set(key, Bytes::new()).await?;
        } else {
            let head = self.exec.get_range(key, 0, to_offset(size - 1)?).await?;
            self.exec.set(key, head).await?;
        }
        Ok(())
    }

    /// Same as [`KvFs::truncate`]; the file is addressed by name.
    pub async fn ftruncate(&self, path: &str, size: u64) -> Result<(), FsError> {
        self.truncate(path, size).await
    }

    /// Rename `from` to `to`, replacing `to` if it exists.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        debug!("rename path={from} newpath={to}");
        self.exec.rename(key_of(from), key_of(to)).await?;
        Ok(())
    }

    pub async fn unlink(&self, path: &str) -> Result<(), FsError> {
        debug!("unlink path={path}");
        if is_root(path) {
            return Err(FsError::IsADirectory);
        }
        if !self.exec.delete(key_of(path)).await? {
            return Err(FsError::NotFound);
        }
        Ok(())
    }

    pub async fn opendir(&self, path: &str) -> Result<(), FsError> {
        debug!("opendir path={path}");
        if is_root(path) {
            return Ok(());
        }
        if self.exec.exists(key_of(path)).await? {
            Err(FsError::NotADirectory)
        } else {
            Err(FsError::NotFound)
        }
    }

    /// Feed every file name to `sink`, stopping with
    /// [`FsError::OutOfResources`] as soon as it breaks.
    ///
    /// The whole key set is fetched in one round trip before delivery starts.
    pub async fn readdir<F>(&self, path: &str, mut sink: F) -> Result<(), FsError>
    where
        F: FnMut(&str) -> ControlFlow<()>,
    {
        debug!("readdir path={path}");
        if !is_root(path) {
            return Err(FsError::NotADirectory);
        }
        let names = self.exec.list_keys().await?;
        for name in &names {
            if sink(name).is_break() {
                debug!("readdir sink full after {name}");
                return Err(FsError::OutOfResources);
            }
        }
        Ok(())
    }

    pub async fn access(&self, path: &str, mask: u32) -> Result<(), FsError> {
        debug!("access path={path} mask={mask:#o}");
        Ok(())
    }

    pub async fn flush(&self, path: &str) -> Result<(), FsError> {
        debug!("flush path={path}");
        Ok(())
    }

    pub async fn release(&self, path: &str) -> Result<(), FsError> {
        debug!("release path={path}");
        Ok(())
    }

    pub async fn fsync(&self, path: &str) -> Result<(), FsError> {
        debug!("fsync path={path}");
        Ok(())
    }

    pub async fn releasedir(&self, path: &str) -> Result<(), FsError> {
        debug!("releasedir path={path}");
        Ok(())
    }

    pub async fn fsyncdir(&self, path: &str) -> Result<(), FsError> {
        debug!("fsyncdir path={path}");
        Ok(())
    }

    // The namespace is flat and attribute-less: everything below is refused.

    pub async fn readlink(&self, path: &str) -> Result<String, FsError> {
        unsupported("readlink", path)
    }

    pub async fn mkdir(&self, path: &str, _mode: u32) -> Result<(), FsError> {
        unsupported("mkdir", path)
    }

    pub async fn rmdir(&self, path: &str) -> Result<(), FsError> {
        unsupported("rmdir", path)
    }

    pub async fn symlink(&self, _target: &str, link: &str) -> Result<(), FsError> {
        unsupported("symlink", link)
    }

    pub async fn link(&self, path: &str, _new_path: &str) -> Result<(), FsError> {
        unsupported("link", path)
    }

    pub async fn chmod(&self, path: &str, _mode: u32) -> Result<(), FsError> {
        unsupported("chmod", path)
    }

    pub async fn chown(&self, path: &str, _uid: Option<u32>, _gid: Option<u32>) -> Result<(), FsError> {
        unsupported("chown", path)
    }

    pub async fn utimens(&self, path: &str) -> Result<(), FsError> {
        unsupported("utimens", path)
    }

    pub async fn statfs(&self, path: &str) -> Result<(), FsError> {
        unsupported("statfs", path)
    }

    pub async fn xattr(&self, path: &str) -> Result<(), FsError> {
        unsupported("xattr", path)
    }
}

fn unsupported<T>(op: &str, path: &str) -> Result<T, FsError> {
    debug!("{op} path={path}: not supported");
    Err(FsError::NotSupported)
}
