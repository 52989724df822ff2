//! Mount helpers for starting/stopping FUSE
//!
//! Notes:
//! - Only supported on Unix-like systems. On Linux the default is an
//!   unprivileged mount via fusermount3; a privileged mount needs root.
//! - These helpers are thin wrappers over rfuse3 raw Session APIs.

use std::path::Path;

use log::info;
use rfuse3::MountOptions;
use rfuse3::raw::{MountHandle, Session};

use super::RedisFs;
use crate::kvs::Connector;

pub const FS_NAME: &str = "redisfs";

/// Default mount options: fs name, and files owned by the daemon's user.
pub fn default_mount_options(allow_other: bool) -> MountOptions {
    let uid = unsafe { libc::getuid() };
    let gid = unsafe { libc::getgid() };

    let mut mo = MountOptions::default();
    mo.fs_name(FS_NAME).uid(uid).gid(gid);
    if allow_other {
        mo.allow_other(true);
    }
    mo
}

/// Mount `fs` on an existing directory. The returned handle resolves when the
/// filesystem is unmounted.
#[cfg(target_os = "linux")]
pub async fn mount_fs<C>(
    fs: RedisFs<C>,
    mount_point: impl AsRef<Path>,
    privileged: bool,
    allow_other: bool,
) -> std::io::Result<MountHandle>
where
    C: Connector + 'static,
{
    let mount_point = mount_point.as_ref();
    let session = Session::new(default_mount_options(allow_other));
    info!(
        "mounting {FS_NAME} at {} ({})",
        mount_point.display(),
        if privileged { "privileged" } else { "unprivileged" }
    );
    if privileged {
        session.mount(fs, mount_point).await
    } else {
        session.mount_with_unprivileged(fs, mount_point).await
    }
}

/// Fallback stub for non-Linux targets.
#[cfg(not(target_os = "linux"))]
pub async fn mount_fs<C>(
    _fs: RedisFs<C>,
    _mount_point: impl AsRef<Path>,
    _privileged: bool,
    _allow_other: bool,
) -> std::io::Result<MountHandle>
where
    C: Connector + 'static,
{
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "FUSE mount is only supported on Linux in this build",
    ))
}
