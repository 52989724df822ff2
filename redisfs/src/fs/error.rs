use thiserror::Error;

use crate::kvs::KvsError;

/// Failure of a filesystem operation, as seen by the host interface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("no such file")]
    NotFound,

    #[error("file exists")]
    AlreadyExists,

    #[error("is a directory")]
    IsADirectory,

    #[error("not a directory")]
    NotADirectory,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("operation not supported")]
    NotSupported,

    /// The directory listing sink ran out of room.
    #[error("directory buffer full")]
    OutOfResources,

    #[error(transparent)]
    Io(#[from] KvsError),
}

impl FsError {
    /// POSIX error number for this failure.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::IsADirectory => libc::EISDIR,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::InvalidArgument => libc::EINVAL,
            FsError::NotSupported => libc::ENOSYS,
            FsError::OutOfResources => libc::ENOMEM,
            FsError::Io(_) => libc::EIO,
        }
    }

    /// Signed status in the host callback convention: negative errno.
    pub fn status(&self) -> i32 {
        -self.errno()
    }

    /// The store link is gone and the process cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FsError::Io(KvsError::Unavailable(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(FsError::NotFound.status(), -libc::ENOENT);
        assert_eq!(FsError::OutOfResources.errno(), libc::ENOMEM);
        assert_eq!(FsError::NotSupported.errno(), libc::ENOSYS);

        let store = FsError::from(KvsError::Store("WRONGTYPE".into()));
        assert_eq!(store.errno(), libc::EIO);
        assert!(!store.is_fatal());

        let protocol = FsError::from(KvsError::Protocol {
            command: "STRLEN",
            expected: "integer",
            got: "array",
        });
        assert_eq!(protocol.errno(), libc::EIO);

        assert!(FsError::from(KvsError::Unavailable("gone".into())).is_fatal());
    }
}
