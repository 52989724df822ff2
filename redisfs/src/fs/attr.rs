//! Synthesized file attributes and path helpers.

/// Block size reported to the host. Arbitrary: the store has no blocks.
pub const BLOCK_SIZE: u64 = 512;

/// Everyone may read, write and execute; permissions are not enforced.
pub const DEFAULT_PERM: u16 = 0o777;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Directory,
    RegularFile,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileAttr {
    pub kind: FileKind,
    pub size: u64,
    pub perm: u16,
}

impl FileAttr {
    pub fn root() -> Self {
        Self {
            kind: FileKind::Directory,
            size: 0,
            perm: DEFAULT_PERM,
        }
    }

    pub fn file(size: u64) -> Self {
        Self {
            kind: FileKind::RegularFile,
            size,
            perm: DEFAULT_PERM,
        }
    }

    pub fn blocks(&self) -> u64 {
        self.size.div_ceil(BLOCK_SIZE)
    }
}

pub fn is_root(path: &str) -> bool {
    path == "/"
}

/// Store key for a path: the file name without the leading separator.
pub fn key_of(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Path for a file name in the root directory.
pub fn path_of(name: &str) -> String {
    format!("/{name}")
}
