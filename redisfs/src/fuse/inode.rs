//! Name to inode index for the root directory.
//!
//! The kernel addresses files by inode while the store addresses them by name,
//! so every name handed to the kernel is given a stable number here. Only
//! names are kept; sizes and contents always come from the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

pub const ROOT_INO: u64 = 1;

#[derive(Default)]
struct Tables {
    by_name: HashMap<String, u64>,
    by_ino: HashMap<u64, String>,
}

pub struct InodeTable {
    tables: RwLock<Tables>,
    next: AtomicU64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            next: AtomicU64::new(ROOT_INO + 1),
        }
    }

    /// Inode for `name`, allocating one on first sight.
    pub async fn ino_for(&self, name: &str) -> u64 {
        let known = self.tables.read().await.by_name.get(name).copied();
        if let Some(ino) = known {
            return ino;
        }
        let mut t = self.tables.write().await;
        if let Some(ino) = t.by_name.get(name) {
            return *ino;
        }
        let ino = self.next.fetch_add(1, Ordering::Relaxed);
        t.by_name.insert(name.to_string(), ino);
        t.by_ino.insert(ino, name.to_string());
        ino
    }

    pub async fn name_of(&self, ino: u64) -> Option<String> {
        self.tables.read().await.by_ino.get(&ino).cloned()
    }

    /// Move `from`'s inode to `to`. An inode previously bound to `to` is dropped.
    pub async fn rename(&self, from: &str, to: &str) {
        let mut t = self.tables.write().await;
        if let Some(old) = t.by_name.remove(to) {
            t.by_ino.remove(&old);
        }
        if let Some(ino) = t.by_name.remove(from) {
            t.by_name.insert(to.to_string(), ino);
            t.by_ino.insert(ino, to.to_string());
        }
    }

    pub async fn remove(&self, name: &str) {
        let mut t = self.tables.write().await;
        if let Some(ino) = t.by_name.remove(name) {
            t.by_ino.remove(&ino);
        }
    }
}
