use serial_test::serial;
use std::ops::ControlFlow;

use redisfs::config::{DEFAULT_HOST, DEFAULT_PORT};
use redisfs::fs::{FsError, KvFs};
use redisfs::kvs::{Executor, RedisConnector};

const REG: u32 = libc::S_IFREG as u32 | 0o644;

// Endpoint from REDISFS_HOST / REDISFS_PORT, defaulting to a local server.
async fn get_fs() -> Option<KvFs<RedisConnector>> {
    let host = std::env::var("REDISFS_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = std::env::var("REDISFS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let connector = RedisConnector::new(host, port).ok()?;
    match Executor::connect(connector).await {
        Ok(exec) => Some(KvFs::new(exec)),
        Err(_) => {
            println!("Skipping test - redis not available");
            None
        }
    }
}

fn path(name: &str) -> String {
    format!("/redisfs-test:{name}")
}

async fn cleanup(fs: &KvFs<RedisConnector>, names: &[&str]) {
    for name in names {
        let _ = fs.unlink(&path(name)).await;
    }
}

#[tokio::test]
#[serial]
async fn test_create_write_read() {
    let Some(fs) = get_fs().await else {
        return;
    };
    let f = path("rw");
    cleanup(&fs, &["rw"]).await;

    assert_eq!(fs.getattr(&f).await, Err(FsError::NotFound));
    fs.create(&f, REG, libc::O_WRONLY | libc::O_CREAT).await.unwrap();
    assert_eq!(fs.getattr(&f).await.unwrap().size, 0);

    assert_eq!(fs.write(&f, 0, b"hello world").await.unwrap(), 11);
    assert_eq!(fs.read(&f, 6, 100).await.unwrap(), b"world");
    assert_eq!(fs.read(&f, 11, 10).await.unwrap(), b"");

    fs.write(&f, 20, b"!").await.unwrap();
    let all = fs.read(&f, 0, 64).await.unwrap();
    assert_eq!(all.len(), 21);
    assert!(all[11..20].iter().all(|b| *b == 0));

    cleanup(&fs, &["rw"]).await;
}

#[tokio::test]
#[serial]
async fn test_truncate_and_rename() {
    let Some(fs) = get_fs().await else {
        return;
    };
    let (a, b) = (path("a"), path("b"));
    cleanup(&fs, &["a", "b"]).await;

    fs.mknod(&a, REG, true).await.unwrap();
    fs.write(&a, 0, &[b'*'; 512]).await.unwrap();
    fs.truncate(&a, 1024).await.unwrap();
    assert_eq!(fs.getattr(&a).await.unwrap().size, 1024);
    fs.truncate(&a, 512).await.unwrap();
    assert_eq!(fs.read(&a, 0, 1024).await.unwrap(), vec![b'*'; 512]);
    fs.truncate(&a, 0).await.unwrap();
    assert_eq!(fs.getattr(&a).await.unwrap().size, 0);

    fs.write(&a, 0, b"moved").await.unwrap();
    fs.mknod(&b, REG, false).await.unwrap();
    fs.rename(&a, &b).await.unwrap();
    assert_eq!(fs.getattr(&a).await, Err(FsError::NotFound));
    assert_eq!(fs.read(&b, 0, 16).await.unwrap(), b"moved");

    let mut names = Vec::new();
    fs.readdir("/", |name| {
        names.push(name.to_string());
        ControlFlow::Continue(())
    })
    .await
    .unwrap();
    assert!(names.iter().any(|n| n == "redisfs-test:b"));
    assert!(!names.iter().any(|n| n == "redisfs-test:a"));

    cleanup(&fs, &["a", "b"]).await;
}
