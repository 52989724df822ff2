use anyhow::Context;
use clap::Parser;
use log::{error, info};

use redisfs::cli::Cli;
use redisfs::config;
use redisfs::fuse::RedisFs;
use redisfs::fuse::mount::mount_fs;
use redisfs::kvs::{Executor, RedisConnector};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let cfg = config::resolve(cli.config.as_deref(), cli.host, cli.port)?;
    let connector =
        RedisConnector::new(cfg.host.clone(), cfg.port).context("invalid Redis address")?;
    let exec = Executor::connect(connector)
        .await
        .with_context(|| format!("failed to connect to Redis at {}:{}", cfg.host, cfg.port))?;

    let fs = RedisFs::new(exec);
    let mut handle = mount_fs(fs, &cli.mountpoint, cli.privileged, cli.allow_other)
        .await
        .with_context(|| format!("failed to mount on {}", cli.mountpoint.display()))?;

    tokio::select! {
        res = &mut handle => {
            if let Err(e) = res {
                error!("fuse session ended with error: {e}");
                return Err(e).context("fuse session failed");
            }
            info!("unmounted externally");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, unmounting {}", cli.mountpoint.display());
            handle.unmount().await.context("unmount failed")?;
        }
    }

    Ok(())
}
