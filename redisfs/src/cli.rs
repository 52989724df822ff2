use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "redisfs", version, about = "Mount a Redis keyspace as a flat directory")]
pub struct Cli {
    /// Empty directory to mount on
    pub mountpoint: PathBuf,

    /// Redis host [default: 127.0.0.1]
    #[arg(long, env = "REDISFS_HOST")]
    pub host: Option<String>,

    /// Redis port [default: 6379]
    #[arg(short, long, env = "REDISFS_PORT")]
    pub port: Option<u16>,

    /// YAML file with `host` and `port`
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Mount directly instead of through fusermount3
    #[arg(long)]
    pub privileged: bool,

    /// Let other users access the mount
    #[arg(long)]
    pub allow_other: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let cli = Cli::try_parse_from(["redisfs", "--host", "10.0.0.2", "-p", "7000", "/mnt/r"])
            .unwrap();
        assert_eq!(cli.mountpoint, PathBuf::from("/mnt/r"));
        assert_eq!(cli.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(cli.port, Some(7000));
        assert!(!cli.privileged);
    }

    #[test]
    fn test_mountpoint_required() {
        assert!(Cli::try_parse_from(["redisfs", "--privileged"]).is_err());
    }
}
