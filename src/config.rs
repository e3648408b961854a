//! Process configuration, read from flags or the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::db::StoreOptions;
use crate::logging::LogFormat;
use crate::server::MuxOptions;

#[derive(Debug, Clone, Parser)]
#[command(name = "mustang", version, about = "Mustang record service")]
pub struct Config {
    /// Port shared by the gRPC and HTTP/1 listeners.
    #[arg(long, env = "PORT")]
    pub port: u16,

    #[arg(long, env = "MUSTANG_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// SQLite database file; `:memory:` keeps everything in memory.
    #[arg(long, env = "MUSTANG_DATABASE_PATH", default_value = "mustang.db")]
    pub database_path: PathBuf,

    /// Database connections; ignored for `:memory:`.
    #[arg(
        long,
        env = "MUSTANG_DB_POOL_SIZE",
        default_value_t = 4,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub db_pool_size: u32,

    /// Time a database call waits for a connection or a write lock.
    #[arg(long, env = "MUSTANG_DB_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub db_busy_timeout_ms: u64,

    /// Concurrently open connections across both protocols.
    #[arg(
        long,
        env = "MUSTANG_MAX_CONNECTIONS",
        default_value_t = 1024,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_connections: u32,

    /// Time allowed for a new connection to identify its protocol.
    #[arg(long, env = "MUSTANG_SNIFF_TIMEOUT_MS", default_value_t = 5000)]
    pub sniff_timeout_ms: u64,

    #[arg(long, env = "MUSTANG_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            pool_size: self.db_pool_size as usize,
            busy_timeout: Duration::from_millis(self.db_busy_timeout_ms),
        }
    }

    pub fn mux_options(&self) -> MuxOptions {
        MuxOptions {
            max_connections: self.max_connections as usize,
            sniff_timeout: Duration::from_millis(self.sniff_timeout_ms),
            ..MuxOptions::default()
        }
    }
}
