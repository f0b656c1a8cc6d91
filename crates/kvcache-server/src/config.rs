use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Which [`kvcache_store::Storage`] backend to construct.
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum StorageKind {
    /// Unsynchronized store, one worker at a time.
    StLru,
    /// `parking_lot::Mutex`-guarded store, safe to share across threads.
    MtLru,
}

/// Which connection-handling backend to run.
#[derive(Copy, Clone, Debug, ValueEnum, PartialEq, Eq)]
pub enum NetworkKind {
    /// Single thread, blocking sockets, one connection at a time.
    StBlock,
    /// Thread-per-connection, blocking sockets, bounded by `workers`.
    MtBlock,
    /// Single OS thread, a Tokio `current_thread` runtime multiplexing all
    /// connections cooperatively.
    StNonblock,
    /// Tokio `multi_thread` runtime, connections distributed across
    /// `workers` OS threads.
    MtNonblock,
}

/// Command-line surface for `kvcache-server`.
#[derive(Parser, Debug, Clone)]
#[command(name = "kvcache-server", about = "Bounded LRU key/value cache server")]
pub struct Cli {
    #[arg(long, value_enum, env = "KVCACHE_STORAGE", default_value = "st-lru")]
    pub storage: StorageKind,

    #[arg(long, value_enum, env = "KVCACHE_NETWORK", default_value = "st-block")]
    pub network: NetworkKind,

    #[arg(long, env = "KVCACHE_WORKERS", default_value_t = 4)]
    pub workers: u32,

    #[arg(long, env = "KVCACHE_ACCEPTORS", default_value_t = 1)]
    pub acceptors: u32,

    /// Per-connection idle timeout, in milliseconds.
    #[arg(long, env = "KVCACHE_TIMEOUT_MS", default_value_t = 5_000)]
    pub timeout: u64,

    #[arg(long, env = "KVCACHE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Store capacity: sum of key+value bytes it may hold at once. See
    /// DESIGN.md for how the default was chosen.
    #[arg(long, env = "KVCACHE_MAX_BYTES", default_value_t = 64 * 1024 * 1024)]
    pub max_bytes: usize,
}

impl Cli {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

/// Resolved server configuration, handed to the harness.
#[derive(Clone, Debug)]
pub struct Config {
    pub storage: StorageKind,
    pub network: NetworkKind,
    pub workers: u32,
    pub acceptors: u32,
    pub timeout: Duration,
    pub port: u16,
    pub max_bytes: usize,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            storage: cli.storage,
            network: cli.network,
            workers: cli.workers,
            acceptors: cli.acceptors,
            timeout: cli.timeout_duration(),
            port: cli.port,
            max_bytes: cli.max_bytes,
        }
    }
}
