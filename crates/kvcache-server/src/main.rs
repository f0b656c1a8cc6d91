#[cfg(feature = "alloc_mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kvcache_server::config::{Cli, Config};
use kvcache_server::logging::TracingLoggingService;
use kvcache_server::server;

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = Config::from(cli);
    let logging = TracingLoggingService;

    match server::run(cfg, &logging) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
