//! Top-level server facade: resolves the configured storage and network
//! backends and runs until a termination signal arrives.

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kvcache_store::{SimpleLru, Storage, ThreadSafeLru};

use crate::config::{Config, NetworkKind, StorageKind};
use crate::logging::LoggingService;
use crate::net;

/// Run the server to completion. Returns an error if the requested
/// storage/network combination is unsatisfiable (a `!Sync` store can't
/// back a multi-threaded network backend) or if the backend itself fails.
pub fn run(cfg: Config, logging: &dyn LoggingService) -> anyhow::Result<()> {
    let log = logging.select("server");

    match cfg.network {
        NetworkKind::StBlock => {
            let storage = build_unsync_storage(cfg.storage, cfg.max_bytes)?;
            let running = install_signal_flag()?;
            net::st_block::run(cfg.port, storage.as_ref(), cfg.timeout, running, log)
        }
        NetworkKind::StNonblock => {
            let storage: Rc<dyn Storage> = build_rc_storage(cfg.storage, cfg.max_bytes)?;
            net::st_nonblock::run(cfg.port, storage, cfg.timeout, log)
        }
        NetworkKind::MtBlock => {
            let storage = build_sync_storage(cfg.storage, cfg.max_bytes)?;
            let running = install_signal_flag()?;
            net::mt_block::run(cfg.port, storage, cfg.workers, cfg.timeout, running, log)
        }
        NetworkKind::MtNonblock => {
            let storage = build_sync_storage(cfg.storage, cfg.max_bytes)?;
            net::mt_nonblock::run(cfg.port, storage, cfg.workers, cfg.timeout, log)
        }
    }
}

fn build_unsync_storage(kind: StorageKind, max_bytes: usize) -> anyhow::Result<Box<dyn Storage>> {
    match kind {
        StorageKind::StLru => Ok(Box::new(SimpleLru::new(max_bytes))),
        StorageKind::MtLru => Ok(Box::new(ThreadSafeLru::new(max_bytes))),
    }
}

fn build_rc_storage(kind: StorageKind, max_bytes: usize) -> anyhow::Result<Rc<dyn Storage>> {
    match kind {
        StorageKind::StLru => Ok(Rc::new(SimpleLru::new(max_bytes))),
        StorageKind::MtLru => Ok(Rc::new(ThreadSafeLru::new(max_bytes))),
    }
}

fn build_sync_storage(
    kind: StorageKind,
    max_bytes: usize,
) -> anyhow::Result<Arc<dyn Storage + Send + Sync>> {
    match kind {
        StorageKind::StLru => anyhow::bail!(
            "storage kind st-lru is not Sync and cannot back a multi-threaded network backend; pick mt-lru"
        ),
        StorageKind::MtLru => Ok(Arc::new(ThreadSafeLru::new(max_bytes))),
    }
}

/// `true` while the server should keep accepting connections; flipped to
/// `false` by a background thread on SIGINT/SIGTERM.
fn install_signal_flag() -> anyhow::Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, flag.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, flag.clone())?;

    let running_clone = running.clone();
    std::thread::spawn(move || loop {
        if flag.load(Ordering::Relaxed) {
            running_clone.store(false, Ordering::Relaxed);
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    });

    Ok(running)
}
