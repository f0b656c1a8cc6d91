//! Tokio `multi_thread` runtime: connections distributed across `workers`
//! OS threads, backed by a `Send + Sync` store.

use std::sync::Arc;
use std::time::Duration;

use kvcache_store::Storage;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::connection::ConnectionMachine;
use crate::logging::Logger;

pub fn run(
    port: u16,
    storage: Arc<dyn Storage + Send + Sync>,
    workers: u32,
    timeout: Duration,
    log: Logger,
) -> anyhow::Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers.max(1) as usize)
        .enable_all()
        .build()?;
    rt.block_on(async move {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        log.info(format!("mt_nonblock listening on port {port} with {workers} worker threads"));
        let mut sigterm = crate::net::terminate_signal()?;
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    log.info(format!("accepted {peer}"));
                    let storage = storage.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_one(stream, storage.as_ref(), timeout).await {
                            log.warn(format!("connection {peer} ended: {e}"));
                        }
                    });
                }
                _ = sigterm.recv() => {
                    log.info("shutdown signal received, stopping accept loop".to_string());
                    return Ok(());
                }
                _ = tokio::signal::ctrl_c() => {
                    log.info("ctrl-c received, stopping accept loop".to_string());
                    return Ok(());
                }
            }
        }
    })
}

async fn serve_one(
    mut stream: TcpStream,
    storage: &(dyn Storage + Send + Sync),
    timeout: Duration,
) -> anyhow::Result<()> {
    let mut machine = ConnectionMachine::new();
    let mut buf = [0u8; 4096];

    loop {
        if machine.wants_read() {
            match tokio::time::timeout(timeout, stream.read(&mut buf)).await {
                Ok(Ok(0)) => machine.mark_closing(),
                Ok(Ok(n)) => machine.on_readable(&buf[..n], storage),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => machine.mark_closing(), // idle timeout
            }
        }

        while let Some(chunk) = machine.next_write_chunk() {
            let n = stream.write(&chunk).await?;
            if n == 0 {
                return Ok(());
            }
            machine.advance_write(n);
        }

        if machine.is_done() || (!machine.wants_read() && !machine.wants_write()) {
            return Ok(());
        }
    }
}
