//! Thread-per-connection, blocking sockets, bounded to `workers` concurrent
//! connections by a mutex-guarded counter. Connections accepted while the
//! bound is already saturated are refused immediately rather than queued.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kvcache_store::Storage;

use crate::connection::ConnectionMachine;
use crate::logging::Logger;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(
    port: u16,
    storage: Arc<dyn Storage + Send + Sync>,
    workers: u32,
    timeout: Duration,
    running: Arc<AtomicBool>,
    log: Logger,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    listener.set_nonblocking(true)?;
    log.info(format!("mt_block listening on port {port} with {workers} workers"));

    let current = Arc::new(Mutex::new(0u32));
    let mut handles = Vec::new();

    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                let mut guard = current.lock().unwrap();
                if *guard >= workers {
                    drop(guard);
                    log.warn(format!("refusing {peer}: worker limit reached"));
                    drop(stream);
                    continue;
                }
                *guard += 1;
                drop(guard);

                let storage = storage.clone();
                let current = current.clone();
                handles.push(std::thread::spawn(move || {
                    log.info(format!("accepted {peer}"));
                    if let Err(e) = serve_one(stream, storage.as_ref(), timeout) {
                        log.warn(format!("connection {peer} ended: {e}"));
                    }
                    *current.lock().unwrap() -= 1;
                }));
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(e.into()),
        }
    }

    for h in handles {
        let _ = h.join();
    }
    Ok(())
}

fn serve_one(mut stream: TcpStream, storage: &dyn Storage, timeout: Duration) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(timeout))?;
    let mut machine = ConnectionMachine::new();
    let mut buf = [0u8; 4096];

    loop {
        if machine.wants_read() {
            match stream.read(&mut buf) {
                Ok(0) => machine.mark_closing(),
                Ok(n) => machine.on_readable(&buf[..n], storage),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    machine.mark_closing();
                }
                Err(e) => return Err(e),
            }
        }

        while let Some(chunk) = machine.next_write_chunk() {
            let n = stream.write(&chunk)?;
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
