//! Single OS thread, blocking sockets, one connection served fully before
//! the next is accepted.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kvcache_store::Storage;

use crate::connection::ConnectionMachine;
use crate::logging::Logger;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn run(
    port: u16,
    storage: &dyn Storage,
    timeout: Duration,
    running: Arc<AtomicBool>,
    log: Logger,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    listener.set_nonblocking(true)?;
    log.info(format!("st_block listening on port {port}"));

    while running.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                log.info(format!("accepted {peer}"));
                if let Err(e) = serve_one(stream, storage, timeout) {
                    log.warn(format!("connection {peer} ended: {e}"));
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => return Err(e.into()),
        }
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
