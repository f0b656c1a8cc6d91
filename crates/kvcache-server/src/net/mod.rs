//! Four connection-handling backends, one per deployment profile. Each
//! drives [`crate::connection::ConnectionMachine`] against real sockets;
//! the state machine itself stays ignorant of which backend is running it.

pub mod mt_block;
pub mod mt_nonblock;
pub mod st_block;
pub mod st_nonblock;

/// A `SIGTERM` listener for the two Tokio-based backends, so the accept loop
/// can be raced against it with `tokio::select!` the same way the blocking
/// backends poll their `AtomicBool`. `ctrl_c()` (`SIGINT`) is awaited
/// separately since it's portable; `SIGTERM` is unix-only.
#[cfg(unix)]
pub(crate) fn terminate_signal() -> std::io::Result<tokio::signal::unix::Signal> {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
}

#[cfg(not(unix))]
pub(crate) fn terminate_signal() -> std::io::Result<crate::net::NeverSignal> {
    Ok(crate::net::NeverSignal)
}

#[cfg(not(unix))]
pub(crate) struct NeverSignal;

#[cfg(not(unix))]
impl NeverSignal {
    pub(crate) async fn recv(&mut self) -> Option<()> {
        std::future::pending().await
    }
}
