//! Transport module - the raw byte and descriptor channel.
//!
//! [`Transport`] is the I/O strategy a connection is built on, chosen once
//! when the connection is created. [`UnixTransport`] is the Unix domain
//! socket implementation; anything else (an in-process pipe, a recording
//! transport) plugs in the same way.

use std::future::Future;
use std::io;
use std::os::fd::OwnedFd;
use std::pin::Pin;
use std::time::Duration;

mod path;
mod unix;

pub use path::{
    resolve_socket_path, socket_path_from_env, DEFAULT_DISPLAY, DISPLAY_ENV, RUNTIME_DIR_ENV,
};
pub use unix::{UnixTransport, MAX_FDS_PER_RECV};

/// Boxed future returned by transport operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Byte stream with out-of-band descriptor passing.
pub trait Transport: Send + Sync + 'static {
    /// Send `data` with `fds` attached to the first byte.
    ///
    /// Returns the number of bytes written, which may be less than
    /// `data.len()`. Descriptors are sent with the first successful write.
    fn send<'a>(&'a self, data: &'a [u8], fds: &'a [OwnedFd]) -> BoxFuture<'a, io::Result<usize>>;

    /// Wait up to `timeout` for input. Returns whether the channel is readable.
    fn readable(&self, timeout: Duration) -> BoxFuture<'_, io::Result<bool>>;

    /// Receive without blocking, appending received descriptors to `fds`.
    ///
    /// Returns `WouldBlock` when nothing is pending and `Ok(0)` once the
    /// peer has closed the channel.
    fn try_recv(&self, buf: &mut [u8], fds: &mut Vec<OwnedFd>) -> io::Result<usize>;

    /// Shut both directions down. Pending and future I/O fails.
    fn shutdown(&self) -> io::Result<()>;
}
