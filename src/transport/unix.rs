//! Unix domain socket transport.
//!
//! Bytes and descriptors travel together through `sendmsg`/`recvmsg` with
//! `SCM_RIGHTS` control messages. The socket is driven by tokio readiness:
//! every syscall runs inside `UnixStream::try_io`, so a `WouldBlock` clears
//! the cached readiness instead of spinning.
//!
//! # Example
//!
//! ```ignore
//! use waywire_client::transport::UnixTransport;
//!
//! let transport = UnixTransport::connect("/run/user/1000/wayland-0".as_ref()).await?;
//! ```

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::Path;
use std::time::Duration;

use tokio::io::Interest;
use tokio::net::UnixStream;

use super::{BoxFuture, Transport};
use crate::error::{Result, WaywireError};

/// Most descriptors accepted from a single `recvmsg`.
pub const MAX_FDS_PER_RECV: usize = 28;

const FD_SIZE: usize = mem::size_of::<RawFd>();

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL | libc::MSG_DONTWAIT;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = libc::MSG_DONTWAIT;

#[cfg(any(target_os = "linux", target_os = "android"))]
const RECV_FLAGS: libc::c_int = libc::MSG_CMSG_CLOEXEC | libc::MSG_DONTWAIT;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const RECV_FLAGS: libc::c_int = libc::MSG_DONTWAIT;

/// Connected Unix stream socket.
#[derive(Debug)]
pub struct UnixTransport {
    stream: UnixStream,
}

impl UnixTransport {
    /// Connect to a compositor socket.
    pub async fn connect(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| WaywireError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!("Connected to {}", path.display());
        Ok(Self { stream })
    }

    /// Wrap an already connected tokio stream.
    pub fn from_stream(stream: UnixStream) -> Self {
        Self { stream }
    }

    /// Wrap an already connected std stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_std(stream: std::os::unix::net::UnixStream) -> Result<Self> {
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream: UnixStream::from_std(stream)?,
        })
    }

    /// Create a connected pair, one end per side.
    pub fn pair() -> Result<(Self, Self)> {
        let (a, b) = UnixStream::pair()?;
        Ok((Self { stream: a }, Self { stream: b }))
    }

    /// Get a reference to the underlying stream.
    pub fn inner(&self) -> &UnixStream {
        &self.stream
    }
}

impl Transport for UnixTransport {
    fn send<'a>(&'a self, data: &'a [u8], fds: &'a [OwnedFd]) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(async move {
            let sock = self.stream.as_raw_fd();
            loop {
                self.stream.writable().await?;
                match self
                    .stream
                    .try_io(Interest::WRITABLE, || send_with_fds(sock, data, fds))
                {
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                    other => return other,
                }
            }
        })
    }

    fn readable(&self, timeout: Duration) -> BoxFuture<'_, io::Result<bool>> {
        Box::pin(async move {
            match tokio::time::timeout(timeout, self.stream.readable()).await {
                Ok(ready) => ready.map(|()| true),
                Err(_) => Ok(false),
            }
        })
    }

    fn try_recv(&self, buf: &mut [u8], fds: &mut Vec<OwnedFd>) -> io::Result<usize> {
        let sock = self.stream.as_raw_fd();
        self.stream
            .try_io(Interest::READABLE, || recv_with_fds(sock, buf, fds))
    }

    fn shutdown(&self) -> io::Result<()> {
        // SAFETY: the descriptor is owned by `self.stream` and still open.
        let rc = unsafe { libc::shutdown(self.stream.as_raw_fd(), libc::SHUT_RDWR) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            // Already disconnected by the peer
            if err.raw_os_error() != Some(libc::ENOTCONN) {
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Send `data` with every descriptor in `fds` attached as one `SCM_RIGHTS`
/// control message.
///
/// The kernel installs new descriptors in the receiver; the ones in `fds`
/// stay open in this process until their owner drops them.
fn send_with_fds(sock: RawFd, data: &[u8], fds: &[OwnedFd]) -> io::Result<usize> {
    let mut iov = libc::iovec {
        iov_base: data.as_ptr() as *mut libc::c_void,
        iov_len: data.len(),
    };

    let fd_bytes = fds.len() * FD_SIZE;
    let cmsg_space = if fds.is_empty() {
        0
    } else {
        // SAFETY: pure size computation.
        unsafe { libc::CMSG_SPACE(fd_bytes as u32) as usize }
    };
    // u64 backing keeps the control buffer aligned for cmsghdr
    let mut cmsg_buf = vec![0u64; cmsg_space.div_ceil(mem::size_of::<u64>())];

    // SAFETY: msghdr is plain data; all-zero is a valid empty header.
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;

    if !fds.is_empty() {
        msg.msg_control = cmsg_buf.as_mut_ptr().cast();
        msg.msg_controllen = cmsg_space as _;

        // SAFETY: the control buffer is CMSG_SPACE(fd_bytes) long and aligned,
        // so the first header and its data area are in bounds.
        unsafe {
            let cmsg = libc::CMSG_FIRSTHDR(&msg);
            (*cmsg).cmsg_level = libc::SOL_SOCKET;
            (*cmsg).cmsg_type = libc::SCM_RIGHTS;
            (*cmsg).cmsg_len = libc::CMSG_LEN(fd_bytes as u32) as _;
            let data_ptr = libc::CMSG_DATA(cmsg).cast::<RawFd>();
            for (i, fd) in fds.iter().enumerate() {
                data_ptr.add(i).write_unaligned(fd.as_raw_fd());
            }
        }
    }

    // SAFETY: msg points at live buffers for the duration of the call.
    let n = unsafe { libc::sendmsg(sock, &msg, SEND_FLAGS) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(n as usize)
}

/// Receive into `buf`, appending any descriptors that arrived with the data.
fn recv_with_fds(sock: RawFd, buf: &mut [u8], fds: &mut Vec<OwnedFd>) -> io::Result<usize> {
    let mut iov = libc::iovec {
        iov_base: buf.as_mut_ptr().cast(),
        iov_len: buf.len(),
    };

    // SAFETY: pure size computation.
    let cmsg_space = unsafe { libc::CMSG_SPACE((MAX_FDS_PER_RECV * FD_SIZE) as u32) as usize };
    let mut cmsg_buf = vec![0u64; cmsg_space.div_ceil(mem::size_of::<u64>())];

    // SAFETY: msghdr is plain data; all-zero is a valid empty header.
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = cmsg_buf.as_mut_ptr().cast();
    msg.msg_controllen = cmsg_space as _;

    // SAFETY: msg points at live, writable buffers of the advertised sizes.
    let n = unsafe { libc::recvmsg(sock, &mut msg, RECV_FLAGS) };
    if n < 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: the kernel filled msg_control with well-formed headers; every
    // SCM_RIGHTS descriptor is newly installed and owned by us.
    unsafe {
        let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
        while !cmsg.is_null() {
            if (*cmsg).cmsg_level == libc::SOL_SOCKET && (*cmsg).cmsg_type == libc::SCM_RIGHTS {
                let data_ptr = libc::CMSG_DATA(cmsg).cast::<RawFd>();
                let count = ((*cmsg).cmsg_len as usize - libc::CMSG_LEN(0) as usize) / FD_SIZE;
                for i in 0..count {
                    fds.push(OwnedFd::from_raw_fd(data_ptr.add(i).read_unaligned()));
                }
            }
            cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
        }
    }

    if msg.msg_flags & libc::MSG_CTRUNC != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "ancillary data truncated, descriptors were lost",
        ));
    }

    Ok(n as usize)
}
