//! Buffered transport: the framed byte channel a connection talks through.
//!
//! Requests are encoded into an in-memory outbound buffer by any number of
//! callers; `flush` ships the whole buffer (and every queued descriptor) in
//! order and then polls for input, draining what is readable into the
//! inbound buffer.
//!
//! # Locking
//!
//! ```text
//! marshal (any thread) ─► Mutex<MessageWriter> ─┐
//!                                               ├─► flush: Semaphore(1) ─► sendmsg
//! dispatch (one at a time) ◄─ Mutex<MessageReader> ◄─ recvmsg
//! ```
//!
//! A message is appended to the outbound buffer under one lock acquisition,
//! so messages from concurrent callers never interleave on the wire.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::codec::{MessageReader, MessageWriter};
use crate::error::{Result, WaywireError};
use crate::transport::Transport;

/// Size of each receive chunk.
const RECV_CHUNK: usize = 4096;

/// Buffered transport shared by a connection's writers and its dispatcher.
pub struct Wire {
    transport: Box<dyn Transport>,
    outbound: Mutex<MessageWriter>,
    send_permit: Semaphore,
    inbound: tokio::sync::Mutex<MessageReader>,
    closed: AtomicBool,
    peer_closed: AtomicBool,
}

impl Wire {
    /// Wrap a transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            outbound: Mutex::new(MessageWriter::new()),
            send_permit: Semaphore::new(1),
            inbound: tokio::sync::Mutex::new(MessageReader::new()),
            closed: AtomicBool::new(false),
            peer_closed: AtomicBool::new(false),
        }
    }

    /// Whether `close` has been called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(WaywireError::ConnectionClosed);
        }
        Ok(())
    }

    fn outbound(&self) -> MutexGuard<'_, MessageWriter> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `encode` against the outbound buffer.
    ///
    /// Nothing is sent until the next [`flush`](Self::flush).
    pub fn queue<R>(&self, encode: impl FnOnce(&mut MessageWriter) -> Result<R>) -> Result<R> {
        self.check_open()?;
        encode(&mut self.outbound())
    }

    /// Number of encoded bytes waiting to be sent.
    pub fn pending_bytes(&self) -> usize {
        self.outbound().len()
    }

    /// Send everything queued, then wait up to `timeout` for input.
    ///
    /// Returns the number of received bytes not yet consumed by the decoder
    /// (0 when nothing arrived). Peer closure is reported as
    /// [`WaywireError::ConnectionClosed`] once no complete message is left.
    pub async fn flush(&self, timeout: Duration) -> Result<usize> {
        self.check_open()?;
        self.send_pending().await?;
        self.receive(timeout).await
    }

    /// Send everything queued without waiting for input.
    pub async fn send_pending(&self) -> Result<()> {
        self.check_open()?;
        let _permit = self
            .send_permit
            .acquire()
            .await
            .map_err(|_| WaywireError::ConnectionClosed)?;

        let (bytes, fds) = self.outbound().take();
        if bytes.is_empty() {
            return Ok(());
        }

        let mut offset = 0;
        let mut attached: &[std::os::fd::OwnedFd] = &fds;
        while offset < bytes.len() {
            let written = self.transport.send(&bytes[offset..], attached).await?;
            if written == 0 {
                return Err(WaywireError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "sendmsg wrote 0 bytes",
                )));
            }
            offset += written;
            attached = &[];
        }

        tracing::trace!("Sent {} bytes, {} fds", bytes.len(), fds.len());
        Ok(())
    }

    async fn receive(&self, timeout: Duration) -> Result<usize> {
        let mut reader = self.inbound.lock().await;

        // Nothing more will arrive, so a trailing partial message is dead
        if self.peer_closed.load(Ordering::Acquire) {
            return match reader.has_message() {
                true => Ok(reader.remaining()),
                false => Err(WaywireError::ConnectionClosed),
            };
        }

        if !self.transport.readable(timeout).await? {
            return Ok(reader.remaining());
        }

        let mut chunk = [0u8; RECV_CHUNK];
        let mut received = 0;
        loop {
            let mut fds = Vec::new();
            match self.transport.try_recv(&mut chunk, &mut fds) {
                Ok(0) => {
                    self.peer_closed.store(true, Ordering::Release);
                    tracing::debug!("Peer closed the connection");
                    if !reader.has_message() {
                        return Err(WaywireError::ConnectionClosed);
                    }
                    break;
                }
                Ok(n) => {
                    reader.extend(&chunk[..n]);
                    reader.push_fds(fds);
                    received += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(WaywireError::Io(e)),
            }
        }

        tracing::trace!("Received {} bytes", received);
        Ok(reader.remaining())
    }

    /// Lock the inbound buffer for decoding.
    pub async fn inbound(&self) -> tokio::sync::MutexGuard<'_, MessageReader> {
        self.inbound.lock().await
    }

    /// Close the channel. Every later operation fails with `ConnectionClosed`.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.send_permit.close();
        // Unsent requests and their duplicated descriptors are dropped
        drop(self.outbound().take());
        self.transport.shutdown()?;
        Ok(())
    }
}
