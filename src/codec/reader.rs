//! Inbound message decoder.
//!
//! Holds every byte and descriptor received from the socket that has not
//! been consumed yet. Decoding is driven by signatures: the declared message
//! size is only used to tell whether a whole message has arrived and to skip
//! messages that cannot be decoded.

use std::collections::VecDeque;
use std::os::fd::OwnedFd;

use bytes::{Buf, BytesMut};

use crate::error::{Result, WaywireError};
use crate::protocol::{pad4, ArgKind, Argument, Header, HEADER_SIZE};

/// Default inbound buffer capacity.
const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Buffer of received, not yet decoded bytes and descriptors.
#[derive(Debug)]
pub struct MessageReader {
    buf: BytesMut,
    fds: VecDeque<OwnedFd>,
}

impl MessageReader {
    /// Create an empty reader.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(DEFAULT_CAPACITY),
            fds: VecDeque::new(),
        }
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Append received descriptors, in arrival order.
    pub fn push_fds(&mut self, fds: impl IntoIterator<Item = OwnedFd>) {
        self.fds.extend(fds);
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Number of descriptors not yet consumed.
    pub fn pending_fds(&self) -> usize {
        self.fds.len()
    }

    /// Parse the next header without consuming it.
    pub fn peek_header(&self) -> Option<Header> {
        Header::decode(&self.buf)
    }

    /// Whether a complete message (per its declared size) is buffered.
    pub fn has_message(&self) -> bool {
        match self.peek_header() {
            Some(header) => self.buf.len() >= (header.size as usize).max(HEADER_SIZE),
            None => false,
        }
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if self.buf.len() < needed {
            return Err(WaywireError::Protocol(format!(
                "truncated message: need {} bytes, {} available",
                needed,
                self.buf.len()
            )));
        }
        Ok(())
    }

    /// Consume an 8-byte header.
    pub fn read_header(&mut self) -> Result<Header> {
        self.ensure(HEADER_SIZE)?;
        let object_id = self.buf.get_u32_ne();
        let word = self.buf.get_u32_ne();
        Ok(Header {
            object_id,
            opcode: (word & 0xFFFF) as u16,
            size: (word >> 16) as u16,
        })
    }

    /// Consume a signed 32-bit integer.
    pub fn read_int(&mut self) -> Result<i32> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_ne())
    }

    /// Consume an unsigned 32-bit integer.
    pub fn read_uint(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_ne())
    }

    /// Consume an 8-byte fixed-point value.
    pub fn read_fixed(&mut self) -> Result<f64> {
        self.ensure(8)?;
        Ok(self.buf.get_f64_ne())
    }

    /// Consume a string. A zero length word yields the empty string.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_uint()? as usize;
        if len == 0 {
            return Ok(String::new());
        }
        self.ensure(pad4(len))?;
        let raw = self.buf.split_to(len);
        self.buf.advance(pad4(len) - len);

        if raw.last() != Some(&0) {
            return Err(WaywireError::Protocol(
                "string argument is not NUL-terminated".to_string(),
            ));
        }
        String::from_utf8(raw[..len - 1].to_vec())
            .map_err(|e| WaywireError::Protocol(format!("string argument is not UTF-8: {}", e)))
    }

    /// Consume a byte array. A zero length word yields an empty array.
    pub fn read_array(&mut self) -> Result<Vec<u8>> {
        let len = self.read_uint()? as usize;
        if len == 0 {
            return Ok(Vec::new());
        }
        self.ensure(pad4(len))?;
        let raw = self.buf.split_to(len);
        self.buf.advance(pad4(len) - len);
        Ok(raw.to_vec())
    }

    /// Take the next received descriptor.
    pub fn read_fd(&mut self) -> Result<OwnedFd> {
        self.fds.pop_front().ok_or_else(|| {
            WaywireError::Protocol("message expects a file descriptor, none received".to_string())
        })
    }

    /// Consume one argument of the given kind.
    pub fn read_argument(&mut self, kind: &ArgKind) -> Result<Argument> {
        Ok(match kind {
            ArgKind::Int => Argument::Int(self.read_int()?),
            ArgKind::Uint => Argument::Uint(self.read_uint()?),
            ArgKind::Fixed => Argument::Fixed(self.read_fixed()?),
            ArgKind::String => Argument::String(self.read_string()?),
            ArgKind::Array => Argument::Array(self.read_array()?),
            ArgKind::Object => Argument::Object(self.read_uint()?),
            ArgKind::NewId(_) => Argument::NewId(self.read_uint()?),
            ArgKind::Fd => Argument::Fd(self.read_fd()?),
        })
    }

    /// Consume exactly `signature.len()` arguments in order.
    pub fn read_arguments(&mut self, signature: &[ArgKind]) -> Result<Vec<Argument>> {
        signature
            .iter()
            .map(|kind| self.read_argument(kind))
            .collect()
    }

    /// Drop up to `len` bytes. Returns how many were dropped.
    pub fn skip(&mut self, len: usize) -> usize {
        let len = len.min(self.buf.len());
        self.buf.advance(len);
        len
    }

    /// Discard everything, closing any unread descriptors.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.fds.clear();
    }
}

impl Default for MessageReader {
    fn default() -> Self {
        Self::new()
    }
}
