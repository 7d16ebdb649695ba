//! Outbound message encoder.
//!
//! Appends headers and arguments to a `bytes::BytesMut` buffer. File
//! descriptors never touch the byte stream: they are duplicated and queued on
//! a side list that the transport attaches to the next `sendmsg`.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, WaywireError};
use crate::protocol::{pad4, Argument, Header, HEADER_SIZE, MAX_MESSAGE_SIZE};

/// Default outbound buffer capacity.
const DEFAULT_CAPACITY: usize = 4096;

/// Buffer of encoded requests waiting for the next flush.
#[derive(Debug)]
pub struct MessageWriter {
    buf: BytesMut,
    fds: Vec<OwnedFd>,
}

impl MessageWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(DEFAULT_CAPACITY),
            fds: Vec::new(),
        }
    }

    /// Append a message header.
    pub fn write_header(&mut self, header: &Header) {
        self.buf.put_slice(&header.encode());
    }

    /// Append a signed 32-bit integer.
    pub fn write_int(&mut self, value: i32) {
        self.buf.put_i32_ne(value);
    }

    /// Append an unsigned 32-bit integer.
    pub fn write_uint(&mut self, value: u32) {
        self.buf.put_u32_ne(value);
    }

    /// Append a fixed-point number as an 8-byte double.
    pub fn write_fixed(&mut self, value: f64) {
        self.buf.put_f64_ne(value);
    }

    /// Append a length-prefixed, NUL-terminated, padded string.
    ///
    /// Strings with interior NUL bytes cannot be represented.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        if value.as_bytes().contains(&0) {
            return Err(WaywireError::Protocol(
                "string argument contains an interior NUL byte".to_string(),
            ));
        }
        let len = value.len() + 1;
        let len_word = u32::try_from(len).map_err(|_| WaywireError::MessageTooLarge(len))?;
        self.buf.put_u32_ne(len_word);
        self.buf.put_slice(value.as_bytes());
        self.buf.put_u8(0);
        self.buf.put_bytes(0, pad4(len) - len);
        Ok(())
    }

    /// Append a length-prefixed, padded byte array.
    pub fn write_array(&mut self, value: &[u8]) -> Result<()> {
        let len_word =
            u32::try_from(value.len()).map_err(|_| WaywireError::MessageTooLarge(value.len()))?;
        self.buf.put_u32_ne(len_word);
        self.buf.put_slice(value);
        self.buf.put_bytes(0, pad4(value.len()) - value.len());
        Ok(())
    }

    /// Queue a duplicate of `fd` for the next flush.
    ///
    /// The caller's descriptor stays open; the duplicate is closed once sent.
    pub fn write_fd(&mut self, fd: BorrowedFd<'_>) -> Result<()> {
        let dup = fd.try_clone_to_owned()?;
        self.fds.push(dup);
        Ok(())
    }

    /// Append a single argument.
    pub fn write_argument(&mut self, arg: &Argument) -> Result<()> {
        match arg {
            Argument::Int(v) => self.write_int(*v),
            Argument::Uint(v) => self.write_uint(*v),
            Argument::Fixed(v) => self.write_fixed(*v),
            Argument::String(s) => self.write_string(s)?,
            Argument::Array(a) => self.write_array(a)?,
            Argument::Object(id) | Argument::NewId(id) => self.write_uint(*id),
            Argument::Fd(fd) => self.write_fd(fd.as_fd())?,
        }
        Ok(())
    }

    /// Encode a complete message: header followed by `args` in order.
    ///
    /// Either the whole message is appended or nothing is. Returns the
    /// encoded size.
    pub fn write_message(&mut self, object_id: u32, opcode: u16, args: &[Argument]) -> Result<u16> {
        let size = HEADER_SIZE + args.iter().map(Argument::wire_len).sum::<usize>();
        if size > MAX_MESSAGE_SIZE {
            return Err(WaywireError::MessageTooLarge(size));
        }
        let size = size as u16;

        let buf_mark = self.buf.len();
        let fd_mark = self.fds.len();

        self.write_header(&Header::new(object_id, opcode, size));
        for arg in args {
            if let Err(e) = self.write_argument(arg) {
                self.buf.truncate(buf_mark);
                self.fds.truncate(fd_mark);
                return Err(e);
            }
        }

        debug_assert_eq!(self.buf.len() - buf_mark, size as usize);
        Ok(size)
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && self.fds.is_empty()
    }

    /// Number of queued descriptors.
    pub fn pending_fds(&self) -> usize {
        self.fds.len()
    }

    /// Take all buffered bytes and descriptors, leaving the writer empty.
    pub fn take(&mut self) -> (Bytes, Vec<OwnedFd>) {
        (self.buf.split().freeze(), std::mem::take(&mut self.fds))
    }
}

impl Default for MessageWriter {
    fn default() -> Self {
        Self::new()
    }
}
