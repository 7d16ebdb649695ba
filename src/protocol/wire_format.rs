//! Wire format encoding and decoding.
//!
//! Every message starts with an 8-byte header:
//! ```text
//! ┌────────────┬──────────┬──────────┐
//! │ Object ID  │ Opcode   │ Size     │
//! │ 4 bytes    │ 2 bytes  │ 2 bytes  │
//! │ uint32     │ low half │ high half│
//! └────────────┴──────────┴──────────┘
//! ```
//!
//! The second word is `size << 16 | opcode`. All words are native endian,
//! the socket never leaves the machine.

/// Header size in bytes (fixed, exactly 8).
pub const HEADER_SIZE: usize = 8;

/// Maximum encoded message size, header included.
pub const MAX_MESSAGE_SIZE: usize = u16::MAX as usize;

/// Null object id. Valid as a nullable object argument, never live.
pub const NULL_ID: u32 = 0;

/// First id of the client-allocated range.
pub const LOCAL_ID_BASE: u32 = 0x0000_0001;

/// Last id of the client-allocated range.
pub const LOCAL_ID_MAX: u32 = 0xFEFF_FFFF;

/// First id of the server-allocated range.
pub const REMOTE_ID_BASE: u32 = 0xFF00_0000;

/// Last id of the server-allocated range.
pub const REMOTE_ID_MAX: u32 = 0xFFFF_FFFF;

/// Which side allocated an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Allocated by this client.
    Local,
    /// Allocated by the compositor.
    Remote,
}

impl Namespace {
    /// Classify an id. Returns `None` for the null id.
    #[inline]
    pub fn of(id: u32) -> Option<Self> {
        match id {
            NULL_ID => None,
            REMOTE_ID_BASE..=REMOTE_ID_MAX => Some(Namespace::Remote),
            _ => Some(Namespace::Local),
        }
    }

    /// First id of this namespace.
    #[inline]
    pub fn base(self) -> u32 {
        match self {
            Namespace::Local => LOCAL_ID_BASE,
            Namespace::Remote => REMOTE_ID_BASE,
        }
    }

    /// Last id of this namespace.
    #[inline]
    pub fn max(self) -> u32 {
        match self {
            Namespace::Local => LOCAL_ID_MAX,
            Namespace::Remote => REMOTE_ID_MAX,
        }
    }

    /// Whether `id` lies inside this namespace.
    #[inline]
    pub fn contains(self, id: u32) -> bool {
        (self.base()..=self.max()).contains(&id)
    }
}

/// Round `len` up to the next multiple of 4.
#[inline]
pub fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Target object id.
    pub object_id: u32,
    /// Request or event opcode, scoped to the target's interface.
    pub opcode: u16,
    /// Declared message size in bytes, header included.
    pub size: u16,
}

impl Header {
    /// Create a new header.
    pub fn new(object_id: u32, opcode: u16, size: u16) -> Self {
        Self {
            object_id,
            opcode,
            size,
        }
    }

    /// Encode header to bytes (native endian).
    ///
    /// # Example
    ///
    /// ```
    /// use waywire_client::protocol::{Header, HEADER_SIZE};
    ///
    /// let bytes = Header::new(1, 0, 12).encode();
    /// assert_eq!(bytes.len(), HEADER_SIZE);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.object_id.to_ne_bytes());
        buf[4..8].copy_from_slice(&self.size_opcode().to_ne_bytes());
        buf
    }

    /// Decode header from bytes (native endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let object_id = u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let word = u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Some(Self {
            object_id,
            opcode: (word & 0xFFFF) as u16,
            size: (word >> 16) as u16,
        })
    }

    /// The packed second header word.
    #[inline]
    pub fn size_opcode(&self) -> u32 {
        (u32::from(self.size) << 16) | u32::from(self.opcode)
    }

    /// Declared size of the argument payload.
    #[inline]
    pub fn body_len(&self) -> usize {
        (self.size as usize).saturating_sub(HEADER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encode_decode_roundtrip() {
        let original = Header::new(0xFF00_0003, 2, 24);
        let decoded = Header::decode(&original.encode()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_size_opcode_packing() {
        let header = Header::new(1, 0x0001, 0x000C);
        assert_eq!(header.size_opcode(), 0x000C_0001);

        let bytes = header.encode();
        assert_eq!(&bytes[4..8], &0x000C_0001u32.to_ne_bytes());
    }

    #[test]
    fn test_decode_too_short_buffer() {
        assert!(Header::decode(&[0u8; 7]).is_none());
    }

    #[test]
    fn test_body_len() {
        assert_eq!(Header::new(1, 0, 12).body_len(), 4);
        assert_eq!(Header::new(1, 0, 8).body_len(), 0);
        // A lying header never underflows
        assert_eq!(Header::new(1, 0, 3).body_len(), 0);
    }

    #[test]
    fn test_namespace_classification() {
        assert_eq!(Namespace::of(NULL_ID), None);
        assert_eq!(Namespace::of(1), Some(Namespace::Local));
        assert_eq!(Namespace::of(LOCAL_ID_MAX), Some(Namespace::Local));
        assert_eq!(Namespace::of(REMOTE_ID_BASE), Some(Namespace::Remote));
        assert_eq!(Namespace::of(u32::MAX), Some(Namespace::Remote));
    }

    #[test]
    fn test_namespaces_are_disjoint() {
        assert!(!Namespace::Local.contains(REMOTE_ID_BASE));
        assert!(!Namespace::Remote.contains(LOCAL_ID_MAX));
        assert!(!Namespace::Local.contains(NULL_ID));
    }

    #[test]
    fn test_pad4() {
        assert_eq!(pad4(0), 0);
        assert_eq!(pad4(1), 4);
        assert_eq!(pad4(4), 4);
        assert_eq!(pad4(5), 8);
        assert_eq!(pad4(13), 16);
    }
}
