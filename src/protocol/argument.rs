//! Message arguments.
//!
//! [`ArgKind`] is the static shape of an argument as listed in an interface
//! table; [`Argument`] is a decoded (or to-be-encoded) value of one of those
//! shapes. Exactly one variant is active per argument.

use std::os::fd::{AsRawFd, OwnedFd};

use super::interface::Interface;
use super::wire_format::pad4;
use crate::error::{Result, WaywireError};

/// Wire kind of one argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArgKind {
    /// 32-bit signed integer.
    Int,
    /// 32-bit unsigned integer.
    Uint,
    /// Fixed-point number, carried as an 8-byte double.
    Fixed,
    /// NUL-terminated UTF-8 string.
    String,
    /// Opaque byte array.
    Array,
    /// Reference to an existing object (0 = null).
    Object,
    /// Id of an object being created, with its interface when statically known.
    NewId(Option<&'static Interface>),
    /// File descriptor passed out of band.
    Fd,
}

impl ArgKind {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            ArgKind::Int => "int",
            ArgKind::Uint => "uint",
            ArgKind::Fixed => "fixed",
            ArgKind::String => "string",
            ArgKind::Array => "array",
            ArgKind::Object => "object",
            ArgKind::NewId(_) => "new_id",
            ArgKind::Fd => "fd",
        }
    }
}

/// A single argument value.
#[derive(Debug)]
pub enum Argument {
    /// 32-bit signed integer.
    Int(i32),
    /// 32-bit unsigned integer.
    Uint(u32),
    /// Fixed-point number.
    Fixed(f64),
    /// UTF-8 string. Zero-length on the wire decodes to the empty string.
    String(String),
    /// Opaque bytes.
    Array(Vec<u8>),
    /// Object reference by id.
    Object(u32),
    /// Newly allocated id.
    NewId(u32),
    /// Owned file descriptor.
    Fd(OwnedFd),
}

impl Argument {
    /// Whether this value has the given wire kind.
    pub fn matches(&self, kind: &ArgKind) -> bool {
        matches!(
            (self, kind),
            (Argument::Int(_), ArgKind::Int)
                | (Argument::Uint(_), ArgKind::Uint)
                | (Argument::Fixed(_), ArgKind::Fixed)
                | (Argument::String(_), ArgKind::String)
                | (Argument::Array(_), ArgKind::Array)
                | (Argument::Object(_), ArgKind::Object)
                | (Argument::NewId(_), ArgKind::NewId(_))
                | (Argument::Fd(_), ArgKind::Fd)
        )
    }

    /// Number of inline bytes this argument occupies on the wire.
    pub fn wire_len(&self) -> usize {
        match self {
            Argument::Int(_) | Argument::Uint(_) | Argument::Object(_) | Argument::NewId(_) => 4,
            Argument::Fixed(_) => 8,
            // Length word, bytes, trailing NUL
            Argument::String(s) => 4 + pad4(s.len() + 1),
            Argument::Array(a) => 4 + pad4(a.len()),
            Argument::Fd(_) => 0,
        }
    }

    fn mismatch(&self, expected: &str) -> WaywireError {
        WaywireError::Protocol(format!("expected {} argument, got {:?}", expected, self))
    }

    /// Read an `int` argument.
    pub fn as_int(&self) -> Result<i32> {
        match self {
            Argument::Int(v) => Ok(*v),
            other => Err(other.mismatch("int")),
        }
    }

    /// Read a `uint` argument.
    pub fn as_uint(&self) -> Result<u32> {
        match self {
            Argument::Uint(v) => Ok(*v),
            other => Err(other.mismatch("uint")),
        }
    }

    /// Read a `fixed` argument.
    pub fn as_fixed(&self) -> Result<f64> {
        match self {
            Argument::Fixed(v) => Ok(*v),
            other => Err(other.mismatch("fixed")),
        }
    }

    /// Borrow a `string` argument.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Argument::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    /// Borrow an `array` argument.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Argument::Array(a) => Ok(a),
            other => Err(other.mismatch("array")),
        }
    }

    /// Read an `object` argument (0 = null).
    pub fn as_object(&self) -> Result<u32> {
        match self {
            Argument::Object(id) => Ok(*id),
            other => Err(other.mismatch("object")),
        }
    }

    /// Read a `new_id` argument.
    pub fn as_new_id(&self) -> Result<u32> {
        match self {
            Argument::NewId(id) => Ok(*id),
            other => Err(other.mismatch("new_id")),
        }
    }

    /// Take ownership of an `fd` argument.
    pub fn into_fd(self) -> Result<OwnedFd> {
        match self {
            Argument::Fd(fd) => Ok(fd),
            other => Err(other.mismatch("fd")),
        }
    }
}

impl PartialEq for Argument {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Argument::Int(a), Argument::Int(b)) => a == b,
            (Argument::Uint(a), Argument::Uint(b)) => a == b,
            (Argument::Fixed(a), Argument::Fixed(b)) => a.to_bits() == b.to_bits(),
            (Argument::String(a), Argument::String(b)) => a == b,
            (Argument::Array(a), Argument::Array(b)) => a == b,
            (Argument::Object(a), Argument::Object(b)) => a == b,
            (Argument::NewId(a), Argument::NewId(b)) => a == b,
            (Argument::Fd(a), Argument::Fd(b)) => a.as_raw_fd() == b.as_raw_fd(),
            _ => false,
        }
    }
}

impl From<i32> for Argument {
    fn from(v: i32) -> Self {
        Argument::Int(v)
    }
}

impl From<u32> for Argument {
    fn from(v: u32) -> Self {
        Argument::Uint(v)
    }
}

impl From<f64> for Argument {
    fn from(v: f64) -> Self {
        Argument::Fixed(v)
    }
}

impl From<&str> for Argument {
    fn from(v: &str) -> Self {
        Argument::String(v.to_string())
    }
}

impl From<String> for Argument {
    fn from(v: String) -> Self {
        Argument::String(v)
    }
}

impl From<Vec<u8>> for Argument {
    fn from(v: Vec<u8>) -> Self {
        Argument::Array(v)
    }
}

impl From<OwnedFd> for Argument {
    fn from(v: OwnedFd) -> Self {
        Argument::Fd(v)
    }
}

/// Check a list of arguments against a signature.
pub fn check_signature(args: &[Argument], signature: &[ArgKind]) -> Result<()> {
    if args.len() != signature.len() {
        return Err(WaywireError::Protocol(format!(
            "expected {} arguments, got {}",
            signature.len(),
            args.len()
        )));
    }
    for (i, (arg, kind)) in args.iter().zip(signature).enumerate() {
        if !arg.matches(kind) {
            return Err(WaywireError::Protocol(format!(
                "argument {} should be {}, got {:?}",
                i,
                kind.name(),
                arg
            )));
        }
    }
    Ok(())
}
