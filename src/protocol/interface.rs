//! Static interface descriptions.
//!
//! An [`Interface`] lists the requests and events of one protocol interface
//! in opcode order. The connection consults the event table before decoding
//! a message, so the byte cursor only ever advances by a known shape.

use std::fmt;

use super::argument::ArgKind;

/// One request or event of an interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MessageDesc {
    /// Message name, e.g. `"sync"`.
    pub name: &'static str,
    /// Ordered wire kinds of the arguments.
    pub signature: &'static [ArgKind],
    /// Whether sending this request destroys the object.
    pub destructor: bool,
}

impl MessageDesc {
    /// Describe a non-destructor message.
    pub const fn new(name: &'static str, signature: &'static [ArgKind]) -> Self {
        Self {
            name,
            signature,
            destructor: false,
        }
    }

    /// Describe a destructor request.
    pub const fn destructor(name: &'static str, signature: &'static [ArgKind]) -> Self {
        Self {
            name,
            signature,
            destructor: true,
        }
    }

    /// Number of file descriptors this message carries out of band.
    pub fn fd_count(&self) -> usize {
        self.signature
            .iter()
            .filter(|kind| matches!(kind, ArgKind::Fd))
            .count()
    }
}

/// A protocol interface: name, highest supported version and message tables.
pub struct Interface {
    /// Interface name, e.g. `"wl_registry"`.
    pub name: &'static str,
    /// Highest version described by this table.
    pub version: u32,
    /// Requests, indexed by opcode.
    pub requests: &'static [MessageDesc],
    /// Events, indexed by opcode.
    pub events: &'static [MessageDesc],
}

impl Interface {
    /// Look up a request by opcode.
    #[inline]
    pub fn request(&self, opcode: u16) -> Option<&'static MessageDesc> {
        self.requests.get(opcode as usize)
    }

    /// Look up an event by opcode.
    #[inline]
    pub fn event(&self, opcode: u16) -> Option<&'static MessageDesc> {
        self.events.get(opcode as usize)
    }

    /// Find a request opcode by name.
    pub fn request_opcode(&self, name: &str) -> Option<u16> {
        self.requests
            .iter()
            .position(|desc| desc.name == name)
            .map(|i| i as u16)
    }

    /// Find an event opcode by name.
    pub fn event_opcode(&self, name: &str) -> Option<u16> {
        self.events
            .iter()
            .position(|desc| desc.name == name)
            .map(|i| i as u16)
    }
}

// Interfaces reference each other through new_id kinds; printing the whole
// graph would be noise.
impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interface({} v{})", self.name, self.version)
    }
}

impl PartialEq for Interface {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}
