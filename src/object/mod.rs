//! Object module - the contract every protocol entity implements.
//!
//! The connection decodes and delivers events through [`Object`] without
//! knowing concrete interface types:
//! - [`Object::event_signature`] tells it how many bytes an event occupies
//! - [`Object::dispatch`] delivers the decoded arguments
//!
//! [`Proxy`] is the generic implementation for any static
//! [`Interface`](crate::protocol::Interface), with handlers registered by
//! event name.
//!
//! # Example
//!
//! ```ignore
//! let seat = registry.bind(name, &WL_SEAT, 7)?;
//! seat.on("capabilities", |_seat, args| {
//!     println!("caps = {:#x}", args[0].as_uint()?);
//!     Ok(())
//! })?;
//! display.roundtrip().await?;
//! ```

use std::any::Any;
use std::sync::{Arc, Weak};

use crate::connection::Connection;
use crate::error::Result;
use crate::protocol::{ArgKind, Argument, Interface};

mod proxy;

pub use proxy::{EventHandler, Proxy};

/// Identity handed to an object when it is constructed.
#[derive(Debug, Clone)]
pub struct ObjectData {
    /// Id in the local or remote namespace.
    pub id: u32,
    /// Negotiated version.
    pub version: u32,
    /// Owning connection.
    pub connection: Weak<Connection>,
}

/// A protocol entity known to a connection.
pub trait Object: Send + Sync + 'static {
    /// Object id.
    fn id(&self) -> u32;

    /// Version fixed at construction.
    fn version(&self) -> u32;

    /// Static interface table.
    fn interface(&self) -> &'static Interface;

    /// Owning connection, if it is still alive.
    fn connection(&self) -> Option<Arc<Connection>>;

    /// Wire kinds of the event with this opcode.
    fn event_signature(&self, opcode: u16) -> Option<&'static [ArgKind]> {
        self.interface().event(opcode).map(|desc| desc.signature)
    }

    /// Deliver a decoded event.
    ///
    /// An opcode with no entry in the event table is an error.
    fn dispatch(&self, opcode: u16, args: Vec<Argument>) -> Result<()>;

    /// Prepare a recycled instance for a new identity.
    ///
    /// Must clear every piece of per-object state, handlers included.
    fn reset(&mut self, id: u32, version: u32);

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Downcast support for shared handles.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}
