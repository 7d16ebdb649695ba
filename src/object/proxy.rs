//! Generic object for any static interface.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use super::{Object, ObjectData};
use crate::connection::Connection;
use crate::error::{Result, WaywireError};
use crate::protocol::{Argument, Interface};

/// Event handler: receives the proxy the event was addressed to and the
/// decoded arguments.
pub type EventHandler = Arc<dyn Fn(&Proxy, Vec<Argument>) -> Result<()> + Send + Sync>;

/// Client-side handle to one protocol object.
pub struct Proxy {
    id: u32,
    version: u32,
    interface: &'static Interface,
    connection: Weak<Connection>,
    /// Handlers by event opcode.
    handlers: RwLock<HashMap<u16, EventHandler>>,
}

impl Proxy {
    /// Create a proxy for `interface` with the given identity.
    pub fn new(data: ObjectData, interface: &'static Interface) -> Self {
        Self {
            id: data.id,
            version: data.version,
            interface,
            connection: data.connection,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    fn unknown_opcode(&self, opcode: u16) -> WaywireError {
        WaywireError::UnknownOpcode {
            object: self.id,
            interface: self.interface.name,
            opcode,
        }
    }

    /// Register a handler for the event called `event`.
    ///
    /// Replaces any previous handler for that event.
    pub fn on<F>(&self, event: &str, handler: F) -> Result<()>
    where
        F: Fn(&Proxy, Vec<Argument>) -> Result<()> + Send + Sync + 'static,
    {
        let opcode = self.interface.event_opcode(event).ok_or_else(|| {
            WaywireError::Protocol(format!(
                "{} has no event named {}",
                self.interface.name, event
            ))
        })?;
        self.on_opcode(opcode, handler)
    }

    /// Register a handler by event opcode.
    pub fn on_opcode<F>(&self, opcode: u16, handler: F) -> Result<()>
    where
        F: Fn(&Proxy, Vec<Argument>) -> Result<()> + Send + Sync + 'static,
    {
        if self.interface.event(opcode).is_none() {
            return Err(self.unknown_opcode(opcode));
        }
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(opcode, Arc::new(handler));
        Ok(())
    }

    /// Whether a handler is registered for `opcode`.
    pub fn has_handler(&self, opcode: u16) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&opcode)
    }

    /// Send the request called `request`.
    pub fn request(&self, request: &str, args: &[Argument]) -> Result<()> {
        let opcode = self.interface.request_opcode(request).ok_or_else(|| {
            WaywireError::Protocol(format!(
                "{} has no request named {}",
                self.interface.name, request
            ))
        })?;
        self.request_opcode(opcode, args)
    }

    /// Send a request by opcode.
    ///
    /// The request is buffered; it goes out with the next flush or dispatch.
    pub fn request_opcode(&self, opcode: u16, args: &[Argument]) -> Result<()> {
        let connection = self.connection().ok_or(WaywireError::ConnectionClosed)?;
        connection.marshal(self.id, opcode, args)
    }

    /// Send a destructor request and retire this object.
    ///
    /// The id is freed once the compositor acknowledges with `delete_id`.
    /// Events that arrive in the meantime are dropped.
    pub fn destroy_with(&self, request: &str, args: &[Argument]) -> Result<()> {
        let connection = self.connection().ok_or(WaywireError::ConnectionClosed)?;
        self.request(request, args)?;
        connection.retire(self.id)
    }
}

impl Object for Proxy {
    fn id(&self) -> u32 {
        self.id
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn interface(&self) -> &'static Interface {
        self.interface
    }

    fn connection(&self) -> Option<Arc<Connection>> {
        self.connection.upgrade()
    }

    fn dispatch(&self, opcode: u16, args: Vec<Argument>) -> Result<()> {
        let desc = self
            .interface
            .event(opcode)
            .ok_or_else(|| self.unknown_opcode(opcode))?;

        // Clone out so the handler may register handlers itself
        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&opcode)
            .cloned();

        match handler {
            Some(handler) => handler(self, args),
            None => {
                tracing::trace!(
                    "No handler for {}@{}.{}",
                    self.interface.name,
                    self.id,
                    desc.name
                );
                Ok(())
            }
        }
    }

    fn reset(&mut self, id: u32, version: u32) {
        self.id = id;
        self.version = version;
        self.handlers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} v{}", self.interface.name, self.id, self.version)
    }
}
