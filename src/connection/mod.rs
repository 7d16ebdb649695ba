//! Connection module - object table, marshalling and event decoding.
//!
//! A [`Connection`] gives the wire's bytes meaning in terms of live objects:
//! - [`ObjectTable`] - id allocation in the local and remote namespaces
//! - [`EventQueue`] - decoded events waiting for [`Connection::dispatch_pending`]
//!
//! # Flow
//!
//! ```text
//! Proxy::request ─► marshal ─► Wire outbound ─► flush ─► compositor
//! compositor ─► Wire inbound ─► read ─► EventQueue ─► dispatch_pending ─► handlers
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::codec::MessageReader;
use crate::error::{Result, WaywireError};
use crate::object::{Object, ObjectData, Proxy};
use crate::protocol::{check_signature, ArgKind, Argument, Interface, Namespace};
use crate::trace::{self, Direction};
use crate::transport::Transport;
use crate::wire::Wire;

mod queue;
mod table;

pub use queue::{EventQueue, PendingEvent};
pub use table::ObjectTable;

/// One client connection: a wire plus the objects living on it.
pub struct Connection {
    wire: Wire,
    objects: Mutex<ObjectTable>,
    events: EventQueue,
    trace: bool,
    this: Weak<Connection>,
}

impl Connection {
    /// Create a connection over `transport`.
    ///
    /// With `trace` set every request and event is printed to stdout.
    pub fn new(transport: Box<dyn Transport>, trace: bool) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            wire: Wire::new(transport),
            objects: Mutex::new(ObjectTable::new()),
            events: EventQueue::new(),
            trace,
            this: this.clone(),
        })
    }

    fn objects(&self) -> MutexGuard<'_, ObjectTable> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the connection was closed locally.
    pub fn is_closed(&self) -> bool {
        self.wire.is_closed()
    }

    /// Create a [`Proxy`] for `interface` at a freshly allocated local id.
    pub fn create(&self, interface: &'static Interface, version: u32) -> Result<Arc<Proxy>> {
        self.create_with(interface, version, |data| Proxy::new(data, interface))
    }

    /// Create a custom object at a freshly allocated local id.
    ///
    /// The instance last destroyed at that id is reused when it has the same
    /// type and interface and nothing else holds it; it is reset first.
    /// Otherwise `factory` builds a new one. `factory` runs with the object
    /// table locked and must not call back into the connection.
    pub fn create_with<T, F>(
        &self,
        interface: &'static Interface,
        version: u32,
        factory: F,
    ) -> Result<Arc<T>>
    where
        T: Object,
        F: FnOnce(ObjectData) -> T,
    {
        let mut objects = self.objects();
        let id = objects.allocate_local()?;
        let object = self.instantiate(&mut objects, id, interface, version, factory);
        objects.insert(id, object.clone())?;
        drop(objects);

        tracing::debug!("Created {}@{} v{}", interface.name, id, version);
        Ok(object)
    }

    /// Reuse the pooled instance for `id` or build a new one.
    fn instantiate<T, F>(
        &self,
        objects: &mut ObjectTable,
        id: u32,
        interface: &'static Interface,
        version: u32,
        factory: F,
    ) -> Arc<T>
    where
        T: Object,
        F: FnOnce(ObjectData) -> T,
    {
        if let Some(mut pooled) = objects.take_pooled(id) {
            if pooled.interface() == interface && pooled.as_any().is::<T>() {
                if let Some(object) = Arc::get_mut(&mut pooled) {
                    object.reset(id, version);
                    if let Ok(object) = pooled.into_any().downcast::<T>() {
                        tracing::trace!("Recycled {}@{}", interface.name, id);
                        return object;
                    }
                }
            }
        }

        Arc::new(factory(ObjectData {
            id,
            version,
            connection: self.this.clone(),
        }))
    }

    /// Register an object at an explicit id in either namespace.
    pub fn insert(&self, id: u32, object: Arc<dyn Object>) -> Result<()> {
        self.objects().insert(id, object)
    }

    /// Live object at `id`. Ids in neither namespace yield `None`.
    pub fn get(&self, id: u32) -> Option<Arc<dyn Object>> {
        self.objects().get(id)
    }

    /// Live object at `id` as its concrete type.
    ///
    /// Fails with [`WaywireError::UnknownObject`] when nothing lives at `id`
    /// and with [`WaywireError::Protocol`] when it has another type.
    pub fn get_as<T: Object>(&self, id: u32) -> Result<Arc<T>> {
        let object = self.get(id).ok_or(WaywireError::UnknownObject(id))?;
        let interface = object.interface().name;
        object.into_any().downcast::<T>().map_err(|_| {
            WaywireError::Protocol(format!(
                "{}@{} is not a {}",
                interface,
                id,
                std::any::type_name::<T>()
            ))
        })
    }

    /// Replace the object at `id`, returning the previous one.
    pub fn set(&self, id: u32, object: Arc<dyn Object>) -> Result<Option<Arc<dyn Object>>> {
        self.objects().set(id, object)
    }

    /// Number of live objects.
    pub fn live_objects(&self) -> usize {
        self.objects().live()
    }

    /// Destroy the object at `id`: free its id and pool the instance.
    pub fn destroy(&self, id: u32) -> Result<()> {
        self.objects().remove(id)?;
        tracing::debug!("Destroyed object {}", id);
        Ok(())
    }

    /// Retire the object at `id` after its destructor request was sent.
    ///
    /// Local ids stay reserved until the peer's `delete_id`; remote ids are
    /// destroyed right away.
    pub fn retire(&self, id: u32) -> Result<()> {
        match Namespace::of(id) {
            Some(Namespace::Local) => {
                self.objects().retire(id)?;
                tracing::debug!("Retired object {}, awaiting delete_id", id);
                Ok(())
            }
            Some(Namespace::Remote) => self.destroy(id),
            None => Err(WaywireError::UnknownNamespace(id)),
        }
    }

    /// Whether `id` is retired and awaiting its delete acknowledgement.
    pub fn is_retired(&self, id: u32) -> bool {
        self.objects().is_retired(id)
    }

    fn interface_name(&self, id: u32) -> Option<&'static str> {
        self.get(id).map(|object| object.interface().name)
    }

    /// Encode a request into the outbound buffer.
    ///
    /// When the target is known the arguments are checked against its
    /// request signature first. Nothing is sent until the next flush.
    pub fn marshal(&self, id: u32, opcode: u16, args: &[Argument]) -> Result<()> {
        if let Some(target) = self.get(id) {
            let interface = target.interface();
            let desc = interface
                .request(opcode)
                .ok_or(WaywireError::UnknownOpcode {
                    object: id,
                    interface: interface.name,
                    opcode,
                })?;
            check_signature(args, desc.signature)?;

            if self.trace {
                self.trace_message(
                    Direction::Request,
                    interface,
                    id,
                    desc.name,
                    desc.signature,
                    args,
                );
            }
        } else {
            tracing::debug!("Marshalling opcode {} to untracked object {}", opcode, id);
        }

        self.wire.queue(|w| w.write_message(id, opcode, args))?;
        Ok(())
    }

    /// Decode one message from `reader` and queue its delivery.
    ///
    /// Returns `Ok(false)` when the target is unknown; the message is skipped
    /// using its declared size. An opcode the target does not know aborts
    /// with [`WaywireError::UnknownOpcode`].
    pub fn read(&self, reader: &mut MessageReader) -> Result<bool> {
        let header = reader.read_header()?;
        let body_len = header.body_len();

        let Some(target) = self.get(header.object_id) else {
            tracing::warn!(
                "Dropping opcode {} for unknown object {} ({} bytes)",
                header.opcode,
                header.object_id,
                header.size
            );
            reader.skip(body_len);
            return Ok(false);
        };

        let interface = target.interface();
        let Some(signature) = target.event_signature(header.opcode) else {
            // Leave the cursor on the next message boundary
            reader.skip(body_len);
            return Err(WaywireError::UnknownOpcode {
                object: header.object_id,
                interface: interface.name,
                opcode: header.opcode,
            });
        };

        let before = reader.remaining();
        let args = reader.read_arguments(signature)?;
        let consumed = before - reader.remaining();
        if consumed < body_len {
            tracing::warn!(
                "{}@{} opcode {}: declared {} body bytes, decoded {}",
                interface.name,
                header.object_id,
                header.opcode,
                body_len,
                consumed
            );
            reader.skip(body_len - consumed);
        } else if consumed > body_len {
            tracing::warn!(
                "{}@{} opcode {}: decoded {} bytes past the declared size",
                interface.name,
                header.object_id,
                header.opcode,
                consumed - body_len
            );
        }

        if self.trace {
            let name = interface
                .event(header.opcode)
                .map(|desc| desc.name)
                .unwrap_or("[unknown]");
            self.trace_message(
                Direction::Event,
                interface,
                header.object_id,
                name,
                signature,
                &args,
            );
        }

        if self.is_retired(header.object_id) {
            tracing::debug!(
                "Dropping opcode {} for retired {}@{}",
                header.opcode,
                interface.name,
                header.object_id
            );
            return Ok(true);
        }

        self.materialize(target.version(), signature, &args)?;

        let opcode = header.opcode;
        self.events.push(Box::new(move || target.dispatch(opcode, args)));
        Ok(true)
    }

    /// Create proxies for ids the peer allocated in typed `new_id` arguments.
    fn materialize(&self, version: u32, signature: &[ArgKind], args: &[Argument]) -> Result<()> {
        for (kind, arg) in signature.iter().zip(args) {
            let (ArgKind::NewId(Some(interface)), Argument::NewId(id)) = (kind, arg) else {
                continue;
            };
            if *id == 0 {
                continue;
            }
            let interface: &'static Interface = *interface;
            let id = *id;
            if Namespace::of(id) != Some(Namespace::Remote) {
                return Err(WaywireError::Protocol(format!(
                    "peer created {} at id {:#x} outside its namespace",
                    interface.name, id
                )));
            }

            let mut objects = self.objects();
            if objects.is_live(id) {
                return Err(WaywireError::SlotOccupied(id));
            }
            let object = self.instantiate(&mut objects, id, interface, version, |data| {
                Proxy::new(data, interface)
            });
            objects.insert(id, object)?;
            drop(objects);
            tracing::debug!("Peer created {}@{}", interface.name, id);
        }
        Ok(())
    }

    fn trace_message(
        &self,
        direction: Direction,
        interface: &Interface,
        id: u32,
        name: &str,
        signature: &[ArgKind],
        args: &[Argument],
    ) {
        let lookup = |object: u32| self.interface_name(object);
        let line = trace::format_message(
            direction,
            interface.name,
            id,
            name,
            signature,
            args,
            &lookup,
        );
        if let Err(e) = trace::emit_stdout(&line) {
            tracing::warn!("Failed to write protocol trace: {}", e);
        }
    }

    /// Decode every complete message currently buffered.
    ///
    /// Returns the number of messages queued for delivery.
    pub async fn read_messages(&self) -> Result<usize> {
        let mut reader = self.wire.inbound().await;
        let mut queued = 0;
        while reader.has_message() {
            if self.read(&mut reader)? {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Deliver queued events in FIFO order.
    ///
    /// Returns whether any handler ran. The first handler error stops the
    /// drain and is returned.
    pub fn dispatch_pending(&self) -> Result<bool> {
        Ok(self.events.drain()? > 0)
    }

    /// Send buffered requests, then wait up to `timeout` for input.
    ///
    /// Returns the number of buffered input bytes not yet decoded.
    pub async fn flush(&self, timeout: Duration) -> Result<usize> {
        self.wire.flush(timeout).await
    }

    /// Send buffered requests without waiting for input.
    pub async fn send_pending(&self) -> Result<()> {
        self.wire.send_pending().await
    }

    /// Number of encoded request bytes waiting to be sent.
    pub fn pending_bytes(&self) -> usize {
        self.wire.pending_bytes()
    }

    /// Shut the connection down. Later operations fail fast.
    pub fn close(&self) -> Result<()> {
        self.wire.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MessageWriter;
    use crate::protocol::{MessageDesc, REMOTE_ID_BASE, WL_CALLBACK, WL_DISPLAY};
    use crate::transport::UnixTransport;
    use std::sync::atomic::{AtomicBool, Ordering};

    static TEST_MANAGER: Interface = Interface {
        name: "test_manager",
        version: 2,
        requests: &[MessageDesc::new("ping", &[ArgKind::Uint])],
        events: &[
            MessageDesc::new("offer", &[ArgKind::NewId(Some(&TEST_OFFER)), ArgKind::String]),
            MessageDesc::new("note", &[ArgKind::Uint]),
        ],
    };

    static TEST_OFFER: Interface = Interface {
        name: "test_offer",
        version: 2,
        requests: &[MessageDesc::destructor("destroy", &[])],
        events: &[MessageDesc::new("mime", &[ArgKind::String])],
    };

    /// Minimal hand-written object counting `note` events.
    struct Ticker {
        data: ObjectData,
        notes: std::sync::atomic::AtomicU32,
    }

    impl Object for Ticker {
        fn id(&self) -> u32 {
            self.data.id
        }

        fn version(&self) -> u32 {
            self.data.version
        }

        fn interface(&self) -> &'static Interface {
            &TEST_MANAGER
        }

        fn connection(&self) -> Option<Arc<Connection>> {
            self.data.connection.upgrade()
        }

        fn dispatch(&self, opcode: u16, _args: Vec<Argument>) -> Result<()> {
            match opcode {
                1 => {
                    self.notes.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                _ => Err(WaywireError::UnknownOpcode {
                    object: self.data.id,
                    interface: TEST_MANAGER.name,
                    opcode,
                }),
            }
        }

        fn reset(&mut self, id: u32, version: u32) {
            self.data.id = id;
            self.data.version = version;
            *self.notes.get_mut() = 0;
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn into_any(self: Arc<Self>) -> Arc<dyn std::any::Any + Send + Sync> {
            self
        }
    }

    fn connection() -> (Arc<Connection>, UnixTransport) {
        let (client, server) = UnixTransport::pair().unwrap();
        (Connection::new(Box::new(client), false), server)
    }

    fn encode(object_id: u32, opcode: u16, args: &[Argument]) -> MessageReader {
        let mut writer = MessageWriter::new();
        writer.write_message(object_id, opcode, args).unwrap();
        let (bytes, _) = writer.take();
        let mut reader = MessageReader::new();
        reader.extend(&bytes);
        reader
    }

    #[tokio::test]
    async fn test_create_allocates_from_one() {
        let (conn, _server) = connection();
        let display = conn.create(&WL_DISPLAY, 1).unwrap();
        let callback = conn.create(&WL_CALLBACK, 1).unwrap();

        assert_eq!(display.id(), 1);
        assert_eq!(callback.id(), 2);
        assert_eq!(conn.live_objects(), 2);
        assert!(Arc::ptr_eq(&conn.get_as::<Proxy>(2).unwrap(), &callback));
    }

    #[tokio::test]
    async fn test_get_as_requires_live_object() {
        let (conn, _server) = connection();
        conn.create(&WL_CALLBACK, 1).unwrap();

        assert!(matches!(
            conn.get_as::<Proxy>(7),
            Err(WaywireError::UnknownObject(7))
        ));
        assert!(matches!(
            conn.get_as::<Ticker>(1),
            Err(WaywireError::Protocol(_))
        ));

        conn.destroy(1).unwrap();
        assert!(matches!(
            conn.get_as::<Proxy>(1),
            Err(WaywireError::UnknownObject(1))
        ));

        let ticker = conn
            .create_with(&TEST_MANAGER, 2, |data| Ticker {
                data,
                notes: Default::default(),
            })
            .unwrap();
        let mut reader = encode(ticker.id(), 1, &[Argument::Uint(0)]);
        assert!(conn.read(&mut reader).unwrap());
        conn.dispatch_pending().unwrap();

        let found = conn.get_as::<Ticker>(ticker.id()).unwrap();
        assert_eq!(found.notes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_destroyed_id_comes_back_with_fresh_state() {
        let (conn, _server) = connection();
        let first = conn.create(&WL_CALLBACK, 1).unwrap();
        first.on("done", |_, _| Ok(())).unwrap();
        let first_ptr = Arc::as_ptr(&first);
        drop(first);

        conn.destroy(1).unwrap();
        let second = conn.create(&WL_CALLBACK, 1).unwrap();

        // Same id, same instance, handlers gone
        assert_eq!(second.id(), 1);
        assert_eq!(Arc::as_ptr(&second), first_ptr);
        assert!(!second.has_handler(0));
    }

    #[tokio::test]
    async fn test_shared_instance_is_not_recycled() {
        let (conn, _server) = connection();
        let held = conn.create(&WL_CALLBACK, 1).unwrap();
        conn.destroy(1).unwrap();

        let fresh = conn.create(&WL_CALLBACK, 1).unwrap();
        assert_eq!(fresh.id(), 1);
        assert!(!Arc::ptr_eq(&held, &fresh));
    }

    #[tokio::test]
    async fn test_other_interface_is_not_recycled() {
        let (conn, _server) = connection();
        drop(conn.create(&WL_CALLBACK, 1).unwrap());
        conn.destroy(1).unwrap();

        let manager = conn.create(&TEST_MANAGER, 2).unwrap();
        assert_eq!(manager.id(), 1);
        assert_eq!(manager.interface().name, "test_manager");
    }

    #[tokio::test]
    async fn test_double_destroy_fails() {
        let (conn, _server) = connection();
        conn.create(&WL_CALLBACK, 1).unwrap();
        conn.destroy(1).unwrap();
        assert!(matches!(conn.destroy(1), Err(WaywireError::NotLive(1))));
        assert!(matches!(
            conn.destroy(0),
            Err(WaywireError::UnknownNamespace(0))
        ));
    }

    #[tokio::test]
    async fn test_marshal_checks_request_signature() {
        let (conn, _server) = connection();
        let manager = conn.create(&TEST_MANAGER, 2).unwrap();

        assert!(matches!(
            conn.marshal(manager.id(), 0, &[Argument::from("x")]),
            Err(WaywireError::Protocol(_))
        ));
        assert!(matches!(
            conn.marshal(manager.id(), 3, &[]),
            Err(WaywireError::UnknownOpcode { opcode: 3, .. })
        ));
        assert_eq!(conn.pending_bytes(), 0);

        conn.marshal(manager.id(), 0, &[Argument::Uint(7)]).unwrap();
        assert_eq!(conn.pending_bytes(), 12);
    }

    #[tokio::test]
    async fn test_read_queues_then_dispatch_delivers() {
        let (conn, _server) = connection();
        let manager = conn.create(&TEST_MANAGER, 2).unwrap();
        let fired = Arc::new(AtomicBool::new(false));

        let fired_clone = fired.clone();
        manager
            .on("note", move |_, args| {
                assert_eq!(args[0].as_uint()?, 11);
                fired_clone.store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let mut reader = encode(1, 1, &[Argument::Uint(11)]);
        assert!(conn.read(&mut reader).unwrap());
        assert_eq!(reader.remaining(), 0);
        assert!(!fired.load(Ordering::SeqCst));

        assert!(conn.dispatch_pending().unwrap());
        assert!(fired.load(Ordering::SeqCst));
        assert!(!conn.dispatch_pending().unwrap());
    }

    #[tokio::test]
    async fn test_read_skips_unknown_target() {
        let (conn, _server) = connection();
        conn.create(&TEST_MANAGER, 2).unwrap();

        let mut writer = MessageWriter::new();
        writer
            .write_message(40, 0, &[Argument::from("ignored")])
            .unwrap();
        writer.write_message(1, 1, &[Argument::Uint(3)]).unwrap();
        let (bytes, _) = writer.take();
        let mut reader = MessageReader::new();
        reader.extend(&bytes);

        assert!(!conn.read(&mut reader).unwrap());
        // Cursor landed on the next message
        assert!(conn.read(&mut reader).unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    #[tokio::test]
    async fn test_read_rejects_unknown_opcode() {
        let (conn, _server) = connection();
        conn.create(&WL_CALLBACK, 1).unwrap();

        let mut writer = MessageWriter::new();
        writer.write_message(1, 5, &[Argument::Uint(0xABCD)]).unwrap();
        writer.write_message(1, 0, &[Argument::Uint(7)]).unwrap();
        let (bytes, _) = writer.take();
        let mut reader = MessageReader::new();
        reader.extend(&bytes);

        let err = conn.read(&mut reader).unwrap_err();
        assert!(matches!(
            err,
            WaywireError::UnknownOpcode {
                object: 1,
                interface: "wl_callback",
                opcode: 5
            }
        ));

        // The payload was skipped, not taken for the next header
        let next = reader.peek_header().unwrap();
        assert_eq!((next.object_id, next.opcode, next.size), (1, 0, 12));
        assert!(conn.read(&mut reader).unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    #[tokio::test]
    async fn test_read_materializes_remote_new_id() {
        let (conn, _server) = connection();
        conn.create(&TEST_MANAGER, 2).unwrap();

        let mut reader = encode(
            1,
            0,
            &[Argument::NewId(REMOTE_ID_BASE), Argument::from("text/plain")],
        );
        assert!(conn.read(&mut reader).unwrap());

        let offer = conn.get(REMOTE_ID_BASE).unwrap();
        assert_eq!(offer.interface().name, "test_offer");
        assert_eq!(offer.version(), 2);

        // The same id again while live is a protocol violation
        let mut reader = encode(
            1,
            0,
            &[Argument::NewId(REMOTE_ID_BASE), Argument::from("text/html")],
        );
        assert!(matches!(
            conn.read(&mut reader),
            Err(WaywireError::SlotOccupied(_))
        ));
    }

    #[tokio::test]
    async fn test_read_rejects_peer_id_in_local_range() {
        let (conn, _server) = connection();
        conn.create(&TEST_MANAGER, 2).unwrap();

        for id in [0x0010_0000, 0xFEFF_FFFF] {
            let mut reader = encode(1, 0, &[Argument::NewId(id), Argument::from("text/plain")]);
            assert!(matches!(
                conn.read(&mut reader),
                Err(WaywireError::Protocol(_))
            ));
            assert!(conn.get(id).is_none());
        }
        assert_eq!(conn.live_objects(), 1);
        assert!(!conn.dispatch_pending().unwrap());

        // Local allocation carries on undisturbed
        assert_eq!(conn.create(&WL_CALLBACK, 1).unwrap().id(), 2);
    }

    #[tokio::test]
    async fn test_retired_object_drops_events_until_destroyed() {
        let (conn, _server) = connection();
        let manager = conn.create(&TEST_MANAGER, 2).unwrap();
        let fired = Arc::new(AtomicBool::new(false));

        let fired_clone = fired.clone();
        manager
            .on("note", move |_, _| {
                fired_clone.store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        conn.retire(1).unwrap();
        assert!(conn.is_retired(1));

        let mut reader = encode(1, 1, &[Argument::Uint(1)]);
        assert!(conn.read(&mut reader).unwrap());
        assert!(!conn.dispatch_pending().unwrap());
        assert!(!fired.load(Ordering::SeqCst));

        // Still reserved until the acknowledgement
        assert_eq!(conn.create(&WL_CALLBACK, 1).unwrap().id(), 2);
        conn.destroy(1).unwrap();
        assert!(!conn.is_retired(1));
        assert_eq!(conn.create(&WL_CALLBACK, 1).unwrap().id(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_never_interleave() {
        const SENDERS: u32 = 4;
        const PER_SENDER: u32 = 50;
        const UNTRACKED: u32 = 40;

        fn label(value: u32) -> String {
            format!("sender {} message {}", value >> 16, value & 0xFFFF)
        }

        let (conn, server) = connection();
        conn.create(&TEST_MANAGER, 2).unwrap();

        std::thread::scope(|scope| {
            for sender in 0..SENDERS {
                let conn = &conn;
                scope.spawn(move || {
                    for seq in 0..PER_SENDER {
                        let value = sender << 16 | seq;
                        conn.marshal(1, 0, &[Argument::Uint(value)]).unwrap();
                        conn.marshal(
                            UNTRACKED,
                            0,
                            &[Argument::Uint(value), Argument::from(label(value).as_str())],
                        )
                        .unwrap();
                    }
                });
            }
        });
        conn.flush(Duration::ZERO).await.unwrap();

        let server = Wire::new(Box::new(server));
        let total = SENDERS * PER_SENDER * 2;
        let mut pings: Vec<Vec<u32>> = vec![Vec::new(); SENDERS as usize];
        let mut decoded = 0;
        for _ in 0..100 {
            if decoded == total {
                break;
            }
            server.flush(Duration::from_secs(5)).await.unwrap();
            let mut reader = server.inbound().await;
            while reader.has_message() {
                let header = reader.read_header().unwrap();
                match header.object_id {
                    1 => {
                        assert_eq!(header.size, 12);
                        let args = reader.read_arguments(&[ArgKind::Uint]).unwrap();
                        let value = args[0].as_uint().unwrap();
                        pings[(value >> 16) as usize].push(value & 0xFFFF);
                    }
                    UNTRACKED => {
                        let args = reader
                            .read_arguments(&[ArgKind::Uint, ArgKind::String])
                            .unwrap();
                        let value = args[0].as_uint().unwrap();
                        assert_eq!(args[1].as_str().unwrap(), label(value));
                    }
                    other => panic!("message torn apart, header names object {}", other),
                }
                decoded += 1;
            }
        }

        assert_eq!(decoded, total);
        let expected: Vec<u32> = (0..PER_SENDER).collect();
        for sent in &pings {
            assert_eq!(sent, &expected);
        }
    }

    #[tokio::test]
    async fn test_closed_connection_fails_fast() {
        let (conn, _server) = connection();
        conn.create(&WL_DISPLAY, 1).unwrap();
        conn.close().unwrap();

        assert!(conn.is_closed());
        assert!(matches!(
            conn.marshal(1, 0, &[Argument::NewId(2)]),
            Err(WaywireError::ConnectionClosed)
        ));
        assert!(matches!(
            conn.flush(Duration::ZERO).await,
            Err(WaywireError::ConnectionClosed)
        ));
    }
}
