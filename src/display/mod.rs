//! Display module - session bootstrap, dispatch loop and roundtrip.
//!
//! The [`Display`] owns the root `wl_display` object (always id 1) and drives
//! the connection:
//! 1. Flush buffered requests
//! 2. Wait (bounded) for input and decode every complete message
//! 3. Run the queued event handlers in order
//!
//! # Example
//!
//! ```ignore
//! use waywire_client::Display;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let display = Display::connect().await?;
//!     let registry = display.get_registry()?;
//!     display.roundtrip().await?;
//!
//!     for global in registry.globals() {
//!         println!("{} {} v{}", global.name, global.interface, global.version);
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::connection::Connection;
use crate::error::{Result, WaywireError};
use crate::object::{Object, Proxy};
use crate::protocol::{
    Argument, DISPLAY_DELETE_ID, DISPLAY_ERROR, DISPLAY_GET_REGISTRY, DISPLAY_SYNC, WL_CALLBACK,
    WL_DISPLAY, WL_REGISTRY,
};
use crate::trace;
use crate::transport::{socket_path_from_env, Transport, UnixTransport};

mod callback;
mod registry;

pub use callback::Callback;
pub use registry::{Global, GlobalListener, Registry};

/// Default time `dispatch` waits for input.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(1);

/// Argument at `index`, or a protocol error if the event was short.
pub(crate) fn arg(args: &[Argument], index: usize) -> Result<&Argument> {
    args.get(index)
        .ok_or_else(|| WaywireError::Protocol(format!("missing argument {}", index)))
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct DisplayConfig {
    /// Socket name or path. `None` uses `$WAYLAND_DISPLAY`, then `wayland-0`.
    pub socket: Option<PathBuf>,
    /// How long `dispatch` waits for input.
    pub dispatch_timeout: Duration,
    /// Print every request and event to stdout.
    pub trace: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            socket: None,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            trace: trace::enabled_from_env(),
        }
    }
}

/// Builder for connecting a [`Display`].
pub struct DisplayBuilder {
    config: DisplayConfig,
}

impl DisplayBuilder {
    /// Create a builder with defaults taken from the environment.
    pub fn new() -> Self {
        Self {
            config: DisplayConfig::default(),
        }
    }

    /// Connect to this socket name or path instead of `$WAYLAND_DISPLAY`.
    ///
    /// Relative names are resolved under `$XDG_RUNTIME_DIR`.
    pub fn socket(mut self, socket: impl Into<PathBuf>) -> Self {
        self.config.socket = Some(socket.into());
        self
    }

    /// Set how long `dispatch` waits for input.
    ///
    /// Default: 1 second
    pub fn dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.config.dispatch_timeout = timeout;
        self
    }

    /// Enable or disable protocol tracing on stdout.
    ///
    /// Default: on when `WAYLAND_DEBUG` is `1` or contains `client`
    pub fn trace(mut self, enabled: bool) -> Self {
        self.config.trace = enabled;
        self
    }

    /// Resolve the socket path and connect.
    pub async fn connect(self) -> Result<Display> {
        let path = socket_path_from_env(self.config.socket.as_deref())?;
        tracing::debug!("Connecting to {}", path.display());
        let transport = UnixTransport::connect(&path).await?;
        Display::with_transport(Box::new(transport), self.config)
    }

    /// Bootstrap over an already connected transport.
    pub fn connect_with(self, transport: Box<dyn Transport>) -> Result<Display> {
        Display::with_transport(transport, self.config)
    }
}

impl Default for DisplayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A client session: the connection plus its root `wl_display` object.
pub struct Display {
    connection: Arc<Connection>,
    proxy: Arc<Proxy>,
    config: DisplayConfig,
}

impl Display {
    /// Create a new display builder.
    pub fn builder() -> DisplayBuilder {
        DisplayBuilder::new()
    }

    /// Connect using the environment's display settings.
    pub async fn connect() -> Result<Self> {
        DisplayBuilder::new().connect().await
    }

    /// Bootstrap a session over `transport`.
    ///
    /// Allocates `wl_display` at id 1 and installs the built-in handlers:
    /// `error` fails the dispatch with [`WaywireError::Fatal`], `delete_id`
    /// frees the acknowledged id.
    pub fn with_transport(transport: Box<dyn Transport>, config: DisplayConfig) -> Result<Self> {
        let connection = Connection::new(transport, config.trace);
        let proxy = connection.create(&WL_DISPLAY, 1)?;
        if proxy.id() != 1 {
            return Err(WaywireError::Protocol(format!(
                "wl_display allocated at {}",
                proxy.id()
            )));
        }

        proxy.on_opcode(DISPLAY_ERROR, |_, args| {
            let object = arg(&args, 0)?.as_object()?;
            let code = arg(&args, 1)?.as_uint()?;
            let message = arg(&args, 2)?.as_str()?.to_string();
            tracing::error!(
                "Compositor error on object {} (code {}): {}",
                object,
                code,
                message
            );
            Err(WaywireError::Fatal {
                object,
                code,
                message,
            })
        })?;

        proxy.on_opcode(DISPLAY_DELETE_ID, |display, args| {
            let id = arg(&args, 0)?.as_uint()?;
            let connection = display.connection().ok_or(WaywireError::ConnectionClosed)?;
            match connection.destroy(id) {
                Err(WaywireError::NotLive(id)) => {
                    tracing::warn!("delete_id for object {} that is not live", id);
                    Ok(())
                }
                other => other,
            }
        })?;

        Ok(Self {
            connection,
            proxy,
            config,
        })
    }

    /// The `wl_display` proxy.
    pub fn proxy(&self) -> &Arc<Proxy> {
        &self.proxy
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Active configuration.
    pub fn config(&self) -> &DisplayConfig {
        &self.config
    }

    /// Ask the compositor for a `done` event once it has processed every
    /// request sent so far.
    pub fn sync(&self) -> Result<Callback> {
        let callback = self.connection.create(&WL_CALLBACK, 1)?;
        if let Err(e) = self
            .proxy
            .request_opcode(DISPLAY_SYNC, &[Argument::NewId(callback.id())])
        {
            self.connection.destroy(callback.id())?;
            return Err(e);
        }
        Ok(Callback::new(callback))
    }

    /// Create the registry. Globals arrive with the next dispatch.
    pub fn get_registry(&self) -> Result<Registry> {
        let proxy = self.connection.create(&WL_REGISTRY, 1)?;
        if let Err(e) = self
            .proxy
            .request_opcode(DISPLAY_GET_REGISTRY, &[Argument::NewId(proxy.id())])
        {
            self.connection.destroy(proxy.id())?;
            return Err(e);
        }
        Registry::new(proxy)
    }

    /// One dispatch cycle with the configured timeout.
    pub async fn dispatch(&self) -> Result<bool> {
        self.dispatch_timeout(self.config.dispatch_timeout).await
    }

    /// One dispatch cycle: flush, wait up to `timeout` for input, decode
    /// every complete message, then run the queued handlers.
    ///
    /// Returns whether any handler ran. `Duration::ZERO` polls without
    /// waiting.
    pub async fn dispatch_timeout(&self, timeout: Duration) -> Result<bool> {
        let available = self.connection.flush(timeout).await?;
        if available > 0 {
            let queued = self.connection.read_messages().await?;
            tracing::trace!("Decoded {} messages", queued);
        }
        self.dispatch_pending()
    }

    /// Run queued handlers without touching the socket.
    pub fn dispatch_pending(&self) -> Result<bool> {
        self.connection.dispatch_pending()
    }

    /// Block until the compositor has processed every request sent so far
    /// and every resulting event has been dispatched.
    ///
    /// Returns the callback data of the `done` event.
    pub async fn roundtrip(&self) -> Result<u32> {
        let callback = self.sync()?;
        let done = Arc::new(AtomicBool::new(false));
        let serial = Arc::new(AtomicU32::new(0));

        let done_flag = done.clone();
        let done_serial = serial.clone();
        callback.on_done(move |data| {
            done_serial.store(data, Ordering::Release);
            done_flag.store(true, Ordering::Release);
            Ok(())
        })?;

        while !done.load(Ordering::Acquire) {
            self.dispatch().await?;
        }
        Ok(serial.load(Ordering::Acquire))
    }

    /// Send buffered requests without waiting for events.
    pub async fn flush(&self) -> Result<()> {
        self.connection.send_pending().await
    }

    /// Close the session. Every later operation fails with
    /// [`WaywireError::ConnectionClosed`].
    pub fn close(&self) -> Result<()> {
        self.connection.close()
    }
}
