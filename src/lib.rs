//! # waywire-client
//!
//! Client-side engine for the Wayland wire protocol.
//!
//! This crate speaks the binary object protocol over a local Unix socket:
//! framing, file descriptor passing, the object table and event dispatch.
//! Interface bindings beyond the core `wl_display`, `wl_registry` and
//! `wl_callback` are described by the application as static
//! [`Interface`](protocol::Interface) tables and driven through [`Proxy`].
//!
//! ## Architecture
//!
//! - **Transport**: [`transport`] (socket + `SCM_RIGHTS`), [`codec`]
//!   (argument encodings), [`wire`] (buffered flush/receive)
//! - **Connection**: [`connection`] (dual id namespaces, marshal, decode,
//!   pending-event queue)
//! - **Objects**: [`object`] (the [`Object`] contract and generic [`Proxy`])
//! - **Session**: [`display`] (bootstrap, dispatch loop, roundtrip)
//!
//! ## Example
//!
//! ```ignore
//! use waywire_client::Display;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let display = Display::builder().socket("wayland-1").connect().await?;
//!     let registry = display.get_registry()?;
//!     display.roundtrip().await?;
//!
//!     let seat = registry.find("wl_seat").ok_or("no seat")?;
//!     let seat = registry.bind(seat.name, &WL_SEAT, 7)?;
//!     seat.on("name", |_, args| {
//!         println!("seat: {}", args[0].as_str()?);
//!         Ok(())
//!     })?;
//!     display.roundtrip().await?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod connection;
pub mod display;
pub mod error;
pub mod object;
pub mod protocol;
pub mod trace;
pub mod transport;
pub mod wire;

pub use connection::Connection;
pub use display::{Callback, Display, DisplayBuilder, DisplayConfig, Global, Registry};
pub use error::{Result, WaywireError};
pub use object::{Object, ObjectData, Proxy};
pub use protocol::{ArgKind, Argument, Interface, MessageDesc};
