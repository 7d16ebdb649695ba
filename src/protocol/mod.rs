//! Protocol module - wire format, argument kinds and interface tables.
//!
//! This module implements the static side of the protocol:
//! - 8-byte header encoding/decoding and the two id namespaces
//! - Argument values and their wire kinds
//! - Interface tables (requests/events in opcode order)

mod argument;
mod builtin;
mod interface;
mod wire_format;

pub use builtin::{
    CALLBACK_DONE, DISPLAY_DELETE_ID, DISPLAY_ERROR, DISPLAY_GET_REGISTRY, DISPLAY_SYNC,
    REGISTRY_BIND, REGISTRY_GLOBAL, REGISTRY_GLOBAL_REMOVE, WL_CALLBACK, WL_DISPLAY, WL_REGISTRY,
};
pub use argument::{check_signature, ArgKind, Argument};
pub use interface::{Interface, MessageDesc};
pub use wire_format::{
    pad4, Header, Namespace, HEADER_SIZE, LOCAL_ID_BASE, LOCAL_ID_MAX, MAX_MESSAGE_SIZE, NULL_ID,
    REMOTE_ID_BASE, REMOTE_ID_MAX,
};
