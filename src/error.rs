//! Error types for waywire-client.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for all waywire operations.
#[derive(Debug, Error)]
pub enum WaywireError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not connect to the compositor socket.
    #[error("Failed to connect to {}: {source}", path.display())]
    Connect {
        /// Resolved socket path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Connection closed by the peer, or closed locally.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A relative display name was given but no runtime directory is set.
    #[error("XDG_RUNTIME_DIR is not set, cannot resolve relative display name")]
    NoRuntimeDir,

    /// Malformed data on the wire, or arguments not matching a signature.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Encoded message would not fit the 16-bit size field.
    #[error("Message of {0} bytes exceeds the maximum message size")]
    MessageTooLarge(usize),

    /// Opcode has no entry in the target interface's table.
    #[error("Unknown opcode {opcode} for {interface}@{object}")]
    UnknownOpcode {
        /// Target object id.
        object: u32,
        /// Interface name of the target.
        interface: &'static str,
        /// Offending opcode.
        opcode: u16,
    },

    /// No live object with this id in either namespace.
    #[error("Unknown object id {0}")]
    UnknownObject(u32),

    /// Destroy or lookup of an id that holds no live object.
    #[error("No live object with id {0}")]
    NotLive(u32),

    /// Id falls outside the bounds of its namespace.
    #[error("Object id {0:#010x} is out of range for its namespace")]
    IdOutOfRange(u32),

    /// Id belongs to neither the local nor the remote namespace.
    #[error("Object id {0} belongs to no namespace")]
    UnknownNamespace(u32),

    /// Explicit insert at an id that is still live.
    #[error("Object id {0} is already in use")]
    SlotOccupied(u32),

    /// Fatal error event sent by the compositor.
    #[error("Fatal protocol error on object {object} (code {code}): {message}")]
    Fatal {
        /// Object the error refers to.
        object: u32,
        /// Interface-specific error code.
        code: u32,
        /// Human readable description.
        message: String,
    },
}

impl WaywireError {
    /// Whether the connection is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WaywireError::Io(_)
                | WaywireError::Connect { .. }
                | WaywireError::ConnectionClosed
                | WaywireError::Protocol(_)
                | WaywireError::UnknownOpcode { .. }
                | WaywireError::Fatal { .. }
        )
    }
}

/// Result type alias using WaywireError.
pub type Result<T> = std::result::Result<T, WaywireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(WaywireError::ConnectionClosed.is_fatal());
        assert!(WaywireError::Fatal {
            object: 1,
            code: 0,
            message: "bad".into()
        }
        .is_fatal());
        assert!(!WaywireError::NotLive(3).is_fatal());
        assert!(!WaywireError::IdOutOfRange(0xFF00_0000).is_fatal());
    }

    #[test]
    fn test_display_messages() {
        let err = WaywireError::UnknownOpcode {
            object: 7,
            interface: "wl_callback",
            opcode: 4,
        };
        assert_eq!(err.to_string(), "Unknown opcode 4 for wl_callback@7");
        assert_eq!(
            WaywireError::IdOutOfRange(0xFF00_0000).to_string(),
            "Object id 0xff000000 is out of range for its namespace"
        );
    }
}
