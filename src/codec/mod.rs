//! Codec module - primitive argument encodings on the byte buffers.
//!
//! - [`MessageWriter`] - encodes requests into the outbound buffer
//! - [`MessageReader`] - decodes events from the inbound buffer
//!
//! # Example
//!
//! ```
//! use waywire_client::codec::{MessageReader, MessageWriter};
//! use waywire_client::protocol::{ArgKind, Argument};
//!
//! let mut writer = MessageWriter::new();
//! writer.write_message(1, 0, &[Argument::from("hello")]).unwrap();
//!
//! let (bytes, _fds) = writer.take();
//! let mut reader = MessageReader::new();
//! reader.extend(&bytes);
//!
//! let header = reader.read_header().unwrap();
//! let args = reader.read_arguments(&[ArgKind::String]).unwrap();
//! assert_eq!(header.object_id, 1);
//! assert_eq!(args[0].as_str().unwrap(), "hello");
//! ```

mod reader;
mod writer;

pub use reader::MessageReader;
pub use writer::MessageWriter;
