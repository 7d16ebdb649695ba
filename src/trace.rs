//! Protocol tracing on stdout.
//!
//! Enabled by `WAYLAND_DEBUG=1` (or any value containing `client`). Each
//! request and event is printed as one line:
//!
//! ```text
//! [1234567.890]  -> wl_display@1.sync(new id wl_callback@2)
//! [1234567.912] wl_callback@2.done(41)
//! ```
//!
//! This output is diagnostic only. Regular logging goes through `tracing`.

use std::fmt::Write as _;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::{ArgKind, Argument};

/// Environment variable enabling protocol tracing.
pub const DEBUG_ENV: &str = "WAYLAND_DEBUG";

/// Whether a `WAYLAND_DEBUG` value turns client tracing on.
pub fn enabled_by(value: Option<&str>) -> bool {
    match value {
        Some(v) => v == "1" || v.split(',').any(|part| part.trim() == "client"),
        None => false,
    }
}

/// Read the tracing switch from the environment.
pub fn enabled_from_env() -> bool {
    enabled_by(std::env::var(DEBUG_ENV).ok().as_deref())
}

/// Direction of a traced message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to compositor.
    Request,
    /// Compositor to client.
    Event,
}

/// Format one traced message.
///
/// `lookup` maps an object id to its interface name for object arguments.
pub fn format_message(
    direction: Direction,
    interface: &str,
    object_id: u32,
    message: &str,
    signature: &[ArgKind],
    args: &[Argument],
    lookup: &dyn Fn(u32) -> Option<&'static str>,
) -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or(0);

    let mut line = format!(
        "[{:7}.{:03}] {}{}@{}.{}(",
        (micros / 1000) % 10_000_000,
        micros % 1000,
        if direction == Direction::Request { " -> " } else { "" },
        interface,
        object_id,
        message
    );

    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push_str(", ");
        }
        let _ = match arg {
            Argument::Int(v) => write!(line, "{}", v),
            Argument::Uint(v) => write!(line, "{}", v),
            Argument::Fixed(v) => write!(line, "{:.6}", v),
            Argument::String(s) => write!(line, "\"{}\"", s),
            Argument::Array(a) => write!(line, "array[{}]", a.len()),
            Argument::Object(0) => write!(line, "nil"),
            Argument::Object(id) => {
                write!(line, "{}@{}", lookup(*id).unwrap_or("[unknown]"), id)
            }
            Argument::NewId(id) => {
                let name = match signature.get(i) {
                    Some(ArgKind::NewId(Some(iface))) => iface.name,
                    _ => "[unknown]",
                };
                write!(line, "new id {}@{}", name, id)
            }
            Argument::Fd(fd) => {
                use std::os::fd::AsRawFd;
                write!(line, "fd {}", fd.as_raw_fd())
            }
        };
    }
    line.push(')');
    line
}

/// Append `line` and a newline to `out`, then flush.
pub fn emit<W: Write>(out: &mut W, line: &str) -> std::io::Result<()> {
    writeln!(out, "{}", line)?;
    out.flush()
}

/// [`emit`] to the process stdout.
pub fn emit_stdout(line: &str) -> std::io::Result<()> {
    emit(&mut std::io::stdout().lock(), line)
}
