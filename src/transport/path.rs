//! Compositor socket path resolution.
//!
//! Order of precedence:
//! 1. an explicit name or path given by the caller
//! 2. `$WAYLAND_DISPLAY`
//! 3. `wayland-0`
//!
//! Absolute names are used verbatim; relative ones are joined under
//! `$XDG_RUNTIME_DIR`.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Result, WaywireError};

/// Environment variable naming the display socket.
pub const DISPLAY_ENV: &str = "WAYLAND_DISPLAY";

/// Environment variable naming the runtime directory.
pub const RUNTIME_DIR_ENV: &str = "XDG_RUNTIME_DIR";

/// Display name used when nothing else is configured.
pub const DEFAULT_DISPLAY: &str = "wayland-0";

/// Resolve a socket path from explicit inputs.
///
/// Empty values count as unset.
pub fn resolve_socket_path(
    hint: Option<&Path>,
    display: Option<OsString>,
    runtime_dir: Option<OsString>,
) -> Result<PathBuf> {
    let name = match hint.filter(|p| !p.as_os_str().is_empty()) {
        Some(p) => p.to_path_buf(),
        None => display
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DISPLAY)),
    };

    if name.is_absolute() {
        return Ok(name);
    }

    let runtime_dir = runtime_dir
        .filter(|d| !d.is_empty())
        .ok_or(WaywireError::NoRuntimeDir)?;
    Ok(PathBuf::from(runtime_dir).join(name))
}

/// Resolve a socket path using the process environment.
pub fn socket_path_from_env(hint: Option<&Path>) -> Result<PathBuf> {
    resolve_socket_path(hint, env::var_os(DISPLAY_ENV), env::var_os(RUNTIME_DIR_ENV))
}
