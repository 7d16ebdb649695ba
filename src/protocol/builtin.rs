//! Tables for the interfaces the session layer drives itself.

use super::argument::ArgKind;
use super::interface::{Interface, MessageDesc};

/// `wl_display.sync` request opcode.
pub const DISPLAY_SYNC: u16 = 0;
/// `wl_display.get_registry` request opcode.
pub const DISPLAY_GET_REGISTRY: u16 = 1;
/// `wl_display.error` event opcode.
pub const DISPLAY_ERROR: u16 = 0;
/// `wl_display.delete_id` event opcode.
pub const DISPLAY_DELETE_ID: u16 = 1;

/// `wl_registry.bind` request opcode.
pub const REGISTRY_BIND: u16 = 0;
/// `wl_registry.global` event opcode.
pub const REGISTRY_GLOBAL: u16 = 0;
/// `wl_registry.global_remove` event opcode.
pub const REGISTRY_GLOBAL_REMOVE: u16 = 1;

/// `wl_callback.done` event opcode.
pub const CALLBACK_DONE: u16 = 0;

/// Core global object, always id 1.
pub static WL_DISPLAY: Interface = Interface {
    name: "wl_display",
    version: 1,
    requests: &[
        MessageDesc::new("sync", &[ArgKind::NewId(Some(&WL_CALLBACK))]),
        MessageDesc::new("get_registry", &[ArgKind::NewId(Some(&WL_REGISTRY))]),
    ],
    events: &[
        MessageDesc::new("error", &[ArgKind::Object, ArgKind::Uint, ArgKind::String]),
        MessageDesc::new("delete_id", &[ArgKind::Uint]),
    ],
};

/// Global registry object.
pub static WL_REGISTRY: Interface = Interface {
    name: "wl_registry",
    version: 1,
    requests: &[MessageDesc::new(
        "bind",
        &[ArgKind::Uint, ArgKind::String, ArgKind::Uint, ArgKind::NewId(None)],
    )],
    events: &[
        MessageDesc::new("global", &[ArgKind::Uint, ArgKind::String, ArgKind::Uint]),
        MessageDesc::new("global_remove", &[ArgKind::Uint]),
    ],
};

/// One-shot completion callback.
pub static WL_CALLBACK: Interface = Interface {
    name: "wl_callback",
    version: 1,
    requests: &[],
    events: &[MessageDesc::new("done", &[ArgKind::Uint])],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcodes_match_tables() {
        assert_eq!(WL_DISPLAY.request_opcode("sync"), Some(DISPLAY_SYNC));
        assert_eq!(
            WL_DISPLAY.request_opcode("get_registry"),
            Some(DISPLAY_GET_REGISTRY)
        );
        assert_eq!(WL_DISPLAY.event_opcode("error"), Some(DISPLAY_ERROR));
        assert_eq!(WL_DISPLAY.event_opcode("delete_id"), Some(DISPLAY_DELETE_ID));
        assert_eq!(WL_REGISTRY.request_opcode("bind"), Some(REGISTRY_BIND));
        assert_eq!(WL_REGISTRY.event_opcode("global"), Some(REGISTRY_GLOBAL));
        assert_eq!(
            WL_REGISTRY.event_opcode("global_remove"),
            Some(REGISTRY_GLOBAL_REMOVE)
        );
        assert_eq!(WL_CALLBACK.event_opcode("done"), Some(CALLBACK_DONE));
    }

    #[test]
    fn test_new_id_kinds_carry_interfaces() {
        let sync = WL_DISPLAY.request(DISPLAY_SYNC).unwrap();
        match sync.signature[0] {
            ArgKind::NewId(Some(iface)) => assert_eq!(iface.name, "wl_callback"),
            other => panic!("unexpected kind {:?}", other),
        }

        let bind = WL_REGISTRY.request(REGISTRY_BIND).unwrap();
        assert_eq!(bind.signature[3], ArgKind::NewId(None));
    }
}
