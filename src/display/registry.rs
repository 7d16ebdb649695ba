//! Global registry (`wl_registry`).
//!
//! The compositor advertises every global it offers with a `global` event
//! and withdraws it with `global_remove`. The [`Registry`] keeps the current
//! list and binds globals into typed objects.

use std::sync::{Arc, Mutex, PoisonError};

use super::arg;
use crate::error::{Result, WaywireError};
use crate::object::{Object, ObjectData, Proxy};
use crate::protocol::{Argument, Interface, REGISTRY_BIND, REGISTRY_GLOBAL, REGISTRY_GLOBAL_REMOVE};

/// A global advertised by the compositor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    /// Numeric name, used to bind.
    pub name: u32,
    /// Interface name, e.g. `"wl_compositor"`.
    pub interface: String,
    /// Highest version the compositor supports.
    pub version: u32,
}

/// Listener for global announcements or removals.
pub type GlobalListener = Arc<dyn Fn(&Global) -> Result<()> + Send + Sync>;

#[derive(Default)]
struct RegistryState {
    globals: Vec<Global>,
    added: Vec<GlobalListener>,
    removed: Vec<GlobalListener>,
}

/// Handle to the `wl_registry`.
#[derive(Clone)]
pub struct Registry {
    proxy: Arc<Proxy>,
    state: Arc<Mutex<RegistryState>>,
}

impl Registry {
    /// Wrap a registry proxy and start tracking globals.
    pub(crate) fn new(proxy: Arc<Proxy>) -> Result<Self> {
        let state = Arc::new(Mutex::new(RegistryState::default()));

        let added_state = state.clone();
        proxy.on_opcode(REGISTRY_GLOBAL, move |_, args| {
            let global = Global {
                name: arg(&args, 0)?.as_uint()?,
                interface: arg(&args, 1)?.as_str()?.to_string(),
                version: arg(&args, 2)?.as_uint()?,
            };

            let listeners = {
                let mut state = lock(&added_state);
                state.globals.retain(|g| g.name != global.name);
                state.globals.push(global.clone());
                state.added.clone()
            };
            for listener in listeners {
                listener(&global)?;
            }
            Ok(())
        })?;

        let removed_state = state.clone();
        proxy.on_opcode(REGISTRY_GLOBAL_REMOVE, move |_, args| {
            let name = arg(&args, 0)?.as_uint()?;

            let (global, listeners) = {
                let mut state = lock(&removed_state);
                let Some(pos) = state.globals.iter().position(|g| g.name == name) else {
                    tracing::warn!("global_remove for unknown global {}", name);
                    return Ok(());
                };
                (state.globals.remove(pos), state.removed.clone())
            };
            for listener in listeners {
                listener(&global)?;
            }
            Ok(())
        })?;

        Ok(Self { proxy, state })
    }

    /// Object id.
    pub fn id(&self) -> u32 {
        self.proxy.id()
    }

    /// Underlying proxy.
    pub fn proxy(&self) -> &Arc<Proxy> {
        &self.proxy
    }

    /// Globals currently advertised.
    pub fn globals(&self) -> Vec<Global> {
        lock(&self.state).globals.clone()
    }

    /// First advertised global with this interface name.
    pub fn find(&self, interface: &str) -> Option<Global> {
        lock(&self.state)
            .globals
            .iter()
            .find(|g| g.interface == interface)
            .cloned()
    }

    /// Call `listener` for every global announced from now on.
    pub fn on_global<F>(&self, listener: F)
    where
        F: Fn(&Global) -> Result<()> + Send + Sync + 'static,
    {
        lock(&self.state).added.push(Arc::new(listener));
    }

    /// Call `listener` for every global withdrawn from now on.
    pub fn on_global_remove<F>(&self, listener: F)
    where
        F: Fn(&Global) -> Result<()> + Send + Sync + 'static,
    {
        lock(&self.state).removed.push(Arc::new(listener));
    }

    /// Bind global `name` as a [`Proxy`] for `interface` at `version`.
    pub fn bind(
        &self,
        name: u32,
        interface: &'static Interface,
        version: u32,
    ) -> Result<Arc<Proxy>> {
        self.bind_with(name, interface, version, |data| Proxy::new(data, interface))
    }

    /// Bind global `name` as a custom object built by `factory`.
    pub fn bind_with<T, F>(
        &self,
        name: u32,
        interface: &'static Interface,
        version: u32,
        factory: F,
    ) -> Result<Arc<T>>
    where
        T: Object,
        F: FnOnce(ObjectData) -> T,
    {
        if version == 0 || version > interface.version {
            return Err(WaywireError::Protocol(format!(
                "cannot bind {} v{}, supported versions are 1..={}",
                interface.name, version, interface.version
            )));
        }

        let connection = self
            .proxy
            .connection()
            .ok_or(WaywireError::ConnectionClosed)?;
        let object = connection.create_with(interface, version, factory)?;

        let sent = self.proxy.request_opcode(
            REGISTRY_BIND,
            &[
                Argument::Uint(name),
                Argument::from(interface.name),
                Argument::Uint(version),
                Argument::NewId(object.id()),
            ],
        );
        if let Err(e) = sent {
            // Never announced to the peer, so the id can go straight back
            connection.destroy(object.id())?;
            return Err(e);
        }

        tracing::debug!(
            "Bound global {} as {}@{} v{}",
            name,
            interface.name,
            object.id(),
            version
        );
        Ok(object)
    }
}

fn lock(state: &Mutex<RegistryState>) -> std::sync::MutexGuard<'_, RegistryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
