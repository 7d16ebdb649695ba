//! One-shot completion callback (`wl_callback`).

use std::sync::Arc;

use super::arg;
use crate::error::Result;
use crate::object::{Object, Proxy};
use crate::protocol::CALLBACK_DONE;

/// Handle to a `wl_callback`. Fires `done` once.
#[derive(Debug, Clone)]
pub struct Callback {
    proxy: Arc<Proxy>,
}

impl Callback {
    pub(crate) fn new(proxy: Arc<Proxy>) -> Self {
        Self { proxy }
    }

    /// Object id.
    pub fn id(&self) -> u32 {
        self.proxy.id()
    }

    /// Underlying proxy.
    pub fn proxy(&self) -> &Arc<Proxy> {
        &self.proxy
    }

    /// Run `handler` with the callback data when `done` arrives.
    pub fn on_done<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(u32) -> Result<()> + Send + Sync + 'static,
    {
        self.proxy.on_opcode(CALLBACK_DONE, move |_, args| {
            handler(arg(&args, 0)?.as_uint()?)
        })
    }
}
