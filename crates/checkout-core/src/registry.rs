//! Single-slot Callback Registry
//!
//! Long-lived external components (the wallet payment button, for example)
//! call back into checkout asynchronously. They read the handler from a slot
//! at invocation time instead of holding the closure they were created with.
//! Only the most recently registered handler is live.

use std::sync::{Arc, RwLock};

/// Holds at most one handler
pub struct CallbackSlot<H: ?Sized> {
    handler: RwLock<Option<Arc<H>>>,
}

impl<H: ?Sized> Default for CallbackSlot<H> {
    fn default() -> Self {
        Self {
            handler: RwLock::new(None),
        }
    }
}

impl<H: ?Sized> std::fmt::Debug for CallbackSlot<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSlot")
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl<H: ?Sized> CallbackSlot<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`, replacing any previous one
    pub fn set(&self, handler: Arc<H>) {
        if let Ok(mut slot) = self.handler.write() {
            *slot = Some(handler);
        }
    }

    /// The live handler, if any
    pub fn get(&self) -> Option<Arc<H>> {
        self.handler.read().ok().and_then(|slot| slot.clone())
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.handler.write() {
            *slot = None;
        }
    }

    pub fn is_registered(&self) -> bool {
        self.handler.read().map(|slot| slot.is_some()).unwrap_or(false)
    }
}
