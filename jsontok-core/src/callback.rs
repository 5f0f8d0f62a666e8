//! Observer registration with drop-to-deregister handles.
//!
//! Registering a callback returns a [`Subscription`]; the callback fires for
//! every matching event until the subscription is dropped. Slots are reused
//! once dead, so long-lived tokenizers do not accumulate garbage entries.

use std::cell::Cell;
use std::rc::Rc;

struct Slot<F> {
    callback: F,
    live: Rc<Cell<bool>>,
}

/// Handle keeping one registered callback alive.
///
/// Dropping the subscription deregisters the callback. Call
/// [`Subscription::detach`] to keep it registered for the life of the owner
/// without holding the handle.
#[derive(Debug)]
pub struct Subscription {
    live: Rc<Cell<bool>>,
}

impl Subscription {
    /// Leave the callback registered permanently and discard the handle.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.live.set(false);
    }
}

/// Slot table of callbacks of one signature.
pub(crate) struct CallbackSet<F> {
    slots: Vec<Slot<F>>,
}

impl<F> CallbackSet<F> {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    pub fn add(&mut self, callback: F) -> Subscription {
        let live = Rc::new(Cell::new(true));
        match self.slots.iter_mut().find(|slot| !slot.live.get()) {
            Some(slot) => {
                slot.callback = callback;
                slot.live = Rc::clone(&live);
            }
            None => self.slots.push(Slot {
                callback,
                live: Rc::clone(&live),
            }),
        }
        Subscription { live }
    }

    /// Invoke every live callback through `invoke_one`.
    pub fn invoke(&mut self, mut invoke_one: impl FnMut(&mut F)) {
        for slot in &mut self.slots {
            if slot.live.get() {
                invoke_one(&mut slot.callback);
            }
        }
    }
}

impl<F> Default for CallbackSet<F> {
    fn default() -> Self {
        Self::new()
    }
}
