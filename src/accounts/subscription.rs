//! Exactly-once release of an account subscription.
//!
//! The handle may arrive before or after teardown. Either way it is
//! released exactly once:
//!
//! ```text
//! Pending --fill--> Held --release--> Released (handle called)
//! Pending --release--> Released --fill--> Released (handle called on arrival)
//! ```

use std::sync::Mutex;

use crate::accounts::types::Unsubscribe;

enum Slot {
    Pending,
    Held(Unsubscribe),
    Released,
}

pub struct SubscriptionSlot {
    slot: Mutex<Slot>,
}

impl SubscriptionSlot {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
        }
    }

    /// Store the subscription handle.
    ///
    /// Returns `false` when the slot was already released (or filled); the
    /// handle is then called right away.
    pub fn fill(&self, unsubscribe: Unsubscribe) -> bool {
        let mut slot = self.slot.lock().expect("subscription slot mutex poisoned");
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Held(unsubscribe);
            return true;
        }
        drop(slot);
        unsubscribe.call();
        false
    }

    /// Release the held handle, or mark the slot so a late handle is
    /// released on arrival. Returns `true` if a handle was called now.
    pub fn release(&self) -> bool {
        let previous = {
            let mut slot = self.slot.lock().expect("subscription slot mutex poisoned");
            std::mem::replace(&mut *slot, Slot::Released)
        };
        match previous {
            Slot::Held(unsubscribe) => {
                unsubscribe.call();
                true
            }
            Slot::Pending | Slot::Released => false,
        }
    }

    pub fn is_released(&self) -> bool {
        matches!(
            *self.slot.lock().expect("subscription slot mutex poisoned"),
            Slot::Released
        )
    }
}

impl Default for SubscriptionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriptionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match *self.slot.lock().expect("subscription slot mutex poisoned") {
            Slot::Pending => "pending",
            Slot::Held(_) => "held",
            Slot::Released => "released",
        };
        f.debug_struct("SubscriptionSlot").field("state", &state).finish()
    }
}
