use smallvec::SmallVec;
use std::cell::Cell;
use std::rc::Rc;

/// A handle to something that keeps calling back into the stage: a key
/// listener, the frame ticker, a playing track. Clones share one flag, so the
/// producer side can check `is_active()` while the owner holds the handle that
/// will eventually `cancel()` it.
#[derive(Clone, Debug)]
pub struct Subscription {
    label: &'static str,
    active: Rc<Cell<bool>>,
}

impl Subscription {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            active: Rc::new(Cell::new(true)),
        }
    }

    #[inline(always)]
    pub fn label(&self) -> &'static str {
        self.label
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Releases the subscription. Returns `true` only for the call that
    /// actually released it; later calls are no-ops.
    pub fn cancel(&self) -> bool {
        let was_active = self.active.replace(false);
        if was_active {
            log::trace!("Released subscription '{}'", self.label);
        }
        was_active
    }
}

// Four lane keys plus the frame ticker.
const INLINE_SUBSCRIPTIONS: usize = 5;

#[derive(Debug, Default)]
pub struct SubscriptionSet {
    entries: SmallVec<[Subscription; INLINE_SUBSCRIPTIONS]>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sub: Subscription) {
        self.entries.push(sub);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.entries.iter().filter(|s| s.is_active()).count()
    }

    /// Cancels and drops every held subscription, returning how many were
    /// still live.
    pub fn cancel_all(&mut self) -> usize {
        let released = self.entries.iter().filter(|s| s.cancel()).count();
        self.entries.clear();
        released
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
