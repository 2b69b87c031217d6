//! Handler registry shared by connectivity events and drain notifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Slots<E> {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler<E>)>>,
}

/// Set of handlers for events of type `E`
pub(crate) struct Listeners<E> {
    slots: Arc<Slots<E>>,
}

impl<E> Clone for Listeners<E> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<E: 'static> Listeners<E> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Arc::new(Slots {
                next_id: AtomicU64::new(0),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = self.slots.next_id.fetch_add(1, Ordering::Relaxed);
        self.slots
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));

        let slots: Weak<Slots<E>> = Arc::downgrade(&self.slots);
        Subscription {
            detach: Some(Box::new(move || {
                if let Some(slots) = slots.upgrade() {
                    slots
                        .handlers
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .retain(|(handler_id, _)| *handler_id != id);
                }
            })),
        }
    }

    /// Call every handler with `event`. Handlers run outside the registry lock,
    /// so they may subscribe or unsubscribe.
    pub(crate) fn emit(&self, event: &E) {
        let handlers: Vec<Handler<E>> = self
            .slots
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle to a registered handler.
///
/// The handler is detached by [`Subscription::unsubscribe`] or when the handle
/// is dropped. Use [`Subscription::persist`] to keep it attached for the
/// lifetime of the source.
#[must_use = "dropping a Subscription detaches its handler"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Detach the handler now
    pub fn unsubscribe(mut self) {
        self.detach_now();
    }

    /// Keep the handler attached until its source is dropped
    pub fn persist(mut self) {
        self.detach = None;
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter(listeners: &Listeners<u32>) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let subscription = listeners.subscribe({
            let count = Arc::clone(&count);
            move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });
        (count, subscription)
    }

    #[test]
    fn emit_reaches_every_handler() {
        let listeners = Listeners::new();
        let (first, _first_sub) = counter(&listeners);
        let (second, _second_sub) = counter(&listeners);

        listeners.emit(&1);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_and_drop_detach() {
        let listeners = Listeners::new();
        let (count, subscription) = counter(&listeners);
        subscription.unsubscribe();
        listeners.emit(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        {
            let (_count, _dropped) = counter(&listeners);
            assert_eq!(listeners.len(), 1);
        }
        assert_eq!(listeners.len(), 0);
    }

    #[test]
    fn persist_keeps_handler() {
        let listeners = Listeners::new();
        let (count, subscription) = counter(&listeners);
        subscription.persist();
        listeners.emit(&7);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
