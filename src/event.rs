//! Single-threaded listener registries with explicit subscription handles.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<dyn Fn(&T)>;
type ListenerList<T> = RefCell<Vec<(u64, Listener<T>)>>;

/// A notification source that listeners can subscribe to.
///
/// Listeners run synchronously, in subscription order, on the thread that
/// calls [`Event::emit`]. Subscribing or unsubscribing from inside a listener
/// is allowed; the change takes effect for the next emission, except that a
/// listener cancelled mid-emission is not invoked afterwards.
///
/// Clones share one listener list, so an owner can hand out a clone and emit
/// through it without holding a borrow of itself.
pub struct Event<T> {
    listeners: Rc<ListenerList<T>>,
    next_id: Rc<Cell<u64>>,
}

impl<T: 'static> Event<T> {
    /// Creates an event with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Vec::new())),
            next_id: Rc::new(Cell::new(0)),
        }
    }

    /// Registers `listener` and returns the handle that removes it again.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let listener: Listener<T> = Rc::new(listener);
        self.listeners.borrow_mut().push((id, listener));

        let listeners: Weak<ListenerList<T>> = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.borrow_mut().retain(|(existing, _)| *existing != id);
            }
        })
    }

    /// Invokes every registered listener with `payload`.
    pub fn emit(&self, payload: &T) {
        let snapshot: Vec<(u64, Listener<T>)> = self.listeners.borrow().clone();
        for (id, listener) in snapshot {
            let live = self
                .listeners
                .borrow()
                .iter()
                .any(|(existing, _)| *existing == id);
            if live {
                listener(payload);
            }
        }
    }

    /// Returns the number of live listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl<T: 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Rc::clone(&self.listeners),
            next_id: Rc::clone(&self.next_id),
        }
    }
}

impl<T> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

/// Handle to a registered listener.
///
/// The listener is removed exactly once: when [`Subscription::unsubscribe`]
/// is called or when the handle is dropped, whichever comes first.
#[must_use = "dropping a subscription removes its listener immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    fn new<F: FnOnce() + 'static>(cancel: F) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Removes the listener now.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listeners_receive_payloads_until_unsubscribed() {
        let event = Event::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let subscription = event.subscribe(move |value| sink.borrow_mut().push(*value));
        event.emit(&1);
        subscription.unsubscribe();
        event.emit(&2);

        assert_eq!(*seen.borrow(), vec![1]);
        assert_eq!(event.listener_count(), 0);
    }

    #[test]
    fn dropping_subscription_removes_listener() {
        let event = Event::<()>::new();
        {
            let _subscription = event.subscribe(|_| {});
            assert_eq!(event.listener_count(), 1);
        }
        assert_eq!(event.listener_count(), 0);
    }

    #[test]
    fn listener_cancelled_during_emit_is_skipped() {
        let event = Event::<()>::new();
        let calls = Rc::new(Cell::new(0));
        let second: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let victim = second.clone();
        let _first = event.subscribe(move |_| {
            victim.borrow_mut().take();
        });
        let counter = calls.clone();
        *second.borrow_mut() = Some(event.subscribe(move |_| counter.set(counter.get() + 1)));

        event.emit(&());
        assert_eq!(calls.get(), 0);
        assert_eq!(event.listener_count(), 1);
    }

    #[test]
    fn clones_share_listeners() {
        let event = Event::<u32>::new();
        let emitter = event.clone();
        let total = Rc::new(Cell::new(0));

        let sink = total.clone();
        let _subscription = event.subscribe(move |value| sink.set(sink.get() + *value));
        emitter.emit(&3);

        assert_eq!(total.get(), 3);
        assert_eq!(emitter.listener_count(), 1);
    }

    #[test]
    fn subscription_outliving_event_is_harmless() {
        let event = Event::<()>::new();
        let subscription = event.subscribe(|_| {});
        drop(event);
        subscription.unsubscribe();
    }
}
