//! A typed, in-process publish/subscribe hub.
//!
//! The bus lets fragments of a page that share no parent observe each
//! other's state transitions.  For instance, the price shown by the page
//! shell is replaced when the personalization coordinator publishes
//! [`PRICE_UPDATE`], while the purchase button is disabled once the
//! countdown publishes [`COUNTDOWN_DONE`], and neither of them knows of
//! the other.
//!
//! Delivery is synchronous, in registration order, to the handlers that
//! were registered when [`publish`](EventBus::publish) was called.  A
//! handler added during delivery is not notified for that emission, and
//! a handler removed during delivery is skipped if it has not been
//! invoked yet.  Nothing is buffered: an event published with nobody
//! listening is simply dropped.
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use leptos_promo::bus::{handler, EventBus, PRICE_UPDATE};
//!
//! let bus = EventBus::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let subscription = bus.subscribe(&PRICE_UPDATE, {
//!     let seen = seen.clone();
//!     handler(move |price: &f64| seen.lock().unwrap().push(*price))
//! });
//!
//! assert_eq!(bus.publish(&PRICE_UPDATE, &179.0).unwrap(), 1);
//! subscription.cancel();
//! assert_eq!(bus.publish(&PRICE_UPDATE, &199.0).unwrap(), 0);
//! assert_eq!(*seen.lock().unwrap(), vec![179.0]);
//! ```
use std::{
    any::{Any, TypeId},
    collections::HashMap,
    marker::PhantomData,
    sync::{Arc, PoisonError, RwLock},
};

use crate::error::{Error, HandlerFault, Result};

/// A named event carrying a payload of type `T`.
pub struct Event<T> {
    name: &'static str,
    _payload: PhantomData<fn(&T)>,
}

impl<T> Event<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _payload: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Event<T> {}

/// The personalized price has been computed.
pub const PRICE_UPDATE: Event<f64> = Event::new("price:update");
/// Personalization failed; the payload is the message for the user.
pub const PRICE_ERROR: Event<String> = Event::new("price:error");
/// The promotion period has elapsed.
pub const COUNTDOWN_DONE: Event<()> = Event::new("countdown:done");

/// A subscriber.
///
/// Handlers are identified by their allocation, so subscribing a clone
/// of the same `Arc` twice for one event registers it only once.
pub type Handler<T> = Arc<dyn Fn(&T) -> Result<(), HandlerFault> + Send + Sync>;

/// Wrap an infallible closure into a [`Handler`].
pub fn handler<T, F>(f: F) -> Handler<T>
where
    F: Fn(&T) + Send + Sync + 'static,
{
    Arc::new(move |payload: &T| {
        f(payload);
        Ok(())
    })
}

type Key = (&'static str, TypeId);
type Registry = HashMap<Key, Box<dyn Any + Send + Sync>>;

fn key<T: 'static>(event: &Event<T>) -> Key {
    (event.name, TypeId::of::<T>())
}

fn same_handler<T>(a: &Handler<T>, b: &Handler<T>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn handlers<'a, T: 'static>(registry: &'a Registry, event: &Event<T>) -> Option<&'a Vec<Handler<T>>> {
    registry
        .get(&key(event))
        .and_then(|entry| entry.downcast_ref::<Vec<Handler<T>>>())
}

/// The handle to a bus; clones share the same registry.
///
/// A page typically creates one and provides it as a context through
/// [`PromoRuntime`](crate::component::PromoRuntime).
#[derive(Clone, Default)]
pub struct EventBus {
    pub(crate) inner: Arc<RwLock<Registry>>,
}

/// Returned by [`EventBus::subscribe`].
///
/// Dropping this does not unsubscribe; call [`cancel`](Subscription::cancel).
pub struct Subscription<T: 'static> {
    bus: EventBus,
    event: Event<T>,
    handler: Handler<T>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    ///
    /// Registering the identical handler again for the same event is a
    /// no-op, the returned subscription then refers to the existing one.
    pub fn subscribe<T: 'static>(&self, event: &Event<T>, handler: Handler<T>) -> Subscription<T> {
        {
            let mut registry = self.inner.write().unwrap_or_else(PoisonError::into_inner);
            let entry = registry
                .entry(key(event))
                .or_insert_with(|| Box::new(Vec::<Handler<T>>::new()));
            if let Some(list) = entry.downcast_mut::<Vec<Handler<T>>>() {
                if !list.iter().any(|existing| same_handler(existing, &handler)) {
                    list.push(handler.clone());
                }
            }
        }
        Subscription {
            bus: self.clone(),
            event: *event,
            handler,
        }
    }

    /// Remove `handler` from `event`; unknown handlers are ignored.
    pub fn unsubscribe<T: 'static>(&self, event: &Event<T>, handler: &Handler<T>) {
        let mut registry = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let key = key(event);
        let now_empty = match registry
            .get_mut(&key)
            .and_then(|entry| entry.downcast_mut::<Vec<Handler<T>>>())
        {
            Some(list) => {
                list.retain(|existing| !same_handler(existing, handler));
                list.is_empty()
            }
            None => false,
        };
        if now_empty {
            registry.remove(&key);
        }
    }

    /// Deliver `payload` to every handler of `event`, returning how many
    /// were invoked.
    ///
    /// The first failing handler stops the delivery and its failure is
    /// returned as [`Error::HandlerFault`]; handlers after it are not
    /// invoked for this call.  Callers that need isolation between
    /// subscribers must provide it themselves.
    pub fn publish<T: 'static>(&self, event: &Event<T>, payload: &T) -> Result<usize> {
        let snapshot = {
            let registry = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            handlers(&registry, event).cloned().unwrap_or_default()
        };
        let mut delivered = 0;
        for handler in snapshot.iter() {
            // removed by an earlier handler of this very emission
            if !self.is_subscribed(event, handler) {
                continue;
            }
            let call = &**handler;
            call(payload).map_err(|fault| Error::HandlerFault {
                event: event.name,
                message: fault.0,
            })?;
            delivered += 1;
        }
        Ok(delivered)
    }

    pub fn is_subscribed<T: 'static>(&self, event: &Event<T>, handler: &Handler<T>) -> bool {
        let registry = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        handlers(&registry, event)
            .map(|list| list.iter().any(|existing| same_handler(existing, handler)))
            .unwrap_or(false)
    }

    pub fn subscriber_count<T: 'static>(&self, event: &Event<T>) -> usize {
        let registry = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        handlers(&registry, event).map(Vec::len).unwrap_or(0)
    }

    /// Drop every subscription, for page teardown.
    pub fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<T: 'static> Subscription<T> {
    pub fn cancel(self) {
        self.bus.unsubscribe(&self.event, &self.handler);
    }

    pub fn handler(&self) -> &Handler<T> {
        &self.handler
    }

    pub fn is_active(&self) -> bool {
        self.bus.is_subscribed(&self.event, &self.handler)
    }
}

mod debug {
    use super::*;
    use std::fmt;

    impl<T> fmt::Debug for Event<T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_tuple("Event").field(&self.name).finish()
        }
    }

    impl fmt::Debug for EventBus {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let registry = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            let mut events = registry.keys().map(|(name, _)| *name).collect::<Vec<_>>();
            events.sort_unstable();
            f.debug_struct("EventBus").field("events", &events).finish()
        }
    }

    impl<T: 'static> fmt::Debug for Subscription<T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Subscription")
                .field("event", &self.event)
                .finish()
        }
    }
}
