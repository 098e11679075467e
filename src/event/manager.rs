//! Generic publish/subscribe bus

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::core::types::Result;

/// An event category: a discriminant enum plus the payload its events carry
pub trait EventCategory {
    type Kind: Copy + Eq + Hash + Debug;
    type Payload;
}

/// Subscriber callback, invoked with the published kind and a borrowed payload
pub type Listener<C> =
    Box<dyn FnMut(<C as EventCategory>::Kind, &<C as EventCategory>::Payload) -> Result<()>>;

/// Synchronous pub-sub bus for one event category.
///
/// Listeners run on the publisher's thread, in subscription order, before
/// `publish` returns. There is no unsubscribe; subscriptions live as long as
/// the bus.
pub struct EventManager<C: EventCategory> {
    listeners: HashMap<C::Kind, Vec<Listener<C>>>,
}

impl<C: EventCategory> EventManager<C> {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }

    /// Append `listener` to the listeners of `kind`
    pub fn subscribe<F>(&mut self, kind: C::Kind, listener: F)
    where
        F: FnMut(C::Kind, &C::Payload) -> Result<()> + 'static,
    {
        self.listeners.entry(kind).or_default().push(Box::new(listener));
    }

    /// Invoke every listener of `kind` with `payload`.
    ///
    /// A failing listener does not stop the others. Failures are logged and
    /// the first one is returned once all listeners have run.
    pub fn publish(&mut self, kind: C::Kind, payload: &C::Payload) -> Result<()> {
        let Some(listeners) = self.listeners.get_mut(&kind) else {
            return Ok(());
        };

        let mut first_error = None;
        for listener in listeners.iter_mut() {
            if let Err(err) = listener(kind, payload) {
                log::error!("{:?} listener failed: {}", kind, err);
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn listener_count(&self, kind: C::Kind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }
}

impl<C: EventCategory> Default for EventManager<C> {
    fn default() -> Self {
        Self::new()
    }
}
