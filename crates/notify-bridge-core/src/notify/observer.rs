//! Observer registration and fan-out.
//!
//! [`Subscribers`] keeps observers in registration order behind a mutex.
//! `publish` copies the current list under the lock and delivers outside
//! it, so a subscribe or unsubscribe racing with a delivery never disturbs
//! that delivery; it takes effect from the next event on.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::error::ObserverError;

/// Receives events published by a notification listener.
///
/// Called synchronously on the listener's worker, once per event, in
/// registration order. Returning an error (or panicking) is logged and does
/// not affect other observers or the listener.
pub trait Observer<E>: Send + Sync {
    fn receive(&self, event: E) -> Result<(), ObserverError>;
}

/// Adapts a closure into an [`Observer`].
pub struct FnObserver<F>(F);

impl<E, F> Observer<E> for FnObserver<F>
where
    F: Fn(E) -> Result<(), ObserverError> + Send + Sync,
{
    fn receive(&self, event: E) -> Result<(), ObserverError> {
        (self.0)(event)
    }
}

/// Wrap `f` so it can be subscribed to a listener.
pub fn observer_fn<E, F>(f: F) -> Arc<FnObserver<F>>
where
    F: Fn(E) -> Result<(), ObserverError> + Send + Sync,
{
    Arc::new(FnObserver(f))
}

/// Registry of observers for one listener instance.
pub struct Subscribers<E> {
    entries: Mutex<Vec<Arc<dyn Observer<E>>>>,
}

impl<E: Clone> Subscribers<E> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register `observer`. Returns `false` if that same observer (by
    /// identity) was already registered.
    pub fn subscribe(&self, observer: Arc<dyn Observer<E>>) -> bool {
        let mut entries = self.lock();
        if entries.iter().any(|entry| same_observer(entry, &observer)) {
            return false;
        }
        entries.push(observer);
        true
    }

    /// Remove `observer`. Returns `false` if it was not registered.
    pub fn unsubscribe<O>(&self, observer: &Arc<O>) -> bool
    where
        O: Observer<E> + ?Sized,
    {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| !same_observer(entry, observer));
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver `event` to every observer registered at the time of the call.
    /// Returns how many observers accepted it.
    pub fn publish(&self, event: &E) -> usize {
        let snapshot: Vec<Arc<dyn Observer<E>>> = self.lock().clone();

        let mut delivered = 0;
        for (index, observer) in snapshot.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| observer.receive(event.clone())))
                .unwrap_or_else(|payload| Err(ObserverError::Panicked(panic_message(&*payload))));
            match outcome {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(observer = index, error = %err, "observer failed; continuing fan-out");
                }
            }
        }
        delivered
    }

    // Observers never run while the lock is held, so a poisoned lock still
    // guards a consistent list.
    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn Observer<E>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Clone> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn same_observer<A, B>(a: &Arc<A>, b: &Arc<B>) -> bool
where
    A: ?Sized,
    B: ?Sized,
{
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
