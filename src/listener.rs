//! Passive observers of the resource lifecycle.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::errors::*;

/// Receives fire-and-forget notifications from the `ResourceCache`. Listeners have
/// no say in control flow, and a panicking listener is logged and ignored.
pub trait ResourceListener: Send + Sync + 'static {
    fn on_loaded(&self, _name: &str) {}

    fn on_failed(&self, _name: &str, _err: &Error) {}

    fn on_disposed(&self, _name: &str) {}
}

/// Identifies an attached listener.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerHandle(u64);

#[derive(Default)]
pub(crate) struct ListenerSet {
    next: u64,
    listeners: Vec<(ListenerHandle, Arc<dyn ResourceListener>)>,
}

impl ListenerSet {
    pub fn attach<T: ResourceListener>(&mut self, lis: T) -> ListenerHandle {
        self.next += 1;
        let handle = ListenerHandle(self.next);
        self.listeners.push((handle, Arc::new(lis)));
        handle
    }

    pub fn detach(&mut self, handle: ListenerHandle) -> Result<()> {
        let index = self
            .listeners
            .iter()
            .position(|v| v.0 == handle)
            .ok_or_else(|| Error::NotRegistered("listener", format!("{:?}", handle)))?;

        self.listeners.remove(index);
        Ok(())
    }

    #[inline]
    pub fn snapshot(&self) -> Vec<Arc<dyn ResourceListener>> {
        self.listeners.iter().map(|v| v.1.clone()).collect()
    }
}

/// Notifies every listener of a snapshot taken from `set`. The lock is released before
/// any listener runs, so listeners are free to call back into the cache.
pub(crate) fn notify<F>(set: &Mutex<ListenerSet>, func: F)
where
    F: Fn(&dyn ResourceListener),
{
    let listeners = set.lock().unwrap().snapshot();
    for v in listeners {
        if panic::catch_unwind(AssertUnwindSafe(|| func(&*v))).is_err() {
            warn!("Resource listener panicked, the notification is dropped.");
        }
    }
}
