//! Discovery strategies which turn logical names into readable byte streams.
//!
//! Locators are kept in registration order inside a `LocatorChain`. Synchronous
//! discovery simply walks the chain. Asynchronous discovery walks it one locator at
//! a time, the next locator is only asked after the previous one reported failure,
//! so that "first registered, first tried" stays deterministic and we never open
//! redundant streams.

pub mod dir;
pub use self::dir::Dir;

pub mod memory;
pub use self::memory::Memory;

use std::fs;
use std::io::{self, Cursor, Read};
use std::sync::{Arc, Mutex};

use crate::errors::*;

/// A readable byte stream produced by a locator.
pub trait Stream: Read + Send {
    /// Releases the underlying source. Called at most once by the cache, and only
    /// when the descriptor of the request is `closeable`.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Stream for fs::File {}

impl Stream for Cursor<Vec<u8>> {}

pub type LocateCallback = Box<dyn FnOnce(Option<Box<dyn Stream>>) + Send>;

/// A discovery strategy. A locator may support only one of the two modes, in which
/// case the chain skips it on the unsupported path.
pub trait Locator: Send + Sync + 'static {
    /// Locates `name` synchronously.
    fn locate(&self, name: &str) -> Option<Box<dyn Stream>>;

    /// Locates `name` asynchronously, `on_done` must be invoked exactly once, from any thread.
    fn locate_async(&self, name: &str, on_done: LocateCallback) {
        on_done(self.locate(name));
    }

    fn supports_sync(&self) -> bool {
        true
    }

    fn supports_async(&self) -> bool {
        true
    }
}

/// The ordered set of named locators.
#[derive(Default)]
pub struct LocatorChain {
    locators: Vec<(String, Arc<dyn Locator>)>,
}

impl LocatorChain {
    pub fn new() -> Self {
        LocatorChain {
            locators: Vec::new(),
        }
    }

    /// Registers a locator. An existing locator with the same name is replaced in place,
    /// keeping its position in the chain.
    pub fn register<T1, T2>(&mut self, name: T1, locator: T2)
    where
        T1: Into<String>,
        T2: Locator,
    {
        self.register_shared(name, Arc::new(locator));
    }

    pub fn register_shared<T: Into<String>>(&mut self, name: T, locator: Arc<dyn Locator>) {
        let name = name.into();
        info!("Registers locator {}.", name);

        if let Some(slot) = self.locators.iter_mut().find(|v| v.0 == name) {
            slot.1 = locator;
        } else {
            self.locators.push((name, locator));
        }
    }

    /// Removes the locator named `name`.
    pub fn remove<T: AsRef<str>>(&mut self, name: T) -> Result<()> {
        let name = name.as_ref();
        let index = self
            .locators
            .iter()
            .position(|v| v.0 == name)
            .ok_or_else(|| Error::NotRegistered("locator", name.to_owned()))?;

        info!("Removes locator {}.", name);
        self.locators.remove(index);
        Ok(())
    }

    #[inline]
    pub fn contains<T: AsRef<str>>(&self, name: T) -> bool {
        self.locators.iter().any(|v| v.0 == name.as_ref())
    }

    /// Names of registered locators, in the order they are tried.
    pub fn names(&self) -> Vec<&str> {
        self.locators.iter().map(|v| v.0.as_str()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.locators.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    /// Returns the first stream produced by a synchronous locator, in registration order.
    pub fn locate(&self, name: &str) -> Option<Box<dyn Stream>> {
        locate_with(&self.sync_locators(), name)
    }

    /// Walks the asynchronous locators in registration order. `on_done` receives the
    /// first stream found, or `None` once the chain is exhausted.
    pub fn locate_async<T>(&self, name: &str, on_done: T)
    where
        T: FnOnce(Option<Box<dyn Stream>>) + Send + 'static,
    {
        LocateChain::start(self.async_locators(), name, Box::new(on_done));
    }

    pub(crate) fn sync_locators(&self) -> Vec<Arc<dyn Locator>> {
        self.locators
            .iter()
            .filter(|v| v.1.supports_sync())
            .map(|v| v.1.clone())
            .collect()
    }

    pub(crate) fn async_locators(&self) -> Vec<Arc<dyn Locator>> {
        self.locators
            .iter()
            .filter(|v| v.1.supports_async())
            .map(|v| v.1.clone())
            .collect()
    }
}

pub(crate) fn locate_with(locators: &[Arc<dyn Locator>], name: &str) -> Option<Box<dyn Stream>> {
    for locator in locators {
        if let Some(stream) = locator.locate(name) {
            return Some(stream);
        }
    }

    None
}

/// The explicit state of an asynchronous fallback walk over a snapshot of locators.
///
/// `driving` is set while `drive` is on the stack. A failure reported during that
/// window (a locator completing synchronously, or racing from another thread) only
/// flags `pending`, and the running `drive` loop moves on to the next locator. This
/// keeps the stack flat no matter how many locators fail in a row.
pub(crate) struct LocateChain {
    name: String,
    locators: Vec<Arc<dyn Locator>>,
    cursor: usize,
    on_done: Option<LocateCallback>,
    driving: bool,
    pending: bool,
}

impl LocateChain {
    pub(crate) fn start(locators: Vec<Arc<dyn Locator>>, name: &str, on_done: LocateCallback) {
        let chain = LocateChain {
            name: name.to_owned(),
            locators,
            cursor: 0,
            on_done: Some(on_done),
            driving: false,
            pending: false,
        };

        Self::drive(Arc::new(Mutex::new(chain)));
    }

    fn drive(chain: Arc<Mutex<LocateChain>>) {
        loop {
            let (locator, name) = {
                let mut state = chain.lock().unwrap();
                if state.cursor >= state.locators.len() {
                    let on_done = state.on_done.take();
                    drop(state);

                    if let Some(on_done) = on_done {
                        on_done(None);
                    }

                    return;
                }

                let locator = state.locators[state.cursor].clone();
                state.cursor += 1;
                state.driving = true;
                state.pending = false;
                (locator, state.name.clone())
            };

            let c = chain.clone();
            locator.locate_async(&name, Box::new(move |rsp| Self::report(c, rsp)));

            let mut state = chain.lock().unwrap();
            state.driving = false;
            if !state.pending {
                return;
            }
        }
    }

    fn report(chain: Arc<Mutex<LocateChain>>, rsp: Option<Box<dyn Stream>>) {
        match rsp {
            Some(stream) => {
                let on_done = chain.lock().unwrap().on_done.take();
                if let Some(on_done) = on_done {
                    on_done(Some(stream));
                }
            }
            None => {
                {
                    let mut state = chain.lock().unwrap();
                    if state.on_done.is_none() {
                        return;
                    }

                    if state.driving {
                        state.pending = true;
                        return;
                    }
                }

                Self::drive(chain);
            }
        }
    }
}
