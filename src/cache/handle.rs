//! The bookkeeping records of cached resources.
//!
//! A `ResourceHandle` only exists while its resource is cached:
//!
//! ```sh
//! Loading (not in the table) --publish--> Cached(1) --acquire--> Cached(n + 1)
//! Cached(n > 1) --release--> Cached(n - 1)
//! Cached(1) --release--> Disposed (removed from the table, never re-entered)
//! ```
//!
//! A later load of the same name starts over with a brand new handle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::descriptor::Descriptor;
use crate::value::{Decoded, Dependencies, Dispose, Value};

pub(crate) struct ResourceHandle {
    name: String,
    value: Value,
    disposer: Option<Arc<dyn Dispose>>,
    descriptor: Descriptor,
    dependencies: Dependencies,
    rc: u32,
}

impl ResourceHandle {
    pub fn new(name: String, descriptor: Descriptor, decoded: Decoded) -> Self {
        ResourceHandle {
            name,
            value: decoded.value,
            disposer: decoded.disposer,
            descriptor,
            dependencies: decoded.dependencies,
            rc: 1,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[inline]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    #[inline]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    #[inline]
    pub fn rc(&self) -> u32 {
        self.rc
    }

    /// Disposes the underlying value and returns the name it was cached under.
    pub fn dispose(self) -> String {
        if let Some(disposer) = self.disposer {
            disposer.dispose();
        }

        self.name
    }
}

/// The cache table and its reverse index from value identities to names.
#[derive(Default)]
pub(crate) struct Table {
    handles: HashMap<String, ResourceHandle>,
    names: HashMap<usize, String>,
}

impl Table {
    #[inline]
    pub fn get(&self, name: &str) -> Option<&ResourceHandle> {
        self.handles.get(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.handles.values()
    }

    #[inline]
    pub fn name_of(&self, value: &Value) -> Option<&str> {
        self.names.get(&value.identity()).map(|v| v.as_str())
    }

    /// Increases the reference count of a cached resource and returns its value.
    pub fn acquire(&mut self, name: &str) -> Option<Value> {
        self.handles.get_mut(name).map(|handle| {
            handle.rc += 1;
            handle.value.clone()
        })
    }

    /// Publishes a freshly created handle. There is at most one handle per name, the
    /// caller has checked that under the same lock.
    pub fn insert(&mut self, handle: ResourceHandle) {
        debug_assert!(!self.handles.contains_key(&handle.name));
        self.names
            .insert(handle.value.identity(), handle.name.clone());
        self.handles.insert(handle.name.clone(), handle);
    }

    /// Decreases the reference count of `name`, cascading through dependencies of
    /// everything that reaches zero.
    ///
    /// Removed handles are returned in removal order (a resource always comes before
    /// its dependencies), they still have to be disposed by the caller. Names that
    /// are not cached are ignored. A name removed earlier in the same cascade is
    /// skipped, so dependency cycles terminate.
    pub fn release(&mut self, name: &str) -> Vec<ResourceHandle> {
        let mut removed = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![name.to_owned()];

        while let Some(name) = stack.pop() {
            if visited.contains(&name) {
                debug!("Skips release of {} which was disposed in this cascade.", name);
                continue;
            }

            let disposed = match self.handles.get_mut(&name) {
                Some(handle) => {
                    handle.rc -= 1;
                    handle.rc == 0
                }
                None => continue,
            };

            if disposed {
                if let Some(handle) = self.remove(&name) {
                    stack.extend(handle.dependencies.iter().rev().cloned());
                    visited.insert(name);
                    removed.push(handle);
                }
            }
        }

        removed
    }

    /// Removes every handle regardless of its reference count.
    pub fn drain(&mut self) -> Vec<ResourceHandle> {
        self.names.clear();
        self.handles.drain().map(|(_, v)| v).collect()
    }

    fn remove(&mut self, name: &str) -> Option<ResourceHandle> {
        let handle = self.handles.remove(name)?;
        self.names.remove(&handle.value.identity());
        Some(handle)
    }
}
