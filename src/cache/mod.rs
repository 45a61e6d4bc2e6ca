//! The `ResourceCache` turns logical names into shared, reference-counted values.
//!
//! # Loading
//!
//! A request first consults the cache table. On a hit the reference count of the
//! cached resource is increased and its value is returned. On a miss the name is
//! handed to the locator chain to get a byte stream, the extension of the name picks
//! a decoder from the loader registry, and the decoded value is published into the
//! table if the descriptor says it is cacheable.
//!
//! The table lock is never held while locating or decoding, since decoders are free
//! to load their own dependencies through the very same cache. Two threads missing
//! the same name at once will both decode it, the second one to publish simply drops
//! its fresh value in favour of the handle that is already there. There is never more
//! than one handle per name.
//!
//! # Ownership & Lifetime
//!
//! Every successful cacheable load must be paired with a `release`. When the last
//! reference is released the value is disposed, and every dependency recorded by its
//! decoder is released in turn.

mod handle;

use std::any::Any;
use std::cell::RefCell;
use std::sync::{Arc, Mutex, RwLock};

use crate::descriptor::Descriptor;
use crate::errors::*;
use crate::listener::{self, ListenerHandle, ListenerSet, ResourceListener};
use crate::loader::{self, Decoder, LoaderRegistry};
use crate::locator::{self, Dir, LocateChain, Locator, LocatorChain, Stream};
use crate::params::ResourceParams;
use crate::value::{Decoded, Value};

use self::handle::{ResourceHandle, Table};

/// A cheaply clonable handle to a resource cache. Clones share the same table and
/// registries.
#[derive(Clone)]
pub struct ResourceCache {
    shared: Arc<CacheShared>,
}

struct CacheShared {
    table: Mutex<Table>,
    locators: RwLock<LocatorChain>,
    loaders: RwLock<LoaderRegistry>,
    listeners: Mutex<ListenerSet>,
    descriptor: Descriptor,
}

impl Default for ResourceCache {
    fn default() -> Self {
        ResourceCache::new()
    }
}

impl ResourceCache {
    /// Creates an empty cache without any locator or loader.
    pub fn new() -> Self {
        ResourceCache::with_descriptor(Descriptor::DEFAULT)
    }

    fn with_descriptor(descriptor: Descriptor) -> Self {
        let shared = CacheShared {
            table: Mutex::new(Table::default()),
            locators: RwLock::new(LocatorChain::new()),
            loaders: RwLock::new(LoaderRegistry::new()),
            listeners: Mutex::new(ListenerSet::default()),
            descriptor,
        };

        ResourceCache {
            shared: Arc::new(shared),
        }
    }

    /// Creates a cache with the directories of `params` registered as locators, in order.
    pub fn with_params(params: ResourceParams) -> Result<Self> {
        let cache = ResourceCache::with_descriptor(params.descriptor);
        for v in params.locators {
            cache.register_locator(v.name, Dir::new(v.root)?);
        }

        Ok(cache)
    }

    /// Registers a locator at the end of the chain, or replaces the one with the same name.
    pub fn register_locator<T1, T2>(&self, name: T1, locator: T2)
    where
        T1: Into<String>,
        T2: Locator,
    {
        self.shared.locators.write().unwrap().register(name, locator);
    }

    pub fn remove_locator<T: AsRef<str>>(&self, name: T) -> Result<()> {
        self.shared.locators.write().unwrap().remove(name)
    }

    /// Names of registered locators, in the order they are tried.
    pub fn locators(&self) -> Vec<String> {
        let locators = self.shared.locators.read().unwrap();
        locators.names().into_iter().map(|v| v.to_owned()).collect()
    }

    /// Registers `decoder` for every extension in `extensions`.
    pub fn register_loader<T, I, E>(&self, decoder: T, extensions: I)
    where
        T: Decoder,
        I: IntoIterator<Item = E>,
        E: AsRef<str>,
    {
        self.shared
            .loaders
            .write()
            .unwrap()
            .register(decoder, extensions);
    }

    pub fn remove_loader<I, E>(&self, extensions: I) -> Result<()>
    where
        I: IntoIterator<Item = E>,
        E: AsRef<str>,
    {
        self.shared.loaders.write().unwrap().remove(extensions)
    }

    /// Returns the decoder that would be used for `extension`.
    pub fn resolve_loader<T: AsRef<str>>(&self, extension: T) -> Option<Arc<dyn Decoder>> {
        self.shared.loaders.read().unwrap().resolve(extension)
    }

    pub fn attach_listener<T: ResourceListener>(&self, lis: T) -> ListenerHandle {
        self.shared.listeners.lock().unwrap().attach(lis)
    }

    pub fn detach_listener(&self, handle: ListenerHandle) -> Result<()> {
        self.shared.listeners.lock().unwrap().detach(handle)
    }

    /// Gets the cached value of `name`, without any I/O or reference count change.
    pub fn get<T: AsRef<str>>(&self, name: T) -> Option<Value> {
        let table = self.shared.table.lock().unwrap();
        table.get(name.as_ref()).map(|v| v.value().clone())
    }

    /// Loads `name` with the default descriptor of this cache.
    pub fn load_default<T: AsRef<str>>(&self, name: T) -> Result<Value> {
        self.load(name, &self.shared.descriptor)
    }

    /// Loads `name` synchronously.
    ///
    /// If the descriptor is cacheable and the resource is already cached, its reference
    /// count is increased and the cached value is returned.
    pub fn load<T: AsRef<str>>(&self, name: T, descriptor: &Descriptor) -> Result<Value> {
        let name = name.as_ref();
        if let Some(value) = self.try_acquire(name, descriptor) {
            return Ok(value);
        }

        let _guard = match LoadingGuard::enter(self.identity(), name) {
            Some(guard) => guard,
            None => return Err(self.fail(name, Error::CircularReference(name.to_owned()))),
        };

        let locators = self.shared.locators.read().unwrap().sync_locators();
        match locator::locate_with(&locators, name) {
            Some(stream) => self.complete(name, descriptor, stream),
            None => Err(self.fail(name, Error::NotFound(name.to_owned()))),
        }
    }

    /// Loads `name` synchronously and downcasts the value to `T`.
    ///
    /// A value of another type fails with `Error::Decode`, the reference acquired by the
    /// load is kept, so the caller still owes a `release`.
    pub fn load_as<T, N>(&self, name: N, descriptor: &Descriptor) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        N: AsRef<str>,
    {
        let name = name.as_ref();
        let value = self.load(name, descriptor)?;
        value.downcast::<T>().ok_or_else(|| {
            Error::Decode(
                name.to_owned(),
                format_err!("Type mismatch, expected {}.", ::std::any::type_name::<T>()),
            )
        })
    }

    /// Loads `name` asynchronously, `on_done` is invoked exactly once.
    ///
    /// A cache hit invokes `on_done` immediately on the calling thread. Otherwise the
    /// locators are tried one after another, and decoding happens on whatever thread
    /// the successful locator reported back from.
    pub fn load_async<T, F>(&self, name: T, descriptor: Descriptor, on_done: F)
    where
        T: Into<String>,
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        let name = name.into();
        if let Some(value) = self.try_acquire(&name, &descriptor) {
            on_done(Ok(value));
            return;
        }

        let locators = self.shared.locators.read().unwrap().async_locators();
        let cache = self.clone();
        let key = name.clone();

        LocateChain::start(
            locators,
            &name,
            Box::new(move |rsp| {
                let result = match rsp {
                    Some(stream) => match LoadingGuard::enter(cache.identity(), &key) {
                        Some(_guard) => cache.complete(&key, &descriptor, stream),
                        None => {
                            cache.discard(&descriptor, stream);
                            Err(cache.fail(&key, Error::CircularReference(key.clone())))
                        }
                    },
                    None => Err(cache.fail(&key, Error::NotFound(key.clone()))),
                };

                on_done(result);
            }),
        );
    }

    /// Releases a reference of `name`. Releasing a name which is not cached is a no-op.
    pub fn release<T: AsRef<str>>(&self, name: T) {
        let disposed = self.shared.table.lock().unwrap().release(name.as_ref());
        self.dispose(disposed);
    }

    /// Releases a reference of the resource cached with `value`.
    pub fn release_by_value(&self, value: &Value) {
        let disposed = {
            let mut table = self.shared.table.lock().unwrap();
            match table.name_of(value).map(|v| v.to_owned()) {
                Some(name) => table.release(&name),
                None => Vec::new(),
            }
        };

        self.dispose(disposed);
    }

    /// Disposes every cached resource regardless of its reference count. Intended for
    /// shutdown only.
    pub fn unload_all(&self) {
        let disposed = self.shared.table.lock().unwrap().drain();
        info!("Unloads all {} cached resources.", disposed.len());
        self.dispose(disposed);
    }

    /// Returns true if `name` is cached.
    #[inline]
    pub fn contains<T: AsRef<str>>(&self, name: T) -> bool {
        self.shared.table.lock().unwrap().get(name.as_ref()).is_some()
    }

    /// Gets the reference count of a cached resource.
    #[inline]
    pub fn refcount<T: AsRef<str>>(&self, name: T) -> Option<u32> {
        let table = self.shared.table.lock().unwrap();
        table.get(name.as_ref()).map(|v| v.rc())
    }

    /// Gets the names recorded as dependencies of a cached resource.
    pub fn dependencies<T: AsRef<str>>(&self, name: T) -> Option<Vec<String>> {
        let table = self.shared.table.lock().unwrap();
        table.get(name.as_ref()).map(|v| v.dependencies().to_vec())
    }

    /// Gets the descriptor a cached resource was created with.
    pub fn descriptor<T: AsRef<str>>(&self, name: T) -> Option<Descriptor> {
        let table = self.shared.table.lock().unwrap();
        table.get(name.as_ref()).map(|v| v.descriptor().clone())
    }

    /// Gets the name `value` is cached under.
    pub fn name_of(&self, value: &Value) -> Option<String> {
        let table = self.shared.table.lock().unwrap();
        table.name_of(value).map(|v| v.to_owned())
    }

    /// Visits every cached resource with its name, value and reference count.
    ///
    /// The table is locked while visiting, `func` must not call back into the cache.
    pub fn for_each<F: FnMut(&str, &Value, u32)>(&self, mut func: F) {
        let table = self.shared.table.lock().unwrap();
        for v in table.iter() {
            func(v.name(), v.value(), v.rc());
        }
    }

    /// Gets the number of cached resources.
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.table.lock().unwrap().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.shared) as *const () as usize
    }

    fn try_acquire(&self, name: &str, descriptor: &Descriptor) -> Option<Value> {
        if !descriptor.cacheable {
            return None;
        }

        let value = self.shared.table.lock().unwrap().acquire(name);
        if value.is_some() {
            debug!("Resource {} is served from cache.", name);
        }

        value
    }

    /// Picks a decoder, decodes the stream and publishes the result.
    fn complete(
        &self,
        name: &str,
        descriptor: &Descriptor,
        mut stream: Box<dyn Stream>,
    ) -> Result<Value> {
        let ext = loader::extension(name).unwrap_or_default();
        let decoder = match self.resolve_loader(&ext) {
            Some(decoder) => decoder,
            None => {
                self.discard(descriptor, stream);
                return Err(self.fail(name, Error::NoLoader(name.to_owned(), ext)));
            }
        };

        let rsp = decoder.decode(self, descriptor, &mut *stream);
        self.discard(descriptor, stream);

        match rsp {
            Ok(decoded) => {
                if descriptor.cacheable {
                    Ok(self.publish(name, descriptor, decoded))
                } else {
                    listener::notify(&self.shared.listeners, |v| v.on_loaded(name));
                    Ok(decoded.value)
                }
            }
            Err(err) => Err(self.fail(name, Error::Decode(name.to_owned(), err))),
        }
    }

    /// Inserts a freshly decoded resource, unless some other caller won the race to
    /// publish the same name.
    fn publish(&self, name: &str, descriptor: &Descriptor, decoded: Decoded) -> Value {
        let value = decoded.value.clone();

        let published = {
            let mut table = self.shared.table.lock().unwrap();
            match table.acquire(name) {
                Some(existing) => Err((existing, decoded)),
                None => {
                    let handle = ResourceHandle::new(name.to_owned(), descriptor.clone(), decoded);
                    table.insert(handle);
                    Ok(())
                }
            }
        };

        match published {
            Ok(()) => {
                debug!("Resource {} is cached.", name);
                listener::notify(&self.shared.listeners, |v| v.on_loaded(name));
                value
            }
            Err((existing, discarded)) => {
                warn!(
                    "Resource {} has been published concurrently, discards the fresh copy.",
                    name
                );

                let handle = ResourceHandle::new(name.to_owned(), descriptor.clone(), discarded);
                let dependencies = handle.dependencies().to_vec();
                handle.dispose();

                for v in dependencies {
                    self.release(v);
                }

                existing
            }
        }
    }

    /// Disposes released handles outside of the table lock, in removal order.
    fn dispose(&self, handles: Vec<ResourceHandle>) {
        for handle in handles {
            let name = handle.dispose();
            debug!("Resource {} is disposed.", name);
            listener::notify(&self.shared.listeners, |v| v.on_disposed(&name));
        }
    }

    /// Drops a stream, closing it first if the descriptor asks for it.
    fn discard(&self, descriptor: &Descriptor, mut stream: Box<dyn Stream>) {
        if descriptor.closeable {
            if let Err(err) = stream.close() {
                warn!("Failed to close stream: {}", err);
            }
        }
    }

    fn fail(&self, name: &str, err: Error) -> Error {
        warn!("{}", err);
        listener::notify(&self.shared.listeners, |v| v.on_failed(name, &err));
        err
    }
}

thread_local! {
    static LOADING: RefCell<Vec<(usize, String)>> = RefCell::new(Vec::new());
}

/// Marks a name as being loaded by the current thread, for as long as the guard lives.
struct LoadingGuard;

impl LoadingGuard {
    fn enter(cache: usize, name: &str) -> Option<LoadingGuard> {
        LOADING.with(|v| {
            let mut v = v.borrow_mut();
            if v.iter().any(|(c, n)| *c == cache && n == name) {
                None
            } else {
                v.push((cache, name.to_owned()));
                Some(LoadingGuard)
            }
        })
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        LOADING.with(|v| {
            v.borrow_mut().pop();
        });
    }
}
