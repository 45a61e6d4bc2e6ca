//! A resource loading and caching subsystem.
//!
//! Logical resource names (`"textures/hero.png"`) are turned into typed, ready-to-use
//! values which are shared and reference-counted by a `ResourceCache`.
//!
//! # Locator
//!
//! A `Locator` turns a logical name into a readable byte `Stream`. Locators are
//! registered by name into an ordered chain and tried in registration order, either
//! synchronously or asynchronously. A locator may support only one of the two modes.
//! `Dir` (local filesystem) and `Memory` are provided, it should be easy to add
//! archives, embedded blobs or network fetches.
//!
//! # Loader
//!
//! A `Decoder` turns a byte stream and a `Descriptor` into a value. Decoders are
//! registered per file extension, matched case-insensitively against the part of the
//! name after its last dot. Decoders may load other resources through the cache
//! while decoding, and report them as dependencies.
//!
//! # Ownership & Lifetime
//!
//! Cacheable resources are reference-counted. Every load of a cached name increases
//! the count, and it's the user's responsibility to `release` it when done. When the
//! last reference is dropped, the value is disposed and all of its dependencies are
//! released as well.
//!
//! ```
//! use std::io::Read;
//! use rescache::prelude::*;
//!
//! fn text(_: &ResourceCache, _: &Descriptor, stream: &mut dyn Stream) -> Result<Decoded, failure::Error> {
//!     let mut buf = String::new();
//!     stream.read_to_string(&mut buf)?;
//!     Ok(Decoded::new(buf))
//! }
//!
//! let memory = Memory::new();
//! memory.insert("hello.txt", "Hello, world!");
//!
//! let cache = ResourceCache::new();
//! cache.register_locator("memory", memory);
//! cache.register_loader(text, &["txt"]);
//!
//! let v = cache.load_as::<String, _>("hello.txt", &Descriptor::DEFAULT_CACHEABLE).unwrap();
//! assert_eq!(v.as_str(), "Hello, world!");
//! assert_eq!(cache.refcount("hello.txt"), Some(1));
//!
//! cache.release("hello.txt");
//! assert!(cache.is_empty());
//! ```

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

pub mod cache;
pub mod descriptor;
pub mod errors;
pub mod listener;
pub mod loader;
pub mod locator;
pub mod params;
pub mod value;

pub use self::cache::ResourceCache;
pub use self::descriptor::{Descriptor, Filter};
pub use self::errors::{Error, Result};
pub use self::listener::{ListenerHandle, ResourceListener};
pub use self::loader::{Decoder, LoaderRegistry};
pub use self::locator::{Locator, LocatorChain, Stream};
pub use self::params::{DirParams, ResourceParams};
pub use self::value::{Decoded, Dispose, Value};

pub mod prelude {
    pub use super::cache::ResourceCache;
    pub use super::descriptor::{Descriptor, Filter};
    pub use super::listener::{ListenerHandle, ResourceListener};
    pub use super::loader::Decoder;
    pub use super::locator::{Dir, LocateCallback, Locator, Memory, Stream};
    pub use super::params::ResourceParams;
    pub use super::value::{Decoded, Dispose, Value};
}
