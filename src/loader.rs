//! Decoders keyed by (case-insensitive) file extensions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::ResourceCache;
use crate::descriptor::Descriptor;
use crate::errors::*;
use crate::locator::Stream;
use crate::value::Decoded;

/// Turns a byte stream into a typed value.
///
/// Decoders may call back into the `ResourceCache` to load the resources they depend
/// on. Names loaded that way must be reported through `Decoded::with_dependency`, so
/// the cache could release them when the decoded value is disposed.
pub trait Decoder: Send + Sync + 'static {
    fn decode(
        &self,
        cache: &ResourceCache,
        descriptor: &Descriptor,
        stream: &mut dyn Stream,
    ) -> ::std::result::Result<Decoded, failure::Error>;
}

impl<F> Decoder for F
where
    F: Fn(&ResourceCache, &Descriptor, &mut dyn Stream) -> ::std::result::Result<Decoded, failure::Error>
        + Send
        + Sync
        + 'static,
{
    fn decode(
        &self,
        cache: &ResourceCache,
        descriptor: &Descriptor,
        stream: &mut dyn Stream,
    ) -> ::std::result::Result<Decoded, failure::Error> {
        self(cache, descriptor, stream)
    }
}

/// Returns the lower-cased substring after the last `.` of the name, if any.
pub fn extension(name: &str) -> Option<String> {
    let index = name.rfind('.')?;
    let ext = &name[index + 1..];

    if ext.is_empty() || ext.contains('/') || ext.contains('\\') {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Maps extensions to decoders. One decoder may serve several extensions.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: HashMap<String, Arc<dyn Decoder>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        LoaderRegistry {
            loaders: HashMap::new(),
        }
    }

    /// Registers `decoder` for every extension. The last registration for a given
    /// extension wins.
    pub fn register<T, I, E>(&mut self, decoder: T, extensions: I)
    where
        T: Decoder,
        I: IntoIterator<Item = E>,
        E: AsRef<str>,
    {
        self.register_shared(Arc::new(decoder), extensions);
    }

    pub fn register_shared<I, E>(&mut self, decoder: Arc<dyn Decoder>, extensions: I)
    where
        I: IntoIterator<Item = E>,
        E: AsRef<str>,
    {
        for ext in extensions {
            let ext = normalize(ext.as_ref());
            info!("Registers loader for extension '{}'.", ext);

            if self.loaders.insert(ext.clone(), decoder.clone()).is_some() {
                debug!("Loader for extension '{}' has been replaced.", ext);
            }
        }
    }

    /// Removes the decoders of all `extensions`. Fails without touching the registry
    /// if any of them is not registered.
    pub fn remove<I, E>(&mut self, extensions: I) -> Result<()>
    where
        I: IntoIterator<Item = E>,
        E: AsRef<str>,
    {
        let extensions: Vec<_> = extensions
            .into_iter()
            .map(|v| normalize(v.as_ref()))
            .collect();

        if let Some(ext) = extensions.iter().find(|v| !self.loaders.contains_key(*v)) {
            return Err(Error::NotRegistered("loader", ext.clone()));
        }

        for ext in extensions {
            info!("Removes loader for extension '{}'.", ext);
            self.loaders.remove(&ext);
        }

        Ok(())
    }

    /// Returns the decoder registered for `extension`.
    pub fn resolve<T: AsRef<str>>(&self, extension: T) -> Option<Arc<dyn Decoder>> {
        self.loaders.get(&normalize(extension.as_ref())).cloned()
    }

    #[inline]
    pub fn contains<T: AsRef<str>>(&self, extension: T) -> bool {
        self.loaders.contains_key(&normalize(extension.as_ref()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

fn normalize(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}
