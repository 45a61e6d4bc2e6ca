//! Per-request configuration that controls caching and stream-closing behaviour.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Texture-like sampling filter, forwarded untouched to decoders that care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter {
    Nearest,
    Linear,
}

impl Default for Filter {
    fn default() -> Self {
        Filter::Linear
    }
}

/// An immutable description attached to every load request.
///
/// The cache itself only reads `cacheable` and `closeable`, everything else is
/// decoder-specific and passed through as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Descriptor {
    /// May the decoded value be stored in the cache and shared.
    pub cacheable: bool,
    /// Should the source stream be closed once the decoder is done with it.
    pub closeable: bool,
    /// Overrides the format that would otherwise be guessed from the content.
    pub format: Option<String>,
    pub filter: Filter,
    /// Preprocessing variables, e.g. shader defines.
    pub variables: BTreeMap<String, String>,
}

impl Descriptor {
    /// Not cacheable, closes the stream after decoding.
    pub const DEFAULT: Descriptor = Descriptor {
        cacheable: false,
        closeable: true,
        format: None,
        filter: Filter::Linear,
        variables: BTreeMap::new(),
    };

    /// Cacheable, closes the stream after decoding.
    pub const DEFAULT_CACHEABLE: Descriptor = Descriptor {
        cacheable: true,
        closeable: true,
        format: None,
        filter: Filter::Linear,
        variables: BTreeMap::new(),
    };

    #[inline]
    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    #[inline]
    pub fn closeable(mut self, closeable: bool) -> Self {
        self.closeable = closeable;
        self
    }

    #[inline]
    pub fn with_format<T: Into<String>>(mut self, format: T) -> Self {
        self.format = Some(format.into());
        self
    }

    #[inline]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Adds or replaces a preprocessing variable.
    pub fn with_variable<T1, T2>(mut self, key: T1, value: T2) -> Self
    where
        T1: Into<String>,
        T2: Into<String>,
    {
        self.variables.insert(key.into(), value.into());
        self
    }

    #[inline]
    pub fn variable<T: AsRef<str>>(&self, key: T) -> Option<&str> {
        self.variables.get(key.as_ref()).map(|v| v.as_str())
    }
}

impl Default for Descriptor {
    fn default() -> Self {
        Descriptor::DEFAULT
    }
}
