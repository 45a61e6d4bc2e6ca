//! Error kinds reported by the resource cache and its registries.

/// Everything that could go wrong while loading, registering or releasing resources.
///
/// None of these is fatal to the cache itself, the caller could always retry or carry on.
#[derive(Debug, Fail)]
pub enum Error {
    /// No locator produced a stream for the resource.
    #[fail(display = "Could not locate resource {}.", _0)]
    NotFound(String),
    /// The extension of the resource has no registered decoder.
    #[fail(
        display = "There is no loader registered for extension '{}' (resource {}).",
        _1, _0
    )]
    NoLoader(String, String),
    /// The decoder failed, the cause is opaque to the cache.
    #[fail(display = "Failed to decode resource {}: {}", _0, _1)]
    Decode(String, failure::Error),
    /// Removal of an unknown locator, loader or listener.
    #[fail(display = "The {} {} has not been registered.", _0, _1)]
    NotRegistered(&'static str, String),
    /// A decoder asked for a resource that is being decoded further up the same call stack.
    #[fail(display = "Circular reference of resource {} found!", _0)]
    CircularReference(String),
    /// Malformed resource parameters.
    #[fail(display = "Malformed resource parameters: {}", _0)]
    Config(String),
}

pub type Result<T> = ::std::result::Result<T, Error>;

impl Error {
    /// Returns the logical name of the resource this error is about, if any.
    pub fn name(&self) -> Option<&str> {
        match *self {
            Error::NotFound(ref name)
            | Error::NoLoader(ref name, _)
            | Error::Decode(ref name, _)
            | Error::CircularReference(ref name) => Some(name),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
