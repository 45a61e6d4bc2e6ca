//! Type-erased resource values and the output of decoders.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

/// Implemented by values that hold external resources (GPU buffers, audio voices,
/// file handles...) which must be freed explicitly once the cache lets go of them.
pub trait Dispose: Send + Sync {
    fn dispose(&self);
}

/// A cheaply clonable, shared and type-erased resource value.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
}

impl Value {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Value {
            inner: Arc::new(value),
        }
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Value { inner: value }
    }

    /// Returns a shared reference to the concrete value if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    #[inline]
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    #[inline]
    pub fn is<T: Any + Send + Sync>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Returns true if both values point to the same allocation.
    #[inline]
    pub fn ptr_eq(&self, rhs: &Value) -> bool {
        self.identity() == rhs.identity()
    }

    /// The address of the shared allocation, used to find the name of a value.
    #[inline]
    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Value({:#x})", self.identity())
    }
}

pub(crate) type Dependencies = SmallVec<[String; 4]>;

/// The output of a successful decode: the value, how to dispose it, and the names
/// of other resources that were loaded while producing it.
pub struct Decoded {
    pub(crate) value: Value,
    pub(crate) disposer: Option<Arc<dyn Dispose>>,
    pub(crate) dependencies: Dependencies,
}

impl Decoded {
    /// Wraps a value which needs no explicit disposal.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Decoded {
            value: Value::new(value),
            disposer: None,
            dependencies: SmallVec::new(),
        }
    }

    /// Wraps a value whose `Dispose::dispose` runs when the cache disposes it.
    pub fn disposable<T: Any + Dispose>(value: T) -> Self {
        let value = Arc::new(value);
        Decoded {
            value: Value::from_arc(value.clone()),
            disposer: Some(value),
            dependencies: SmallVec::new(),
        }
    }

    /// Records a dependency. Duplicates are ignored and order is preserved.
    pub fn with_dependency<T: Into<String>>(mut self, name: T) -> Self {
        self.push_dependency(name.into());
        self
    }

    pub fn with_dependencies<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        for name in names {
            self.push_dependency(name.into());
        }
        self
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[inline]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn push_dependency(&mut self, name: String) {
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
    }
}
