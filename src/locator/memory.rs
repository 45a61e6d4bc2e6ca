use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use super::{Locator, Stream};

/// An in-memory table of named byte blobs. Clones share the same table, so
/// blobs could be added after the locator has been registered.
#[derive(Debug, Default, Clone)]
pub struct Memory {
    files: Arc<RwLock<HashMap<String, Arc<[u8]>>>>,
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Adds or replaces a blob.
    pub fn insert<T1, T2>(&self, name: T1, bytes: T2)
    where
        T1: Into<String>,
        T2: Into<Vec<u8>>,
    {
        let bytes: Vec<u8> = bytes.into();
        self.files
            .write()
            .unwrap()
            .insert(name.into(), bytes.into());
    }

    pub fn remove<T: AsRef<str>>(&self, name: T) -> bool {
        self.files.write().unwrap().remove(name.as_ref()).is_some()
    }

    #[inline]
    pub fn contains<T: AsRef<str>>(&self, name: T) -> bool {
        self.files.read().unwrap().contains_key(name.as_ref())
    }
}

impl Locator for Memory {
    fn locate(&self, name: &str) -> Option<Box<dyn Stream>> {
        let files = self.files.read().unwrap();
        files
            .get(name)
            .map(|bytes| Box::new(Cursor::new(bytes.to_vec())) as Box<dyn Stream>)
    }
}
