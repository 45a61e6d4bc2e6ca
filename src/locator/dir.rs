use std::fs;
use std::path::{Component, Path, PathBuf};
use std::thread;

use crate::errors::*;

use super::{LocateCallback, Locator, Stream};

/// Locates resources as files under a root directory. Asynchronous requests are
/// served from a short-lived worker thread.
#[derive(Debug, Clone)]
pub struct Dir {
    root: PathBuf,
}

impl Dir {
    pub fn new<T: Into<PathBuf>>(root: T) -> Result<Self> {
        let root = root.into();
        info!("Creates directory based locator at {:?}.", root);

        match fs::metadata(&root) {
            Ok(ref metadata) if metadata.is_dir() => Ok(Dir { root }),
            _ => Err(Error::Config(format!(
                "Directory locator must be associated with a readable directory, got {:?}.",
                root
            ))),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a logical name to a path under the root. Names that try to escape
    /// the root are rejected.
    fn path<T: AsRef<Path>>(&self, name: T) -> Option<PathBuf> {
        let name = name.as_ref();
        let escapes = name
            .components()
            .any(|v| !matches!(v, Component::Normal(_) | Component::CurDir));

        if escapes {
            None
        } else {
            Some(self.root.join(name))
        }
    }

    fn open(&self, name: &str) -> Option<Box<dyn Stream>> {
        let path = self.path(name)?;
        match fs::File::open(&path) {
            Ok(file) => Some(Box::new(file)),
            Err(err) => {
                trace!("Could not open {:?}: {}", path, err);
                None
            }
        }
    }
}

impl Locator for Dir {
    fn locate(&self, name: &str) -> Option<Box<dyn Stream>> {
        self.open(name)
    }

    fn locate_async(&self, name: &str, on_done: LocateCallback) {
        let dir = self.clone();
        let name = name.to_owned();
        thread::spawn(move || on_done(dir.open(&name)));
    }
}
