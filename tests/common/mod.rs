#![allow(dead_code)]

use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rescache::prelude::*;

pub fn setup() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A decoded image that owns an (imaginary) GPU texture.
pub struct Texture {
    pub bytes: Vec<u8>,
    pub disposed: Arc<AtomicUsize>,
}

impl Dispose for Texture {
    fn dispose(&self) {
        self.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default, Clone)]
pub struct PngDecoder {
    pub decoded: Arc<AtomicUsize>,
    pub disposed: Arc<AtomicUsize>,
}

impl PngDecoder {
    pub fn decoded(&self) -> usize {
        self.decoded.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Decoder for PngDecoder {
    fn decode(
        &self,
        _: &ResourceCache,
        _: &Descriptor,
        stream: &mut dyn Stream,
    ) -> Result<Decoded, failure::Error> {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        if bytes.starts_with(b"corrupted") {
            bail!("Malformed png.");
        }

        self.decoded.fetch_add(1, Ordering::SeqCst);
        Ok(Decoded::disposable(Texture {
            bytes,
            disposed: self.disposed.clone(),
        }))
    }
}

/// A material lists the names of the resources it depends on, one per line.
pub struct Material {
    pub dependencies: Vec<Value>,
}

pub struct MaterialDecoder;

impl Decoder for MaterialDecoder {
    fn decode(
        &self,
        cache: &ResourceCache,
        _: &Descriptor,
        stream: &mut dyn Stream,
    ) -> Result<Decoded, failure::Error> {
        let mut text = String::new();
        stream.read_to_string(&mut text)?;

        let names: Vec<_> = text
            .lines()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect();

        let mut dependencies = Vec::new();
        for (i, name) in names.iter().enumerate() {
            match cache.load(name, &Descriptor::DEFAULT_CACHEABLE) {
                Ok(v) => dependencies.push(v),
                Err(err) => {
                    for v in &names[..i] {
                        cache.release(v);
                    }

                    return Err(err.into());
                }
            }
        }

        Ok(Decoded::new(Material { dependencies }).with_dependencies(names))
    }
}

/// Records every notification as `"event:name"`.
#[derive(Default, Clone)]
pub struct Recorder {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn filter(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|v| v.starts_with(prefix))
            .collect()
    }
}

impl ResourceListener for Recorder {
    fn on_loaded(&self, name: &str) {
        self.events.lock().unwrap().push(format!("loaded:{}", name));
    }

    fn on_failed(&self, name: &str, _: &rescache::Error) {
        self.events.lock().unwrap().push(format!("failed:{}", name));
    }

    fn on_disposed(&self, name: &str) {
        self.events.lock().unwrap().push(format!("disposed:{}", name));
    }
}

/// A stream which counts how many times it has been closed.
pub struct Tracked {
    pub inner: Cursor<Vec<u8>>,
    pub closed: Arc<AtomicUsize>,
    pub fail_close: bool,
}

impl Read for Tracked {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Stream for Tracked {
    fn close(&mut self) -> io::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(io::Error::new(io::ErrorKind::Other, "close failed"))
        } else {
            Ok(())
        }
    }
}

/// Serves every name with the same bytes through `Tracked` streams.
#[derive(Default, Clone)]
pub struct TrackedLocator {
    pub bytes: Vec<u8>,
    pub closed: Arc<AtomicUsize>,
    pub fail_close: bool,
}

impl TrackedLocator {
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Locator for TrackedLocator {
    fn locate(&self, _: &str) -> Option<Box<dyn Stream>> {
        Some(Box::new(Tracked {
            inner: Cursor::new(self.bytes.clone()),
            closed: self.closed.clone(),
            fail_close: self.fail_close,
        }))
    }
}

/// Creates a fresh directory under the system temp dir with the given files.
pub fn fixture(tag: &str, files: &[(&str, &[u8])]) -> PathBuf {
    let root = std::env::temp_dir().join(format!(
        "rescache-{}-{}-{}",
        tag,
        std::process::id(),
        rand::random::<u32>()
    ));

    for (name, bytes) in files {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    std::fs::create_dir_all(&root).unwrap();
    root
}
