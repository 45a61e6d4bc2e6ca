#[macro_use]
extern crate failure;
extern crate rescache;

mod common;

use std::io::Read;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rescache::prelude::*;
use rescache::LocatorChain;

use common::*;

type Trace = Arc<Mutex<Vec<String>>>;

/// Fails asynchronously on a worker thread, after a while.
struct Slow(&'static str, Trace);

impl Locator for Slow {
    fn locate(&self, _: &str) -> Option<Box<dyn Stream>> {
        None
    }

    fn locate_async(&self, _: &str, on_done: LocateCallback) {
        let (tag, trace) = (self.0, self.1.clone());
        trace.lock().unwrap().push(format!("{}:start", tag));

        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            trace.lock().unwrap().push(format!("{}:done", tag));
            on_done(None);
        });
    }
}

/// Serves everything, but only asynchronously.
struct Eager(&'static str, Trace);

impl Locator for Eager {
    fn locate(&self, _: &str) -> Option<Box<dyn Stream>> {
        None
    }

    fn locate_async(&self, name: &str, on_done: LocateCallback) {
        self.1.lock().unwrap().push(format!("{}:start", self.0));
        on_done(Some(Box::new(std::io::Cursor::new(name.as_bytes().to_vec()))));
    }

    fn supports_sync(&self) -> bool {
        false
    }
}

fn read(mut stream: Box<dyn Stream>) -> String {
    let mut buf = String::new();
    stream.read_to_string(&mut buf).unwrap();
    buf
}

#[test]
fn fallback_order() {
    setup();

    let trace = Trace::default();
    let mut chain = LocatorChain::new();
    chain.register("l1", Slow("l1", trace.clone()));
    chain.register("l2", Eager("l2", trace.clone()));

    let (tx, rx) = mpsc::channel();
    chain.locate_async("x", move |rsp| tx.send(rsp.map(read)).unwrap());

    let rsp = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(rsp, Some("x".to_owned()));
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["l1:start", "l1:done", "l2:start"]
    );
}

#[test]
fn first_hit_wins() {
    setup();

    let trace = Trace::default();
    let mut chain = LocatorChain::new();
    chain.register("l1", Eager("l1", trace.clone()));
    chain.register("l2", Eager("l2", trace.clone()));

    let (tx, rx) = mpsc::channel();
    chain.locate_async("x", move |rsp| tx.send(rsp.is_some()).unwrap());

    assert!(rx.recv().unwrap());
    assert_eq!(*trace.lock().unwrap(), vec!["l1:start"]);
}

#[test]
fn exhausted() {
    setup();

    let trace = Trace::default();
    let mut chain = LocatorChain::new();
    chain.register("l1", Slow("l1", trace.clone()));
    chain.register("l2", Slow("l2", trace.clone()));

    let (tx, rx) = mpsc::channel();
    chain.locate_async("x", move |rsp| tx.send(rsp.is_none()).unwrap());

    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    assert_eq!(
        *trace.lock().unwrap(),
        vec!["l1:start", "l1:done", "l2:start", "l2:done"]
    );

    // The callback is invoked exactly once.
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn empty_chain() {
    let chain = LocatorChain::new();
    assert!(chain.locate("x").is_none());

    let (tx, rx) = mpsc::channel();
    chain.locate_async("x", move |rsp| tx.send(rsp.is_none()).unwrap());
    assert!(rx.recv().unwrap());
}

#[test]
fn sync_skips_async_only() {
    let trace = Trace::default();
    let memory = Memory::new();
    memory.insert("x", "memory");

    let mut chain = LocatorChain::new();
    chain.register("eager", Eager("eager", trace.clone()));
    chain.register("memory", memory);

    assert_eq!(chain.locate("x").map(read), Some("memory".to_owned()));
    assert!(trace.lock().unwrap().is_empty());
}

#[test]
fn registration() {
    let mut chain = LocatorChain::new();
    chain.register("a", Memory::new());
    chain.register("b", Memory::new());

    assert_eq!(chain.len(), 2);
    assert!(chain.contains("a"));
    assert!(chain.remove("a").is_ok());
    assert!(!chain.contains("a"));
    assert!(chain.remove("a").is_err());
    assert_eq!(chain.names(), vec!["b"]);
}

#[test]
fn dir() {
    setup();

    let root = fixture(
        "dir",
        &[("hero.png", b"hero"), ("textures/ground.png", b"ground")],
    );

    let dir = Dir::new(&root).unwrap();
    assert_eq!(dir.root(), root.as_path());

    assert_eq!(dir.locate("hero.png").map(read), Some("hero".to_owned()));
    assert_eq!(
        dir.locate("textures/ground.png").map(read),
        Some("ground".to_owned())
    );
    assert!(dir.locate("missing.png").is_none());
    assert!(dir.locate("../hero.png").is_none());

    let (tx, rx) = mpsc::channel();
    dir.locate_async(
        "textures/ground.png",
        Box::new(move |rsp| tx.send(rsp.map(read)).unwrap()),
    );

    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        Some("ground".to_owned())
    );
}

#[test]
fn memory() {
    let memory = Memory::new();
    assert!(memory.locate("a").is_none());

    let shared = memory.clone();
    shared.insert("a", "a");
    assert!(memory.contains("a"));
    assert_eq!(memory.locate("a").map(read), Some("a".to_owned()));

    assert!(memory.remove("a"));
    assert!(!memory.remove("a"));
    assert!(memory.locate("a").is_none());
}

#[test]
fn load_async_miss_then_hit() {
    setup();

    let trace = Trace::default();
    let png = PngDecoder::default();
    let recorder = Recorder::default();

    let cache = ResourceCache::new();
    cache.register_locator("l1", Slow("l1", trace.clone()));
    cache.register_locator("l2", Eager("l2", trace.clone()));
    cache.register_loader(png.clone(), &["png"]);
    cache.attach_listener(recorder.clone());

    let (tx, rx) = mpsc::channel();
    let tx2 = tx.clone();
    cache.load_async("a.png", Descriptor::DEFAULT_CACHEABLE, move |rsp| {
        tx.send(rsp.map(|v| v.is::<Texture>()).unwrap_or(false))
            .unwrap()
    });

    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    assert_eq!(cache.refcount("a.png"), Some(1));
    assert_eq!(recorder.events(), vec!["loaded:a.png"]);

    // A hit calls back right away, on this very thread.
    let current = thread::current().id();
    cache.load_async("a.png", Descriptor::DEFAULT_CACHEABLE, move |rsp| {
        assert_eq!(thread::current().id(), current);
        tx2.send(rsp.is_ok()).unwrap()
    });

    assert!(rx.try_recv().unwrap());
    assert_eq!(cache.refcount("a.png"), Some(2));
    assert_eq!(png.decoded(), 1);
    assert_eq!(trace.lock().unwrap().len(), 3);
}

#[test]
fn load_async_not_found() {
    setup();

    let trace = Trace::default();
    let recorder = Recorder::default();

    let cache = ResourceCache::new();
    cache.register_locator("l1", Slow("l1", trace.clone()));
    cache.register_loader(PngDecoder::default(), &["png"]);
    cache.attach_listener(recorder.clone());

    let (tx, rx) = mpsc::channel();
    cache.load_async("a.png", Descriptor::DEFAULT_CACHEABLE, move |rsp| {
        tx.send(rsp.map(|_| ())).unwrap()
    });

    match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
        Err(rescache::Error::NotFound(name)) => assert_eq!(name, "a.png"),
        other => panic!("unexpected result {:?}", other),
    }

    assert!(cache.is_empty());
    assert_eq!(recorder.events(), vec!["failed:a.png"]);
}

#[test]
fn load_async_decode_error() {
    setup();

    let memory = Memory::new();
    memory.insert("a.png", "corrupted");

    let cache = ResourceCache::new();
    cache.register_locator("memory", memory);
    cache.register_loader(PngDecoder::default(), &["png"]);

    let (tx, rx) = mpsc::channel();
    cache.load_async("a.png", Descriptor::DEFAULT, move |rsp| {
        tx.send(rsp.is_err()).unwrap()
    });

    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    assert!(cache.is_empty());
}

#[test]
fn load_async_with_dependencies() {
    setup();

    let root = fixture("async-deps", &[("a.mat", b"b.png"), ("b.png", b"b")]);
    let png = PngDecoder::default();

    let cache = ResourceCache::new();
    cache.register_locator("fs", Dir::new(&root).unwrap());
    cache.register_loader(png.clone(), &["png"]);
    cache.register_loader(MaterialDecoder, &["mat"]);

    let (tx, rx) = mpsc::channel();
    cache.load_async("a.mat", Descriptor::DEFAULT_CACHEABLE, move |rsp| {
        tx.send(rsp.is_ok()).unwrap()
    });

    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    assert_eq!(cache.len(), 2);

    cache.release("a.mat");
    assert!(cache.is_empty());
    assert_eq!(png.disposed(), 1);
}
