//! Configuration of a `ResourceCache`.

use std::io::Read;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::errors::*;

/// A filesystem directory to be registered as a locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirParams {
    pub name: String,
    pub root: PathBuf,
}

/// A structure containing configuration data for the resource cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceParams {
    /// Directories, tried in this order.
    pub locators: Vec<DirParams>,
    /// The descriptor used by `ResourceCache::load_default`.
    pub descriptor: Descriptor,
}

impl ResourceParams {
    /// Parses parameters from JSON.
    ///
    /// ```
    /// use rescache::ResourceParams;
    ///
    /// let json = r#"{
    ///     "locators": [{ "name": "res", "root": "/tmp" }],
    ///     "descriptor": { "cacheable": true }
    /// }"#;
    ///
    /// let params = ResourceParams::from_json(json.as_bytes()).unwrap();
    /// assert_eq!(params.locators[0].name, "res");
    /// assert!(params.descriptor.cacheable);
    /// ```
    pub fn from_json<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Appends a directory locator.
    pub fn with_dir<T1, T2>(mut self, name: T1, root: T2) -> Self
    where
        T1: Into<String>,
        T2: Into<PathBuf>,
    {
        self.locators.push(DirParams {
            name: name.into(),
            root: root.into(),
        });
        self
    }
}
