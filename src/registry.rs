//! Versioned layouts and key names, gathered once and shared read-only.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::key::{resolve, CompositeKey, KeyTable, TankName};
use crate::schema::StructLayout;

/// Everything a [`CacheReader`](crate::reader::CacheReader) looks up while decoding: one layout
/// per record version, and the display names of composite keys.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    layouts: BTreeMap<i16, StructLayout>,
    keys: KeyTable,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layout for a version, replacing any earlier one.
    pub fn with_layout(mut self, version: i16, layout: StructLayout) -> Self {
        self.layouts.insert(version, layout);
        self
    }

    pub fn with_key_table(mut self, keys: KeyTable) -> Self {
        self.keys = keys;
        self
    }

    /// Compile every schema file in `dir` whose stem is a version number, such as `26` or
    /// `26.sdf`. Other files are skipped. Returns the number of layouts loaded.
    pub fn load_schema_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let version = match path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i16>().ok())
            {
                Some(v) => v,
                None => {
                    tracing::debug!(path = %path.display(), "skipping non-schema file");
                    continue;
                }
            };
            let layout = StructLayout::from_path(&path)?;
            self.layouts.insert(version, layout);
            loaded += 1;
        }
        tracing::info!(dir = %dir.display(), loaded, "loaded schema directory");
        Ok(loaded)
    }

    /// Build a registry from a schema directory alone.
    pub fn from_schema_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut registry = Self::new();
        registry.load_schema_dir(dir)?;
        Ok(registry)
    }

    pub fn layout(&self, version: i16) -> Result<&StructLayout> {
        self.layouts
            .get(&version)
            .ok_or(Error::UnknownSchemaVersion(version))
    }

    pub fn versions(&self) -> impl Iterator<Item = i16> + '_ {
        self.layouts.keys().copied()
    }

    pub fn key_table(&self) -> &KeyTable {
        &self.keys
    }

    pub fn resolve(&self, key: CompositeKey) -> Result<&TankName> {
        resolve(key, &self.keys)
    }
}
