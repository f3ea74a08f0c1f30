//! Table Cache - Load each dataset once and share it
//!
//! The cache is an explicit object handed to the pipeline. It reads through a
//! [`TableSource`] (a data directory in production, in-memory fixtures in
//! tests) and memoizes every table by name for its own lifetime. There is no
//! eviction: the sources are read-only exports. Callers log loads; the cache
//! itself is silent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{CacheError, CacheResult};
use crate::models::Dataset;
use crate::parser::parse_bytes_auto;
use crate::table::Table;

/// Default directory holding the dataset exports (relative to current dir)
pub const DEFAULT_DATA_DIR: &str = "data";

/// Where tables come from on a cache miss.
pub trait TableSource: Send + Sync {
    /// Read and parse the table called `name`.
    fn read(&self, name: &str) -> CacheResult<Table>;
}

/// Reads `<dir>/<file>` for each dataset.
///
/// Known dataset names resolve to their export file names
/// (`orders` → `orders_dataset.csv`); any other name is taken as a file name
/// inside the directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, name: &str) -> (PathBuf, String) {
        match Dataset::from_name(name) {
            Some(dataset) => (self.dir.join(dataset.file_name()), dataset.name().to_string()),
            None => (self.dir.join(name), name.to_string()),
        }
    }
}

impl Default for DirectorySource {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl TableSource for DirectorySource {
    fn read(&self, name: &str) -> CacheResult<Table> {
        let (path, table_name) = self.path_for(name);

        let bytes = std::fs::read(&path).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => CacheError::NotFound(path.display().to_string()),
            _ => CacheError::Io {
                dataset: table_name.clone(),
                source,
            },
        })?;

        let parsed = parse_bytes_auto(&bytes).map_err(|source| CacheError::Csv {
            dataset: table_name.clone(),
            source,
        })?;

        Ok(parsed.into_table(table_name)?)
    }
}

/// Fixed tables held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<String, Table>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `table` under its own name.
    pub fn with_table(mut self, table: Table) -> Self {
        self.insert(table);
        self
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name().to_string(), table);
    }
}

impl TableSource for MemorySource {
    fn read(&self, name: &str) -> CacheResult<Table> {
        let key = Dataset::from_name(name).map_or(name, |d| d.name());
        self.tables
            .get(key)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(name.to_string()))
    }
}

/// Read-through, load-once cache of parsed tables.
///
/// Two threads missing on the same name at once may both read the source;
/// only fully parsed tables are ever published, and the first one stored
/// wins, so callers never see partial data.
pub struct TableCache<S: TableSource> {
    source: S,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl<S: TableSource> TableCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a table by name, reading it from the source on first use.
    pub fn load(&self, name: &str) -> CacheResult<Arc<Table>> {
        let key = cache_key(name);

        if let Some(table) = self.read_lock().get(&key) {
            return Ok(Arc::clone(table));
        }

        let table = Arc::new(self.source.read(&key)?);

        let mut tables = self
            .tables
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(Arc::clone(tables.entry(key).or_insert(table)))
    }

    /// Get one of the known datasets.
    pub fn dataset(&self, dataset: Dataset) -> CacheResult<Arc<Table>> {
        self.load(dataset.name())
    }

    /// Whether `name` (a dataset name or its file name) is already cached.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.read_lock().contains_key(&cache_key(name))
    }

    /// Number of tables loaded so far.
    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Table>>> {
        // Tables are immutable once stored, so a poisoned lock still holds
        // consistent data
        self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Dataset names and export file names share one cache entry.
fn cache_key(name: &str) -> String {
    Dataset::from_name(name).map_or_else(|| name.to_string(), |d| d.name().to_string())
}

impl TableCache<DirectorySource> {
    /// Cache backed by a data directory.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(DirectorySource::new(dir))
    }
}
