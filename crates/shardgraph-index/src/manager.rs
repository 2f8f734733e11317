//! Loading every index under a root directory for one shard.
//!
//! ```text
//! <root>/<index>/meta
//! <root>/<index>/<prefix>_<n>.dat
//! ```
//!
//! The meta record picks the concrete index type. Only the partial files
//! owned by this shard are mapped and merged.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;
use rayon::prelude::*;

use crate::config::LoaderConfig;
use crate::error::{IndexError, Result};
use crate::hash_index::HashSampleIndex;
use crate::hash_range_index::HashRangeSampleIndex;
use crate::meta::{IndexKind, IndexMeta, META_FILE_NAME};
use crate::range_index::RangeSampleIndex;
use crate::sample_index::{MergeableIndex, SampleIndex};
use crate::value::{DataType, F32Value, IndexId, IndexValue};

pub const DATA_FILE_EXTENSION: &str = "dat";

#[derive(Debug, Clone)]
pub struct LoadedIndex {
    pub meta: IndexMeta,
    pub index: Arc<dyn SampleIndex>,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct IndexManager {
    indexes: BTreeMap<String, LoadedIndex>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every index directory under `root`.
    ///
    /// Any index that fails to load fails the whole call.
    pub fn load(root: &Path, config: &LoaderConfig) -> Result<Self> {
        config.validate()?;
        let dirs = index_dirs(root)?;
        tracing::info!(
            root = %root.display(),
            indexes = dirs.len(),
            shard_index = config.shard_index,
            shard_number = config.shard_number,
            "loading indexes"
        );

        let loaded: Vec<(String, LoadedIndex)> = if config.parallel {
            dirs.par_iter()
                .map(|(name, dir)| load_index(name, dir, config).map(|l| (name.clone(), l)))
                .collect::<Result<_>>()?
        } else {
            dirs.iter()
                .map(|(name, dir)| load_index(name, dir, config).map(|l| (name.clone(), l)))
                .collect::<Result<_>>()?
        };

        Ok(Self {
            indexes: loaded.into_iter().collect(),
        })
    }

    pub fn insert(&mut self, meta: IndexMeta, index: Arc<dyn SampleIndex>) {
        let name = index.name().to_string();
        self.indexes.insert(
            name,
            LoadedIndex {
                meta,
                index,
                files: Vec::new(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SampleIndex>> {
        self.indexes.get(name).map(|l| Arc::clone(&l.index))
    }

    pub fn meta(&self, name: &str) -> Option<IndexMeta> {
        self.indexes.get(name).map(|l| l.meta)
    }

    pub fn loaded(&self, name: &str) -> Option<&LoadedIndex> {
        self.indexes.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> IndexError + '_ {
    move |source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Subdirectories of `root` that carry a meta file, sorted by name.
fn index_dirs(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).map_err(io_err(root))? {
        let entry = entry.map_err(io_err(root))?;
        let path = entry.path();
        if !path.is_dir() || !path.join(META_FILE_NAME).is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            dirs.push((name.to_string(), path.clone()));
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Partial number of a `<prefix>_<n>.dat` file name.
pub fn partial_number(file_name: &str) -> Option<u64> {
    let parts: Vec<&str> = file_name.split(['_', '.']).collect();
    match parts.as_slice() {
        [_, n, ext] if *ext == DATA_FILE_EXTENSION => n.parse().ok(),
        _ => None,
    }
}

/// Data files in `dir` owned by this shard, in file-name order.
pub fn shard_files(dir: &Path, config: &LoaderConfig) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let path = entry.map_err(io_err(dir))?.path();
        let Some(n) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(partial_number)
        else {
            continue;
        };
        if path.is_file() && config.owns(n) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn load_index(name: &str, dir: &Path, config: &LoaderConfig) -> Result<LoadedIndex> {
    let meta = IndexMeta::read(name, dir)?;
    let files = shard_files(dir, config)?;
    let index = open_index(name, &meta, &files)?;
    tracing::info!(
        index = name,
        kind = %meta.kind,
        id_type = %meta.id_type,
        value_type = %meta.value_type,
        files = files.len(),
        rows = index.row_count(),
        "loaded index"
    );
    Ok(LoadedIndex { meta, index, files })
}

/// Decode and merge `files` into the index type named by `meta`.
pub fn open_index(name: &str, meta: &IndexMeta, files: &[PathBuf]) -> Result<Arc<dyn SampleIndex>> {
    match meta.id_type {
        DataType::UInt32 => open_with_id::<u32>(name, meta, files),
        DataType::UInt64 => open_with_id::<u64>(name, meta, files),
        other => Err(unsupported_type(name, "id", other)),
    }
}

fn open_with_id<Id: IndexId>(
    name: &str,
    meta: &IndexMeta,
    files: &[PathBuf],
) -> Result<Arc<dyn SampleIndex>> {
    match meta.value_type {
        DataType::Float => open_typed::<Id, F32Value>(name, meta.kind, files),
        DataType::UInt32 => open_typed::<Id, u32>(name, meta.kind, files),
        DataType::Int32 => open_typed::<Id, i32>(name, meta.kind, files),
        DataType::UInt64 => open_typed::<Id, u64>(name, meta.kind, files),
        DataType::Int64 => open_typed::<Id, i64>(name, meta.kind, files),
        DataType::String => open_typed::<Id, String>(name, meta.kind, files),
        other => Err(unsupported_type(name, "value", other)),
    }
}

fn open_typed<Id: IndexId, V: IndexValue>(
    name: &str,
    kind: IndexKind,
    files: &[PathBuf],
) -> Result<Arc<dyn SampleIndex>> {
    Ok(match kind {
        IndexKind::Hash => Arc::new(load_partials::<HashSampleIndex<Id, V>>(name, files)?),
        IndexKind::Range => Arc::new(load_partials::<RangeSampleIndex<Id, V>>(name, files)?),
        IndexKind::HashRange => {
            Arc::new(load_partials::<HashRangeSampleIndex<Id, V>>(name, files)?)
        }
    })
}

fn unsupported_type(name: &str, role: &str, data_type: DataType) -> IndexError {
    IndexError::Meta {
        index: name.to_string(),
        message: format!("{data_type} is not a supported {role} type"),
    }
}

/// Deserialize every partial and merge them into the first.
pub fn load_partials<I: MergeableIndex>(name: &str, files: &[PathBuf]) -> Result<I> {
    let mut partials = files
        .iter()
        .map(|path| read_segment::<I>(name, path))
        .collect::<Result<Vec<I>>>()?;
    if partials.is_empty() {
        tracing::warn!(index = name, "no data files for this shard");
        return Ok(I::empty(name));
    }
    let mut index = partials.remove(0);
    index.merge_all(partials)?;
    Ok(index)
}

fn read_segment<I: MergeableIndex>(name: &str, path: &Path) -> Result<I> {
    let file = File::open(path).map_err(io_err(path))?;
    let len = file.metadata().map_err(io_err(path))?.len();
    if len == 0 {
        return I::deserialize(name, &[]);
    }
    // SAFETY: segment files are written once and never modified while loaded.
    let mmap = unsafe { Mmap::map(&file) }.map_err(io_err(path))?;
    tracing::debug!(index = name, path = %path.display(), bytes = mmap.len(), "mapped segment");
    I::deserialize(name, &mmap)
}
