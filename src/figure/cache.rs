/// Sibling cache storage and retrieval
///
/// Holds figure files that a multi-output script produced before the build
/// graph asked for them. Entries live directly under the cache root, keyed by
/// bare file name. Every relocation is rename-based so an interrupted request
/// never leaves a truncated entry behind.
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{FigureError, FigureResult};
use crate::logging::{operations, services, status};

/// Directory under the cache root that holds owner locks
pub const LOCKS_DIR: &str = ".locks";

const TEMP_PREFIX: &str = ".figcache-tmp";

/// How `put` treats the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Keep the source and cache a duplicate
    Copy,
    /// Relocate the source into the cache
    Move,
}

impl PutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
        }
    }
}

/// A cached file, as reported by `entries`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub name: String,
    pub size_bytes: u64,
}

/// Sibling cache manager
#[derive(Debug, Clone)]
pub struct SiblingCache {
    root: PathBuf,
}

impl SiblingCache {
    /// Open the cache rooted at `root`, creating the directory if needed
    pub fn new(root: impl Into<PathBuf>) -> FigureResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| FigureError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn has(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }

    /// Move the cached `name` into `destination_dir`, consuming the entry
    pub fn take(&self, name: &str, destination_dir: &Path) -> FigureResult<PathBuf> {
        let source = self.root.join(name);
        let destination = destination_dir.join(name);

        match relocate(&source, &destination) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound && !source.exists() => {
                return Err(FigureError::CacheConsistency {
                    name: name.to_string(),
                    cache_dir: self.root.clone(),
                });
            }
            Err(e) => return Err(FigureError::io(&destination, e)),
        }

        info!(
            service = services::SIBLING_CACHE,
            operation = operations::TAKE,
            status = status::SUCCESS,
            figure = name,
            destination = %destination.display(),
            "restored figure from sibling cache"
        );

        Ok(destination)
    }

    /// Cache `source_dir/name`. An existing entry of the same name is replaced.
    ///
    /// `script` names the owner and is only used to report a missing source.
    pub fn put(
        &self,
        script: &str,
        name: &str,
        source_dir: &Path,
        mode: PutMode,
    ) -> FigureResult<PathBuf> {
        let source = source_dir.join(name);
        let destination = self.root.join(name);

        if !source.is_file() {
            return Err(FigureError::MissingOutput {
                script: script.to_string(),
                name: name.to_string(),
                dir: source_dir.to_path_buf(),
            });
        }

        let result = match mode {
            PutMode::Copy => atomic_copy(&source, &destination),
            PutMode::Move => relocate(&source, &destination),
        };

        result.map_err(|e| {
            if e.kind() == ErrorKind::NotFound && !source.exists() {
                FigureError::MissingOutput {
                    script: script.to_string(),
                    name: name.to_string(),
                    dir: source_dir.to_path_buf(),
                }
            } else {
                FigureError::io(&destination, e)
            }
        })?;

        debug!(
            service = services::SIBLING_CACHE,
            operation = operations::PUT,
            status = status::SUCCESS,
            figure = name,
            mode = mode.as_str(),
            "cached sibling output"
        );

        Ok(destination)
    }

    /// List cached entries, sorted by name
    pub fn entries(&self) -> FigureResult<Vec<CacheEntryInfo>> {
        let mut entries = Vec::new();

        if !self.root.exists() {
            return Ok(entries);
        }

        let read_dir = fs::read_dir(&self.root).map_err(|e| FigureError::io(&self.root, e))?;
        for entry in read_dir {
            let entry = entry.map_err(|e| FigureError::io(&self.root, e))?;
            let metadata = entry
                .metadata()
                .map_err(|e| FigureError::io(entry.path(), e))?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) {
                continue;
            }
            entries.push(CacheEntryInfo {
                name,
                size_bytes: metadata.len(),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Remove every cached entry and the lock directory
    pub fn clear(&self) -> FigureResult<usize> {
        let entries = self.entries()?;
        for entry in &entries {
            let path = self.root.join(&entry.name);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(FigureError::io(&path, e)),
            }
        }

        let locks = self.root.join(LOCKS_DIR);
        if locks.exists() {
            fs::remove_dir_all(&locks).map_err(|e| FigureError::io(&locks, e))?;
        }

        Ok(entries.len())
    }
}

/// Rename `source` to `destination`, falling back to copy-then-remove when the
/// rename is refused (e.g. across file systems)
fn relocate(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(e),
        Err(_) => {
            atomic_copy(source, destination)?;
            fs::remove_file(source)
        }
    }
}

/// Copy `source` into a temp file beside `destination`, then rename it into
/// place. Permissions and modification time are preserved.
fn atomic_copy(source: &Path, destination: &Path) -> io::Result<()> {
    let parent = destination
        .parent()
        .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "destination has no parent"))?;

    let temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(parent)?;

    fs::copy(source, temp.path())?;

    let modified = fs::metadata(source)?.modified()?;
    temp.as_file().set_modified(modified)?;
    temp.as_file().sync_all()?;

    temp.persist(destination).map_err(|e| e.error)?;
    Ok(())
}
