use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Request, RequestKey, Response};

use super::CachedData;

const INDEX_EXTENSION: &str = "json";
const BODY_EXTENSION: &str = "body";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache storage unavailable: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode cache {name}: {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid cache name: {0:?}")]
    InvalidName(String),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Index record for one entry. The body is kept in its own file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    url: String,
    status: u16,
    #[serde(default)]
    headers: Vec<(String, String)>,
    body: String,
}

/// On-disk index of a single named cache: `<root>/<name>.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    name: String,
    #[serde(default)]
    next_body: u64,
    #[serde(default)]
    entries: BTreeMap<RequestKey, CachedData<StoredEntry>>,
}

fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn ignore_missing(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Create one directory level. The parent must already exist.
fn ensure_dir(path: &Path) -> io::Result<()> {
    match std::fs::create_dir(path) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        other => other,
    }
}

/// Body file names are `<n>.body`; anything else in an index is rejected.
fn body_id(file_name: &str) -> Option<u64> {
    file_name
        .strip_suffix(BODY_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

/// Paths of a disk-backed cache.
#[derive(Debug)]
struct CacheFiles {
    index: PathBuf,
    bodies: PathBuf,
}

impl CacheFiles {
    fn for_index(index: &Path) -> Self {
        Self {
            index: index.to_path_buf(),
            bodies: index.with_extension(""),
        }
    }

    fn write_body(&self, next_body: &mut u64, body: &[u8]) -> io::Result<String> {
        let file_name = format!("{}.{}", next_body, BODY_EXTENSION);
        std::fs::write(self.bodies.join(&file_name), body)?;
        *next_body += 1;
        Ok(file_name)
    }

    fn remove_bodies(&self, names: impl IntoIterator<Item = String>) {
        for name in names {
            let path = self.bodies.join(&name);
            if let Err(e) = ignore_missing(std::fs::remove_file(&path)) {
                warn!(path = %path.display(), error = %e, "Failed to remove cache body");
            }
        }
    }

    fn remove_all(&self) -> io::Result<()> {
        ignore_missing(std::fs::remove_file(&self.index))?;
        ignore_missing(std::fs::remove_dir_all(&self.bodies))
    }
}

#[derive(Debug)]
struct Slot {
    cached: CachedData<Response>,
    body_file: Option<String>,
}

#[derive(Debug, Default)]
struct CacheState {
    slots: BTreeMap<RequestKey, Slot>,
    next_body: u64,
    /// Set when the cache is deleted from storage. Handles that outlive the
    /// delete keep working in memory but never touch disk again.
    retired: bool,
}

/// One named request→response store.
///
/// Entries have no expiry. Each key is replaced atomically under the
/// write lock. A disk-backed cache writes each body once to its own file
/// and rewrites only the small metadata index on every change.
#[derive(Debug)]
pub struct Cache {
    name: String,
    files: Option<CacheFiles>,
    state: RwLock<CacheState>,
}

impl Cache {
    fn new(name: String, files: Option<CacheFiles>) -> Self {
        Self {
            name,
            files,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Load a cache from its index file, dropping entries whose body is gone.
    fn load(index_path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let contents = std::fs::read(index_path)
            .with_context(|| format!("Failed to read cache index: {}", index_path.display()))?;
        let index: CacheIndex = serde_json::from_slice(&contents)
            .with_context(|| format!("Failed to parse cache index: {}", index_path.display()))?;
        let files = CacheFiles::for_index(index_path);
        ensure_dir(&files.bodies)
            .with_context(|| format!("Failed to create {}", files.bodies.display()))?;

        let mut state = CacheState {
            next_body: index.next_body,
            ..CacheState::default()
        };
        for (key, stored) in index.entries {
            let Some(id) = body_id(&stored.data.body) else {
                warn!(cache = %index.name, key = %key, body = %stored.data.body, "Dropping entry with invalid body name");
                continue;
            };
            let body = match std::fs::read(files.bodies.join(&stored.data.body)) {
                Ok(body) => body,
                Err(e) => {
                    warn!(cache = %index.name, key = %key, error = %e, "Dropping entry with unreadable body");
                    continue;
                }
            };
            state.next_body = state.next_body.max(id + 1);

            let StoredEntry {
                url,
                status,
                headers,
                body: body_file,
            } = stored.data;
            let slot = Slot {
                cached: CachedData {
                    data: Response {
                        url,
                        status,
                        headers,
                        body,
                    },
                    cached_at: stored.cached_at,
                },
                body_file: Some(body_file),
            };
            state.slots.insert(key, slot);
        }

        let cache = Self {
            name: index.name,
            files: Some(files),
            state: RwLock::new(state),
        };
        cache.sweep_orphans();
        Ok(cache)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a stored response for the request.
    pub fn lookup(&self, request: &Request) -> Option<Response> {
        self.lookup_key(&request.key())
    }

    pub fn lookup_key(&self, key: &RequestKey) -> Option<Response> {
        read_lock(&self.state)
            .slots
            .get(key)
            .map(|slot| slot.cached.data.clone())
    }

    /// Stored response together with its write timestamp.
    pub fn entry(&self, key: &RequestKey) -> Option<CachedData<Response>> {
        read_lock(&self.state)
            .slots
            .get(key)
            .map(|slot| slot.cached.clone())
    }

    pub fn put(&self, request: &Request, response: Response) -> CacheResult<()> {
        self.put_key(request.key(), response)
    }

    pub fn put_key(&self, key: RequestKey, response: Response) -> CacheResult<()> {
        debug!(cache = %self.name, key = %key, status = response.status, "Cache put");
        self.put_all(vec![(key, response)])
    }

    /// Store several entries with a single index write.
    ///
    /// Nothing is inserted unless every body was written.
    pub fn put_all(&self, items: Vec<(RequestKey, Response)>) -> CacheResult<()> {
        let mut state = write_lock(&self.state);
        let files = self.live_files(&state);

        let mut slots = Vec::with_capacity(items.len());
        for (key, response) in items {
            let body_file = match files {
                Some(files) => Some(files.write_body(&mut state.next_body, &response.body)?),
                None => None,
            };
            let slot = Slot {
                cached: CachedData::new(response),
                body_file,
            };
            slots.push((key, slot));
        }

        let mut replaced = Vec::new();
        for (key, slot) in slots {
            if let Some(old) = state.slots.insert(key, slot) {
                replaced.extend(old.body_file);
            }
        }

        if let Some(files) = files {
            self.write_index(files, &state)?;
            files.remove_bodies(replaced);
        }
        Ok(())
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, request: &Request) -> CacheResult<bool> {
        let mut state = write_lock(&self.state);
        let Some(old) = state.slots.remove(&request.key()) else {
            return Ok(false);
        };
        if let Some(files) = self.live_files(&state) {
            self.write_index(files, &state)?;
            files.remove_bodies(old.body_file);
        }
        Ok(true)
    }

    pub fn keys(&self) -> Vec<RequestKey> {
        read_lock(&self.state).slots.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        read_lock(&self.state).slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_files(&self, state: &CacheState) -> Option<&CacheFiles> {
        if state.retired {
            None
        } else {
            self.files.as_ref()
        }
    }

    /// Create the body directory and an empty index for a new cache.
    fn init_files(&self) -> CacheResult<()> {
        let Some(ref files) = self.files else {
            return Ok(());
        };
        ensure_dir(&files.bodies)?;
        self.write_index(files, &read_lock(&self.state))
    }

    fn write_index(&self, files: &CacheFiles, state: &CacheState) -> CacheResult<()> {
        let entries = state
            .slots
            .iter()
            .filter_map(|(key, slot)| {
                let response = &slot.cached.data;
                let stored = StoredEntry {
                    url: response.url.clone(),
                    status: response.status,
                    headers: response.headers.clone(),
                    body: slot.body_file.clone()?,
                };
                Some((
                    key.clone(),
                    CachedData {
                        data: stored,
                        cached_at: slot.cached.cached_at,
                    },
                ))
            })
            .collect();
        let index = CacheIndex {
            name: self.name.clone(),
            next_body: state.next_body,
            entries,
        };

        let contents = serde_json::to_vec(&index).map_err(|source| CacheError::Encode {
            name: self.name.clone(),
            source,
        })?;
        std::fs::write(&files.index, contents)?;
        Ok(())
    }

    /// Detach from disk and remove this cache's files.
    fn retire(&self) -> io::Result<()> {
        let mut state = write_lock(&self.state);
        state.retired = true;
        match self.files {
            Some(ref files) => files.remove_all(),
            None => Ok(()),
        }
    }

    /// Remove body files no entry refers to, left by an interrupted write.
    fn sweep_orphans(&self) {
        let Some(ref files) = self.files else {
            return;
        };
        let Ok(dir) = std::fs::read_dir(&files.bodies) else {
            return;
        };
        let state = read_lock(&self.state);
        let live: BTreeSet<&str> = state
            .slots
            .values()
            .filter_map(|slot| slot.body_file.as_deref())
            .collect();
        let orphans: Vec<String> = dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !live.contains(name.as_str()))
            .collect();
        if !orphans.is_empty() {
            debug!(cache = %self.name, count = orphans.len(), "Removing orphaned cache bodies");
            files.remove_bodies(orphans);
        }
    }
}

/// The set of named caches belonging to one origin.
///
/// Clone is cheap; clones share the same caches.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    inner: Arc<StorageInner>,
}

#[derive(Debug)]
struct StorageInner {
    root: Option<PathBuf>,
    caches: RwLock<BTreeMap<String, Arc<Cache>>>,
}

impl CacheStorage {
    /// Storage that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(StorageInner {
                root: None,
                caches: RwLock::new(BTreeMap::new()),
            }),
        }
    }

    /// Storage persisted under `root`: a `<name>.json` index per cache and a
    /// `<name>/` directory holding its response bodies.
    ///
    /// Existing caches are loaded eagerly. Unreadable indexes are skipped
    /// with a warning and treated as absent.
    pub fn open_dir(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let mut caches = BTreeMap::new();
        for entry in std::fs::read_dir(&root)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(INDEX_EXTENSION) {
                continue;
            }
            match Cache::load(&path) {
                Ok(cache) => {
                    debug!(cache = %cache.name, entries = cache.len(), "Loaded cache from disk");
                    caches.insert(cache.name.clone(), Arc::new(cache));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable cache index");
                }
            }
        }

        Ok(Self {
            inner: Arc::new(StorageInner {
                root: Some(root),
                caches: RwLock::new(caches),
            }),
        })
    }

    fn validate_name(name: &str) -> CacheResult<()> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(())
        } else {
            Err(CacheError::InvalidName(name.to_string()))
        }
    }

    fn cache_files(&self, name: &str) -> Option<CacheFiles> {
        self.inner.root.as_ref().map(|root| {
            CacheFiles::for_index(&root.join(format!("{}.{}", name, INDEX_EXTENSION)))
        })
    }

    /// Open a cache by name, creating it if it does not exist.
    pub fn open(&self, name: &str) -> CacheResult<Arc<Cache>> {
        if let Some(cache) = read_lock(&self.inner.caches).get(name) {
            return Ok(Arc::clone(cache));
        }

        Self::validate_name(name)?;
        let mut caches = write_lock(&self.inner.caches);
        // Another caller may have created it between the two locks
        if let Some(cache) = caches.get(name) {
            return Ok(Arc::clone(cache));
        }

        let cache = Arc::new(Cache::new(name.to_string(), self.cache_files(name)));
        cache.init_files()?;
        debug!(cache = name, "Created cache");
        caches.insert(name.to_string(), Arc::clone(&cache));
        Ok(cache)
    }

    /// Delete a whole cache. Returns whether it existed.
    ///
    /// Handles to the deleted cache stay usable but are no longer persisted,
    /// so a late write cannot bring the cache back on the next load.
    pub fn delete(&self, name: &str) -> CacheResult<bool> {
        let removed = write_lock(&self.inner.caches).remove(name);
        match removed {
            Some(ref cache) => cache.retire()?,
            None if Self::validate_name(name).is_ok() => {
                if let Some(files) = self.cache_files(name) {
                    files.remove_all()?;
                }
            }
            None => {}
        }
        Ok(removed.is_some())
    }

    pub fn has(&self, name: &str) -> bool {
        read_lock(&self.inner.caches).contains_key(name)
    }

    pub fn names(&self) -> BTreeSet<String> {
        read_lock(&self.inner.caches).keys().cloned().collect()
    }

    pub fn root(&self) -> Option<&Path> {
        self.inner.root.as_deref()
    }
}

// ============================================================================
// Tests
// ============================================================================
