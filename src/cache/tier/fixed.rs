//! Immutable preloaded tier
//!
//! Built once from a cache file or an in-memory buffer and never mutated
//! afterwards, so concurrent readers need no locking.

use std::path::{Path, PathBuf};

use super::persistent::PersistentStore;
use crate::cache::traits::{Fingerprint, FingerprintContext, Fingerprintable};
use crate::cache::types::statistics::AccessCounter;

/// Environment variable naming a cache file that overrides any configured one
pub const CACHE_PATH_ENV: &str = "VPUNN_CACHE_PATH";

/// Extension of a cache file paired with a sibling (model) file
pub const PAIRED_CACHE_EXTENSION: &str = "cache_bin";

/// Where the fixed tier content came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixedTierSource {
    /// `VPUNN_CACHE_PATH` named an existing file
    Environment(PathBuf),
    /// Filename supplied by the caller
    Explicit(PathBuf),
    /// Sibling file with its extension replaced by `cache_bin`
    Paired(PathBuf),
    /// In-memory buffer
    Buffer,
    /// No source; every lookup misses
    Empty,
}

impl FixedTierSource {
    /// Resolve the source file from the process environment
    pub fn resolve(filename: Option<&Path>, paired_with: Option<&Path>) -> Self {
        let env_override = std::env::var_os(CACHE_PATH_ENV).map(PathBuf::from);
        Self::resolve_with(env_override.as_deref(), filename, paired_with)
    }

    /// Resolution order: existing env override, explicit name, existing paired file
    pub fn resolve_with(
        env_override: Option<&Path>,
        filename: Option<&Path>,
        paired_with: Option<&Path>,
    ) -> Self {
        if let Some(path) = env_override.filter(|p| !p.as_os_str().is_empty()) {
            if path.exists() {
                return FixedTierSource::Environment(path.to_path_buf());
            }
            log::debug!(
                "{} names a missing file ({}), ignoring",
                CACHE_PATH_ENV,
                path.display()
            );
        }

        if let Some(path) = filename.filter(|p| !p.as_os_str().is_empty()) {
            return FixedTierSource::Explicit(path.to_path_buf());
        }

        if let Some(sibling) = paired_with.filter(|p| !p.as_os_str().is_empty()) {
            let paired = sibling.with_extension(PAIRED_CACHE_EXTENSION);
            if paired.exists() {
                return FixedTierSource::Paired(paired);
            }
        }

        FixedTierSource::Empty
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            FixedTierSource::Environment(path)
            | FixedTierSource::Explicit(path)
            | FixedTierSource::Paired(path) => Some(path),
            FixedTierSource::Buffer | FixedTierSource::Empty => None,
        }
    }
}

/// Read-only front tier of a [`BoundedLruCache`](super::lru::BoundedLruCache)
#[derive(Debug)]
pub struct FixedTierCache {
    store: PersistentStore,
    source: FixedTierSource,
}

impl FixedTierCache {
    /// Always-miss tier
    pub fn empty(key_length: usize) -> Self {
        Self {
            store: PersistentStore::new(key_length),
            source: FixedTierSource::Empty,
        }
    }

    /// Build from a file, honouring `VPUNN_CACHE_PATH` and paired-file lookup
    pub fn from_file(key_length: usize, filename: Option<&Path>, paired_with: Option<&Path>) -> Self {
        Self::from_source(key_length, FixedTierSource::resolve(filename, paired_with))
    }

    /// Build from an already resolved source
    pub fn from_source(key_length: usize, source: FixedTierSource) -> Self {
        let mut store = PersistentStore::new(key_length);
        if let Some(path) = source.path() {
            if let Err(e) = store.load_file(path) {
                log::warn!("Fixed cache tier treated as empty: {}", e);
            }
        }
        Self { store, source }
    }

    /// Build from the raw bytes of a cache file
    pub fn from_buffer(key_length: usize, data: &[u8]) -> Self {
        let mut store = PersistentStore::new(key_length);
        store.load_buffer(data);
        Self {
            store,
            source: FixedTierSource::Buffer,
        }
    }

    /// Wrap an existing store, freezing it
    pub fn from_store(store: PersistentStore) -> Self {
        Self {
            store,
            source: FixedTierSource::Buffer,
        }
    }

    pub fn contains<K: Fingerprintable + ?Sized>(&self, key: &K) -> bool {
        self.store.contains(key)
    }

    pub fn get<K: Fingerprintable + ?Sized>(&self, key: &K) -> Option<f32> {
        self.store.get(key)
    }

    pub fn get_ref<K: Fingerprintable + ?Sized>(&self, key: &K) -> Option<&f32> {
        self.store.get_ref(key)
    }

    pub(crate) fn contains_fingerprint(&self, fingerprint: Fingerprint) -> bool {
        self.store.contains_fingerprint(fingerprint)
    }

    pub(crate) fn get_by_fingerprint(&self, fingerprint: Fingerprint) -> Option<f32> {
        self.store.get_by_fingerprint(fingerprint)
    }

    pub fn context(&self) -> &FingerprintContext {
        self.store.context()
    }

    pub fn key_length(&self) -> usize {
        self.store.key_length()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn source(&self) -> &FixedTierSource {
        &self.source
    }

    pub fn counter(&self) -> &AccessCounter {
        self.store.counter()
    }
}

impl Drop for FixedTierCache {
    fn drop(&mut self) {
        if self.store.counter().accesses() > 0 {
            self.store.counter().log_summary("Fixed cache tier at shutdown: ");
        }
    }
}
