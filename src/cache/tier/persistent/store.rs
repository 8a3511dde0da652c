//! Fixed-record key/value table backed by a binary file or buffer

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;

use super::binary_format::{decode_records, record_size, trailing_bytes, write_record};
use crate::cache::traits::{CacheOperationError, Fingerprint, FingerprintContext, Fingerprintable};
use crate::cache::types::statistics::AccessCounter;

#[derive(Debug, Clone)]
struct StoredRecord {
    key: Box<[f32]>,
    value: f32,
}

/// In-memory image of a cache file
///
/// Records keep their insertion order, which is also the order `save`
/// writes them in. Loading a key twice keeps the first position and the
/// last value.
#[derive(Debug)]
pub struct PersistentStore {
    key_length: usize,
    context: FingerprintContext,
    records: Vec<StoredRecord>,
    index: HashMap<Fingerprint, usize>,
    counter: AccessCounter,
}

impl PersistentStore {
    pub fn new(key_length: usize) -> Self {
        Self::with_context(key_length, FingerprintContext::default())
    }

    pub fn with_context(key_length: usize, context: FingerprintContext) -> Self {
        Self {
            key_length,
            context,
            records: Vec::new(),
            index: HashMap::new(),
            counter: AccessCounter::new(),
        }
    }

    #[inline(always)]
    pub fn key_length(&self) -> usize {
        self.key_length
    }

    #[inline(always)]
    pub fn context(&self) -> &FingerprintContext {
        &self.context
    }

    #[inline(always)]
    pub fn counter(&self) -> &AccessCounter {
        &self.counter
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load every record of `path`; returns the number of records read
    ///
    /// A missing or empty file is an empty load, not an error.
    pub fn load_file(&mut self, path: &Path) -> Result<usize, CacheOperationError> {
        if !path.exists() {
            log::warn!("Cache file does not exist: {}, ignoring", path.display());
            return Ok(0);
        }

        let file = File::open(path).map_err(|e| {
            CacheOperationError::io_failed(format!(
                "failed to open cache file {} for reading: {}",
                path.display(),
                e
            ))
        })?;

        let file_length = file.metadata()?.len();
        if file_length == 0 {
            log::debug!("Cache file {} is empty", path.display());
            return Ok(0);
        }

        // SAFETY: read-only mapping that does not outlive this call; cache files
        // are produced before the process starts using them.
        let mapping = unsafe { Mmap::map(&file) }.map_err(|e| {
            CacheOperationError::io_failed(format!(
                "failed to map cache file {}: {}",
                path.display(),
                e
            ))
        })?;

        let loaded = self.load_buffer(&mapping);
        log::debug!(
            "Loaded {} cache records from {} ({} bytes)",
            loaded,
            path.display(),
            file_length
        );
        Ok(loaded)
    }

    /// Load every complete record of `data`; returns the number of records read
    pub fn load_buffer(&mut self, data: &[u8]) -> usize {
        if data.is_empty() {
            log::debug!("Cache buffer is empty, nothing to load");
            return 0;
        }

        let leftover = trailing_bytes(data.len(), self.key_length);
        if leftover != 0 {
            log::warn!(
                "Cache data has {} trailing bytes, not a multiple of the {} byte record size",
                leftover,
                record_size(self.key_length)
            );
        }

        let mut loaded = 0;
        for (key, value) in decode_records(data, self.key_length) {
            self.insert_unchecked(key.into_boxed_slice(), value);
            loaded += 1;
        }
        loaded
    }

    /// Insert one record; keys of the wrong length are logged and ignored
    pub fn write_one(&mut self, key: &[f32], value: f32) -> bool {
        if key.len() != self.key_length {
            log::warn!(
                "Rejecting cache key of length {}, expecting {}",
                key.len(),
                self.key_length
            );
            return false;
        }
        self.insert_unchecked(key.into(), value);
        true
    }

    fn insert_unchecked(&mut self, key: Box<[f32]>, value: f32) {
        let fingerprint = self.context.hash_floats(&key);
        match self.index.get(&fingerprint) {
            Some(&position) => {
                // Colliding or repeated fingerprint: latest write wins.
                self.records[position] = StoredRecord { key, value };
            }
            None => {
                self.index.insert(fingerprint, self.records.len());
                self.records.push(StoredRecord { key, value });
            }
        }
    }

    /// Write the table to `path`; returns the number of records written
    ///
    /// An existing file is only touched when `append` is set.
    pub fn save(&self, path: &Path, append: bool) -> Result<usize, CacheOperationError> {
        if path.exists() && !append {
            log::warn!("Cache file already exists: {}, refusing to overwrite", path.display());
            return Err(CacheOperationError::io_failed(format!(
                "refusing to overwrite existing cache file {}",
                path.display()
            )));
        }

        let mut options = OpenOptions::new();
        if append {
            options.create(true).append(true);
        } else {
            options.write(true).create_new(true);
        }

        let file = options.open(path).map_err(|e| {
            log::warn!("Failed to open cache file {} for writing: {}", path.display(), e);
            CacheOperationError::io_failed(format!("failed to open {}: {}", path.display(), e))
        })?;

        let mut writer = BufWriter::new(file);
        for record in &self.records {
            write_record(&mut writer, &record.key, record.value)?;
        }
        writer.flush()?;

        Ok(self.records.len())
    }

    pub fn contains<K: Fingerprintable + ?Sized>(&self, key: &K) -> bool {
        self.contains_fingerprint(key.fingerprint(&self.context))
    }

    pub fn contains_fingerprint(&self, fingerprint: Fingerprint) -> bool {
        self.index.contains_key(&fingerprint)
    }

    /// Lookup that records a hit or a miss
    pub fn get<K: Fingerprintable + ?Sized>(&self, key: &K) -> Option<f32> {
        self.get_ref(key).copied()
    }

    /// Zero-copy lookup that records a hit or a miss
    pub fn get_ref<K: Fingerprintable + ?Sized>(&self, key: &K) -> Option<&f32> {
        self.get_ref_by_fingerprint(key.fingerprint(&self.context))
    }

    pub fn get_by_fingerprint(&self, fingerprint: Fingerprint) -> Option<f32> {
        self.get_ref_by_fingerprint(fingerprint).copied()
    }

    fn get_ref_by_fingerprint(&self, fingerprint: Fingerprint) -> Option<&f32> {
        match self.index.get(&fingerprint) {
            Some(&position) => {
                self.counter.hit();
                Some(&self.records[position].value)
            }
            None => {
                self.counter.miss();
                None
            }
        }
    }

    /// Records in save order
    pub fn iter(&self) -> impl Iterator<Item = (&[f32], f32)> {
        self.records.iter().map(|record| (&*record.key, record.value))
    }
}
