//! Serializable configuration for cache instances and the cost resolver

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::tier::{BoundedLruCache, FixedTierCache, FixedTierSource};
use crate::cache::traits::CacheOperationError;
use crate::resolver::workload::WORKLOAD_KEY_LENGTH;

/// Capacity used by the resolver's caches unless configured otherwise
pub const DEFAULT_CACHE_CAPACITY: usize = 16384;

/// Results reserved per execution context
pub const DEFAULT_RESULTS_PREALLOC: usize = 1000;

/// One bounded cache plus the file backing its fixed tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Dynamic tier entries; 0 disables the dynamic tier
    pub capacity: usize,
    /// Floats per key; 0 means "take it from the feature encoder"
    pub key_length: usize,
    /// Explicit fixed tier file
    pub fixed_tier_file: Option<PathBuf>,
    /// Sibling file whose `cache_bin` twin is loaded when no explicit file is set
    pub paired_source: Option<PathBuf>,
    pub use_paired_cache: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
            key_length: 0,
            fixed_tier_file: None,
            paired_source: None,
            use_paired_cache: false,
        }
    }
}

impl CacheConfig {
    /// Defaults for the workload-keyed cache
    pub fn workload_keyed() -> Self {
        Self {
            key_length: WORKLOAD_KEY_LENGTH,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_key_length(mut self, key_length: usize) -> Self {
        self.key_length = key_length;
        self
    }

    pub fn with_fixed_tier_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.fixed_tier_file = Some(path.into());
        self
    }

    pub fn with_paired_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.paired_source = Some(path.into());
        self.use_paired_cache = true;
        self
    }

    pub fn validate(&self) -> Result<(), CacheOperationError> {
        if self.key_length == 0 {
            return Err(CacheOperationError::configuration_error(
                "cache key length must be positive",
            ));
        }
        Ok(())
    }

    fn paired_path(&self) -> Option<&Path> {
        if self.use_paired_cache {
            self.paired_source.as_deref()
        } else {
            None
        }
    }

    /// Source the fixed tier would load, given the current environment
    pub fn fixed_tier_source(&self) -> FixedTierSource {
        FixedTierSource::resolve(self.fixed_tier_file.as_deref(), self.paired_path())
    }

    /// Build the cache, loading its fixed tier
    pub fn build(&self) -> Result<BoundedLruCache, CacheOperationError> {
        self.validate()?;
        let fixed = FixedTierCache::from_source(self.key_length, self.fixed_tier_source());
        log::debug!(
            "Cache built: capacity {}, key length {}, fixed tier {:?} with {} entries",
            self.capacity,
            self.key_length,
            fixed.source(),
            fixed.len()
        );
        Ok(BoundedLruCache::new(self.capacity, fixed))
    }
}

/// Resolver wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Cache keyed by encoded descriptors (older device generations)
    pub descriptor_cache: CacheConfig,
    /// Cache keyed by canonical workload fields (newer device generations)
    pub workload_cache: CacheConfig,
    /// Workloads per predictor batch call
    pub batch_size: usize,
    /// Upper bound on one measurement service query
    pub service_timeout_ms: Option<u64>,
    pub results_prealloc: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            descriptor_cache: CacheConfig::default(),
            workload_cache: CacheConfig::workload_keyed(),
            batch_size: 1,
            service_timeout_ms: None,
            results_prealloc: DEFAULT_RESULTS_PREALLOC,
        }
    }
}

impl ResolverConfig {
    pub fn from_json_str(json: &str) -> Result<Self, CacheOperationError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CacheOperationError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CacheOperationError::configuration_error(format!(
                "failed to read resolver config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String, CacheOperationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that do not depend on the collaborators
    pub fn validate(&self) -> Result<(), CacheOperationError> {
        if self.batch_size == 0 {
            return Err(CacheOperationError::configuration_error(
                "batch size must be at least 1",
            ));
        }
        if self.service_timeout_ms == Some(0) {
            return Err(CacheOperationError::configuration_error(
                "service timeout must be positive when set",
            ));
        }
        if self.workload_cache.key_length != WORKLOAD_KEY_LENGTH {
            return Err(CacheOperationError::configuration_error(format!(
                "workload cache key length must be {}, got {}",
                WORKLOAD_KEY_LENGTH, self.workload_cache.key_length
            )));
        }
        Ok(())
    }
}
