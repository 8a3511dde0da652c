//! Fluent construction of a [`CostResolver`]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::collaborators::{FeatureEncoder, MeasurementService, ModelBundle, OutputAdapter, Predictor, Sanitizer};
use super::context_pool::ExecutionContextPool;
use super::cost_resolver::CostResolver;
use super::service_worker::{ServiceWorkerPool, DEFAULT_SERVICE_QUEUE_DEPTH, DEFAULT_SERVICE_WORKERS};
use crate::cache::config::{CacheConfig, ResolverConfig};
use crate::cache::tier::BoundedLruCache;
use crate::cache::traits::CacheOperationError;

/// Builder for [`CostResolver`]
///
/// Without a model the resolver answers from the measurement service or the
/// analytical formula only; both caches stay unused.
#[derive(Default)]
pub struct CostResolverBuilder {
    config: ResolverConfig,
    model: Option<ModelBundle>,
    service: Option<Arc<dyn MeasurementService>>,
    sanitizer: Option<Arc<dyn Sanitizer>>,
}

impl CostResolverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a JSON file
    pub fn config_file(self, path: &Path) -> Result<Self, CacheOperationError> {
        let config = ResolverConfig::from_json_file(path)?;
        Ok(self.config(config))
    }

    pub fn model(
        mut self,
        predictor: Arc<dyn Predictor>,
        encoder: Arc<dyn FeatureEncoder>,
        adapter: Arc<dyn OutputAdapter>,
    ) -> Self {
        self.model = Some(ModelBundle::new(predictor, encoder, adapter));
        self
    }

    pub fn model_bundle(mut self, model: ModelBundle) -> Self {
        self.model = Some(model);
        self
    }

    pub fn measurement_service(mut self, service: Arc<dyn MeasurementService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn sanitizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    /// Set the dynamic tier capacity of both caches; 0 disables them
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.descriptor_cache.capacity = capacity;
        self.config.workload_cache.capacity = capacity;
        self
    }

    pub fn descriptor_cache(mut self, cache: CacheConfig) -> Self {
        self.config.descriptor_cache = cache;
        self
    }

    pub fn workload_cache(mut self, cache: CacheConfig) -> Self {
        self.config.workload_cache = cache;
        self
    }

    /// Fixed tier file for descriptor-keyed lookups
    pub fn descriptor_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.descriptor_cache.fixed_tier_file = Some(path.into());
        self
    }

    /// Fixed tier file for workload-keyed lookups
    pub fn workload_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.workload_cache.fixed_tier_file = Some(path.into());
        self
    }

    /// Load `<model>.cache_bin` next to `model_path` when it exists
    pub fn paired_cache(mut self, model_path: impl Into<PathBuf>) -> Self {
        let model_path = model_path.into();
        self.config.descriptor_cache = self.config.descriptor_cache.with_paired_source(model_path.clone());
        self.config.workload_cache = self.config.workload_cache.with_paired_source(model_path);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Bound each measurement query; queries then run on a small fixed
    /// worker pool and a full queue counts as unavailable
    pub fn service_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1);
        self.config.service_timeout_ms = Some(millis);
        self
    }

    pub fn results_prealloc(mut self, results: usize) -> Self {
        self.config.results_prealloc = results;
        self
    }

    /// Validate, load both fixed tiers and assemble the resolver
    pub fn build(self) -> Result<CostResolver, CacheOperationError> {
        let mut config = self.config;
        config.validate()?;

        let descriptor_length = match &self.model {
            Some(model) => {
                let length = model.descriptor_length();
                if length == 0 {
                    return Err(CacheOperationError::configuration_error(
                        "feature encoder reports an empty descriptor",
                    ));
                }
                match config.descriptor_cache.key_length {
                    0 => config.descriptor_cache.key_length = length,
                    configured if configured != length => {
                        return Err(CacheOperationError::configuration_error(format!(
                            "descriptor cache key length {} does not match encoder output length {}",
                            configured, length
                        )));
                    }
                    _ => {}
                }
                length
            }
            None => 0,
        };

        let descriptor_cache = if config.descriptor_cache.key_length == 0 {
            log::debug!("No feature encoder configured, descriptor cache left empty");
            BoundedLruCache::without_fixed_tier(config.descriptor_cache.capacity, 0)
        } else {
            config.descriptor_cache.build()?
        };
        let workload_cache = config.workload_cache.build()?;

        let contexts = ExecutionContextPool::new(
            config.batch_size,
            descriptor_length * config.batch_size,
            config.results_prealloc,
        );

        let service_pool = match (&self.service, config.service_timeout_ms) {
            (Some(service), Some(timeout_ms)) => Some(ServiceWorkerPool::new(
                Arc::clone(service),
                DEFAULT_SERVICE_WORKERS,
                DEFAULT_SERVICE_QUEUE_DEPTH,
                Duration::from_millis(timeout_ms),
            )?),
            _ => None,
        };

        log::info!(
            "Cost resolver ready: predictor {}, measurement service {}, sanitizer {}, preloaded entries {}+{}",
            self.model.is_some(),
            self.service.is_some(),
            self.sanitizer.is_some(),
            descriptor_cache.fixed().len(),
            workload_cache.fixed().len()
        );

        Ok(CostResolver::from_parts(
            config,
            descriptor_cache,
            workload_cache,
            self.model,
            self.service,
            service_pool,
            self.sanitizer,
            contexts,
        ))
    }
}
