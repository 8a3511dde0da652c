//! Cascading cost resolution
//!
//! Stages run in a fixed order: sanitizer gate, cache, measurement service,
//! predictor, analytical formula. Each either answers, passes to the next
//! stage or ends the request with an error. No lock is held while the
//! service or the predictor runs.

use std::fmt;
use std::sync::Arc;

use super::analytical::analytical_cycles;
use super::builder::CostResolverBuilder;
use super::collaborators::{MeasurementService, ModelBundle, Sanitizer};
use super::context_pool::{ExecutionContextPool, InferenceBuffers};
use super::outcome::{CostSource, Cycles, ResolutionOutcome};
use super::service_worker::ServiceWorkerPool;
use super::workload::Workload;
use crate::cache::config::ResolverConfig;
use crate::cache::tier::BoundedLruCache;
use crate::cache::traits::{CacheOperationError, Fingerprint};
use crate::cache::types::statistics::AccessCounter;

/// Which cache, and therefore which key derivation, a workload uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Fingerprint of the encoded descriptor
    Descriptor,
    /// Fingerprint of the canonical workload fields
    Workload,
}

#[derive(Debug)]
struct CacheKey {
    policy: KeyPolicy,
    fingerprint: Fingerprint,
    // kept so the predictor does not encode the workload a second time
    descriptor: Option<Vec<f32>>,
}

#[derive(Debug)]
struct PendingPrediction {
    workload: Workload,
    key: CacheKey,
}

enum Stage {
    Done(ResolutionOutcome),
    Predict(PendingPrediction),
}

pub struct CostResolver {
    config: ResolverConfig,
    descriptor_cache: BoundedLruCache,
    workload_cache: BoundedLruCache,
    model: Option<ModelBundle>,
    service: Option<Arc<dyn MeasurementService>>,
    // present only when a service timeout is configured
    service_pool: Option<ServiceWorkerPool>,
    sanitizer: Option<Arc<dyn Sanitizer>>,
    contexts: ExecutionContextPool,
}

impl CostResolver {
    pub fn builder() -> CostResolverBuilder {
        CostResolverBuilder::new()
    }

    pub(crate) fn from_parts(
        config: ResolverConfig,
        descriptor_cache: BoundedLruCache,
        workload_cache: BoundedLruCache,
        model: Option<ModelBundle>,
        service: Option<Arc<dyn MeasurementService>>,
        service_pool: Option<ServiceWorkerPool>,
        sanitizer: Option<Arc<dyn Sanitizer>>,
        contexts: ExecutionContextPool,
    ) -> Self {
        Self {
            config,
            descriptor_cache,
            workload_cache,
            model,
            service,
            service_pool,
            sanitizer,
            contexts,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn has_predictor(&self) -> bool {
        self.model.is_some()
    }

    pub fn descriptor_cache(&self) -> &BoundedLruCache {
        &self.descriptor_cache
    }

    pub fn workload_cache(&self) -> &BoundedLruCache {
        &self.workload_cache
    }

    pub fn context_pool(&self) -> &ExecutionContextPool {
        &self.contexts
    }

    pub fn cache_for(&self, policy: KeyPolicy) -> &BoundedLruCache {
        match policy {
            KeyPolicy::Descriptor => &self.descriptor_cache,
            KeyPolicy::Workload => &self.workload_cache,
        }
    }

    /// Fixed tier counter of whichever cache has seen more traffic
    ///
    /// Normally only one of the two caches is in use.
    pub fn preloaded_counter(&self) -> &AccessCounter {
        let descriptor = self.descriptor_cache.fixed().counter();
        let workload = self.workload_cache.fixed().counter();
        if descriptor.accesses() >= workload.accesses() {
            descriptor
        } else {
            workload
        }
    }

    /// Resolve one workload through every stage
    pub fn resolve(&self, workload: &Workload) -> ResolutionOutcome {
        if workload.is_dual_condition() {
            // Both halves run the full chain; the smaller estimate is taken
            // as a best case, not a bound.
            let (without_input, without_weights) = workload.split_dual();
            log::trace!("Dual sparsity workload resolved as two variants");
            let first = self.resolve_single(&without_input);
            let second = self.resolve_single(&without_weights);
            return ResolutionOutcome::combine_min(first, second);
        }
        self.resolve_single(workload)
    }

    /// [`resolve`](Self::resolve) folded into a cycle count or error code
    pub fn resolve_cycles(&self, workload: &Workload) -> u32 {
        self.resolve(workload).cycles()
    }

    /// Resolve many workloads, batching the predictor calls
    pub fn resolve_batch(&self, workloads: &[Workload]) -> Vec<ResolutionOutcome> {
        let mut outcomes: Vec<Option<ResolutionOutcome>> = vec![None; workloads.len()];
        let mut pending = Vec::new();

        for (index, workload) in workloads.iter().enumerate() {
            if workload.is_dual_condition() {
                outcomes[index] = Some(self.resolve(workload));
                continue;
            }
            match self.front_stages(workload) {
                Stage::Done(outcome) => outcomes[index] = Some(outcome),
                Stage::Predict(prediction) => pending.push((index, prediction)),
            }
        }

        if let Some(model) = self.model.as_ref().filter(|_| !pending.is_empty()) {
            match self.run_batch(model, &pending) {
                Ok(raw_values) => {
                    for ((index, prediction), raw) in pending.iter().zip(raw_values) {
                        outcomes[*index] = Some(self.finish_prediction(
                            model,
                            &prediction.workload,
                            &prediction.key,
                            raw,
                        ));
                    }
                }
                Err(error) if !error.is_terminal() => {
                    log::trace!("Batch predictor unusable ({}), using analytical", error);
                    for (index, prediction) in &pending {
                        outcomes[*index] = Some(ResolutionOutcome::resolved(
                            CostSource::Analytical,
                            analytical_cycles(&prediction.workload),
                        ));
                    }
                }
                Err(error) => {
                    log::debug!("Batch prediction failed: {}", error);
                    for (index, _) in &pending {
                        outcomes[*index] = Some(ResolutionOutcome::failed(CostSource::Predictor, error.clone()));
                    }
                }
            }
        }

        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.unwrap_or_else(|| {
                    ResolutionOutcome::failed(
                        CostSource::Predictor,
                        CacheOperationError::consistency("batch item left unresolved"),
                    )
                })
            })
            .collect()
    }

    /// Adapted cached value without running any other stage
    pub fn get_cached(&self, workload: &Workload) -> Result<u32, CacheOperationError> {
        let model = self.model.as_ref().ok_or(CacheOperationError::NotFound)?;
        let key = self.cache_key(model, workload);
        let raw = self
            .cache_for(key.policy)
            .get_by_fingerprint(key.fingerprint)?
            .ok_or(CacheOperationError::NotFound)?;

        if model.adapter.is_value_invalid(raw) {
            let (low, high) = model.adapter.valid_interval();
            return Err(CacheOperationError::InvalidOutputRange { value: raw, low, high });
        }
        Ok(Cycles::from_adapted(model.adapter.adapt(workload, raw)))
    }

    /// Store a raw predictor value for `workload`; ignored without a model
    pub fn add_to_cache(&self, workload: &Workload, raw_value: f32) -> Result<(), CacheOperationError> {
        let Some(model) = &self.model else {
            return Ok(());
        };
        let key = self.cache_key(model, workload);
        self.cache_for(key.policy).add_by_fingerprint(key.fingerprint, raw_value)
    }

    fn resolve_single(&self, workload: &Workload) -> ResolutionOutcome {
        let outcome = match self.front_stages(workload) {
            Stage::Done(outcome) => outcome,
            Stage::Predict(prediction) => self.predict_one(prediction),
        };
        if let Err(error) = &outcome.result {
            log::debug!("Resolution stopped at {}: {}", outcome.source, error);
        }
        outcome
    }

    /// Everything up to the predictor
    fn front_stages(&self, workload: &Workload) -> Stage {
        let workload = match self.sanitize(workload) {
            Ok(workload) => workload,
            Err(error) => return Stage::Done(ResolutionOutcome::failed(CostSource::Sanitizer, error)),
        };

        let key = match &self.model {
            Some(model) => {
                let key = self.cache_key(model, &workload);
                match self.cache_for(key.policy).get_by_fingerprint(key.fingerprint) {
                    Ok(Some(raw)) => {
                        log::trace!("Cache hit ({:?}) for {:#018x}", key.policy, key.fingerprint.value());
                        let cycles = Cycles::from_adapted(model.adapter.adapt(&workload, raw));
                        return Stage::Done(ResolutionOutcome::resolved(CostSource::Cache, cycles));
                    }
                    Ok(None) => Some(key),
                    Err(error) => return Stage::Done(ResolutionOutcome::failed(CostSource::Cache, error)),
                }
            }
            None => None,
        };

        if let Some(service) = &self.service {
            match self.query_service(service, &workload) {
                Ok(Some(cycles)) => {
                    return Stage::Done(ResolutionOutcome::resolved(CostSource::ExternalService, cycles));
                }
                Ok(None) => log::trace!("Measurement service has no value for this workload"),
                Err(error) if !error.is_terminal() => {
                    log::trace!("Measurement service gave no usable answer: {}", error)
                }
                Err(error) => {
                    return Stage::Done(ResolutionOutcome::failed(CostSource::ExternalService, error));
                }
            }
        }

        match key {
            Some(key) => Stage::Predict(PendingPrediction { workload, key }),
            None => {
                log::trace!("No predictor loaded, using analytical estimate");
                Stage::Done(ResolutionOutcome::resolved(
                    CostSource::Analytical,
                    analytical_cycles(&workload),
                ))
            }
        }
    }

    fn sanitize(&self, workload: &Workload) -> Result<Workload, CacheOperationError> {
        let mut workload = workload.clone();
        if let Some(sanitizer) = &self.sanitizer {
            let report = sanitizer.check_and_sanitize(&mut workload);
            if !report.usable {
                return Err(CacheOperationError::InvalidInput(report.diagnostic));
            }
        }
        Ok(workload)
    }

    fn cache_key(&self, model: &ModelBundle, workload: &Workload) -> CacheKey {
        if workload.uses_workload_fingerprint() {
            CacheKey {
                policy: KeyPolicy::Workload,
                fingerprint: self.workload_cache.fingerprint(workload),
                descriptor: None,
            }
        } else {
            let descriptor = model.encoder.encode(workload);
            CacheKey {
                policy: KeyPolicy::Descriptor,
                fingerprint: self.descriptor_cache.fingerprint(descriptor.as_slice()),
                descriptor: Some(descriptor),
            }
        }
    }

    fn query_service(
        &self,
        service: &Arc<dyn MeasurementService>,
        workload: &Workload,
    ) -> Result<Option<u32>, CacheOperationError> {
        match &self.service_pool {
            Some(pool) => pool.query(workload),
            None => service.measure(workload),
        }
    }

    fn predict_one(&self, prediction: PendingPrediction) -> ResolutionOutcome {
        let PendingPrediction { workload, key } = prediction;
        let Some(model) = &self.model else {
            return ResolutionOutcome::resolved(CostSource::Analytical, analytical_cycles(&workload));
        };

        match self.run_single(model, &workload, key.descriptor.as_deref()) {
            Ok(raw) => self.finish_prediction(model, &workload, &key, raw),
            Err(error) if !error.is_terminal() => {
                log::trace!("Predictor unusable ({}), using analytical estimate", error);
                ResolutionOutcome::resolved(CostSource::Analytical, analytical_cycles(&workload))
            }
            Err(error) => ResolutionOutcome::failed(CostSource::Predictor, error),
        }
    }

    fn run_single(
        &self,
        model: &ModelBundle,
        workload: &Workload,
        descriptor: Option<&[f32]>,
    ) -> Result<f32, CacheOperationError> {
        let encoded;
        let features = match descriptor {
            Some(descriptor) => descriptor,
            None => {
                encoded = model.encoder.encode(workload);
                encoded.as_slice()
            }
        };

        let context = self.contexts.get_or_create()?;
        let mut buffers = context.buffers()?;
        model.predictor.predict(features, &mut buffers.scratch)
    }

    fn run_batch(
        &self,
        model: &ModelBundle,
        pending: &[(usize, PendingPrediction)],
    ) -> Result<Vec<f32>, CacheOperationError> {
        let stride = model.descriptor_length();
        if stride == 0 {
            return Err(CacheOperationError::InvalidInput(
                "feature encoder produces empty descriptors".to_string(),
            ));
        }

        let context = self.contexts.get_or_create()?;
        let mut guard = context.buffers()?;
        let InferenceBuffers {
            input,
            results,
            scratch,
        } = &mut *guard;
        input.clear();
        results.clear();

        for (_, prediction) in pending {
            match &prediction.key.descriptor {
                Some(descriptor) => input.extend_from_slice(descriptor),
                None => model.encoder.encode_into(&prediction.workload, input),
            }
        }
        if input.len() != stride * pending.len() {
            return Err(CacheOperationError::consistency(format!(
                "encoded {} floats for {} workloads of descriptor length {}",
                input.len(),
                pending.len(),
                stride
            )));
        }

        for chunk in input.chunks(stride * context.batch_size().max(1)) {
            model.predictor.predict_batch(chunk, stride, scratch, results)?;
        }
        if results.len() != pending.len() {
            return Err(CacheOperationError::consistency(format!(
                "predictor returned {} values for {} workloads",
                results.len(),
                pending.len()
            )));
        }
        Ok(results.clone())
    }

    /// Range check, write back, adapt
    fn finish_prediction(
        &self,
        model: &ModelBundle,
        workload: &Workload,
        key: &CacheKey,
        raw: f32,
    ) -> ResolutionOutcome {
        if model.adapter.is_value_invalid(raw) {
            let (low, high) = model.adapter.valid_interval();
            return ResolutionOutcome::failed(
                CostSource::Predictor,
                CacheOperationError::InvalidOutputRange { value: raw, low, high },
            );
        }

        if let Err(error) = self.cache_for(key.policy).add_by_fingerprint(key.fingerprint, raw) {
            return ResolutionOutcome::failed(CostSource::Cache, error);
        }

        let cycles = Cycles::from_adapted(model.adapter.adapt(workload, raw));
        ResolutionOutcome::resolved(CostSource::Predictor, cycles)
    }
}

impl fmt::Debug for CostResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CostResolver")
            .field("config", &self.config)
            .field("model", &self.model)
            .field("service", &self.service.is_some())
            .field("service_pool", &self.service_pool)
            .field("sanitizer", &self.sanitizer.is_some())
            .field("descriptor_cache_size", &self.descriptor_cache.size())
            .field("workload_cache_size", &self.workload_cache.size())
            .finish()
    }
}
