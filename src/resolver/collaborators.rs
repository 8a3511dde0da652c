//! Interfaces of the components the resolver drives but does not implement

use std::fmt;
use std::sync::Arc;

use super::workload::Workload;
use crate::cache::traits::CacheOperationError;

/// Learned cost model
///
/// `scratch` belongs to the calling thread's execution context and may be
/// used freely between calls.
pub trait Predictor: Send + Sync {
    /// Raw estimate for one feature vector
    fn predict(&self, features: &[f32], scratch: &mut Vec<f32>) -> Result<f32, CacheOperationError>;

    /// Append one raw estimate per `stride` floats of `features` to `results`
    fn predict_batch(
        &self,
        features: &[f32],
        stride: usize,
        scratch: &mut Vec<f32>,
        results: &mut Vec<f32>,
    ) -> Result<(), CacheOperationError> {
        if stride == 0 {
            return Err(CacheOperationError::InvalidInput(
                "batch stride must be positive".to_string(),
            ));
        }
        for features in features.chunks_exact(stride) {
            results.push(self.predict(features, scratch)?);
        }
        Ok(())
    }
}

/// Versioned workload to feature vector encoding
pub trait FeatureEncoder: Send + Sync {
    /// Floats produced per workload
    fn output_length(&self) -> usize;

    fn encode(&self, workload: &Workload) -> Vec<f32>;

    fn encode_into(&self, workload: &Workload, out: &mut Vec<f32>) {
        out.extend_from_slice(&self.encode(workload));
    }
}

/// Versioned raw value to cycles adaptation
pub trait OutputAdapter: Send + Sync {
    fn adapt(&self, workload: &Workload, raw_value: f32) -> f32;

    /// Closed `(low, high)` interval of sane raw values
    fn valid_interval(&self) -> (f32, f32);

    /// Outside the valid interval, NaN included
    fn is_value_invalid(&self, raw_value: f32) -> bool {
        let (low, high) = self.valid_interval();
        !(raw_value >= low && raw_value <= high)
    }
}

/// Outcome of a sanitizer pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeReport {
    pub usable: bool,
    pub diagnostic: String,
}

impl SanitizeReport {
    pub fn usable() -> Self {
        Self {
            usable: true,
            diagnostic: String::new(),
        }
    }

    pub fn rejected(diagnostic: impl Into<String>) -> Self {
        Self {
            usable: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Workload legality check; may normalize the workload in place
pub trait Sanitizer: Send + Sync {
    fn check_and_sanitize(&self, workload: &mut Workload) -> SanitizeReport;
}

/// External source of measured cycles
///
/// `Ok(None)` means the service has no measurement for this workload. An
/// `Unavailable` error means it could not be reached; both let resolution
/// continue. Any other error ends the request.
pub trait MeasurementService: Send + Sync {
    fn measure(&self, workload: &Workload) -> Result<Option<u32>, CacheOperationError>;
}

/// Predictor together with the encoder and adapter it was trained with
#[derive(Clone)]
pub struct ModelBundle {
    pub predictor: Arc<dyn Predictor>,
    pub encoder: Arc<dyn FeatureEncoder>,
    pub adapter: Arc<dyn OutputAdapter>,
}

impl ModelBundle {
    pub fn new(
        predictor: Arc<dyn Predictor>,
        encoder: Arc<dyn FeatureEncoder>,
        adapter: Arc<dyn OutputAdapter>,
    ) -> Self {
        Self {
            predictor,
            encoder,
            adapter,
        }
    }

    pub fn descriptor_length(&self) -> usize {
        self.encoder.output_length()
    }
}

impl fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBundle")
            .field("descriptor_length", &self.encoder.output_length())
            .field("valid_interval", &self.adapter.valid_interval())
            .finish()
    }
}
