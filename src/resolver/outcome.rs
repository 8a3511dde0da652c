//! Resolution results and the `u32` cycle error codes

use std::fmt;

use crate::cache::traits::CacheOperationError;

/// Stage that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostSource {
    Sanitizer,
    Cache,
    ExternalService,
    Predictor,
    Analytical,
}

impl fmt::Display for CostSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CostSource::Sanitizer => "sanitizer",
            CostSource::Cache => "cache",
            CostSource::ExternalService => "external service",
            CostSource::Predictor => "predictor",
            CostSource::Analytical => "analytical",
        };
        f.write_str(name)
    }
}

/// Cycle counts with errors folded into the top of the `u32` range
pub struct Cycles;

impl Cycles {
    pub const MAX_V: u32 = u32::MAX;
    pub const ERROR_INPUT_TOO_BIG: u32 = Self::MAX_V;
    pub const ERROR_INVALID_INPUT_CONFIGURATION: u32 = Self::MAX_V - 1;
    pub const ERROR_INVALID_INPUT_DEVICE: u32 = Self::MAX_V - 2;
    pub const ERROR_INVALID_INPUT_OPERATION: u32 = Self::MAX_V - 3;
    pub const ERROR_INVALID_OUTPUT_RANGE: u32 = Self::MAX_V - 4;
    pub const ERROR_CACHE_MISS: u32 = Self::MAX_V - 9;
    pub const ERROR_INFERENCE_NOT_POSSIBLE: u32 = Self::MAX_V - 10;
    pub const ERROR_PROFILING_SERVICE: u32 = Self::MAX_V - 11;
    pub const ERROR_CACHE_CONSISTENCY: u32 = Self::MAX_V - 12;
    /// Values above this are error codes
    pub const START_ERROR_RANGE: u32 = Self::MAX_V - 1000;

    #[inline]
    pub const fn is_error_code(cycles: u32) -> bool {
        cycles > Self::START_ERROR_RANGE
    }

    pub fn error_text(cycles: u32) -> &'static str {
        match cycles {
            Cycles::ERROR_INPUT_TOO_BIG => "ERROR_INPUT_TOO_BIG",
            Cycles::ERROR_INVALID_INPUT_CONFIGURATION => "ERROR_INVALID_INPUT_CONFIGURATION",
            Cycles::ERROR_INVALID_INPUT_DEVICE => "ERROR_INVALID_INPUT_DEVICE",
            Cycles::ERROR_INVALID_INPUT_OPERATION => "ERROR_INVALID_INPUT_OPERATION",
            Cycles::ERROR_INVALID_OUTPUT_RANGE => "ERROR_INVALID_OUTPUT_RANGE",
            Cycles::ERROR_CACHE_MISS => "ERROR_CACHE_MISS",
            Cycles::ERROR_INFERENCE_NOT_POSSIBLE => "ERROR_INFERENCE_NOT_POSSIBLE",
            Cycles::ERROR_PROFILING_SERVICE => "ERROR_PROFILING_SERVICE",
            Cycles::ERROR_CACHE_CONSISTENCY => "ERROR_CACHE_CONSISTENCY",
            v if Self::is_error_code(v) => "UNKNOWN",
            _ => "NO_ERROR",
        }
    }

    /// Error code reported for a failed resolution
    pub fn code_for(error: &CacheOperationError) -> u32 {
        match error {
            CacheOperationError::ConsistencyError(_) => Self::ERROR_CACHE_CONSISTENCY,
            CacheOperationError::NotFound => Self::ERROR_CACHE_MISS,
            CacheOperationError::InvalidOutputRange { .. } => Self::ERROR_INVALID_OUTPUT_RANGE,
            CacheOperationError::InvalidInput(_) => Self::ERROR_INVALID_INPUT_CONFIGURATION,
            CacheOperationError::ServiceError(_) => Self::ERROR_PROFILING_SERVICE,
            CacheOperationError::Unavailable(_)
            | CacheOperationError::Io(_)
            | CacheOperationError::ConfigurationError(_)
            | CacheOperationError::SerializationError(_) => Self::ERROR_INFERENCE_NOT_POSSIBLE,
        }
    }

    /// Round an adapted estimate up to whole cycles
    #[inline]
    pub fn from_adapted(value: f32) -> u32 {
        // `as` saturates; NaN becomes 0
        value.ceil() as u32
    }
}

/// Final answer of one resolution
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutcome {
    pub source: CostSource,
    pub result: Result<u32, CacheOperationError>,
}

impl ResolutionOutcome {
    pub fn resolved(source: CostSource, cycles: u32) -> Self {
        Self {
            source,
            result: Ok(cycles),
        }
    }

    pub fn failed(source: CostSource, error: CacheOperationError) -> Self {
        Self {
            source,
            result: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn value(&self) -> Option<u32> {
        self.result.as_ref().ok().copied()
    }

    pub fn error(&self) -> Option<&CacheOperationError> {
        self.result.as_ref().err()
    }

    /// Cycles, or the error code on failure
    pub fn cycles(&self) -> u32 {
        match &self.result {
            Ok(cycles) => *cycles,
            Err(error) => Cycles::code_for(error),
        }
    }

    /// Combine the two halves of a dual-condition request
    ///
    /// The smaller estimate wins when both succeeded; otherwise the first
    /// failure, in argument order, is returned.
    pub fn combine_min(without_input_sparsity: Self, without_weight_sparsity: Self) -> Self {
        let take_second = match (&without_input_sparsity.result, &without_weight_sparsity.result) {
            (Ok(a), Ok(b)) => b < a,
            (Err(_), _) => false,
            (Ok(_), Err(_)) => true,
        };
        if take_second {
            without_weight_sparsity
        } else {
            without_input_sparsity
        }
    }
}
