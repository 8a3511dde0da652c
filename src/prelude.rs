//! Convenient imports for resolver users

pub use crate::resolver::{CostResolver, CostResolverBuilder};

pub use crate::cache::traits::types_and_enums::CacheOperationError;

pub use crate::cache::config::{CacheConfig, ResolverConfig};
pub use crate::cache::tier::{BoundedLruCache, FixedTierCache, PersistentStore, CACHE_PATH_ENV};

// Collaborator traits callers implement
pub use crate::resolver::collaborators::{
    FeatureEncoder, MeasurementService, OutputAdapter, Predictor, SanitizeReport, Sanitizer,
};

pub use crate::resolver::outcome::{CostSource, Cycles, ResolutionOutcome};
pub use crate::resolver::workload::{DataType, Operation, Tensor, VpuDevice, Workload};
