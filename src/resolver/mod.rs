//! Cost resolution on top of the two-tier cache
//!
//! [`CostResolver`] answers "how many cycles does this workload take" by
//! trying, in order, a sanitizer gate, the cache, an external measurement
//! service, the predictor and an analytical formula.

pub mod analytical;
pub mod builder;
pub mod collaborators;
pub mod context_pool;
pub mod cost_resolver;
pub mod outcome;
pub mod service_worker;
pub mod workload;

pub use analytical::analytical_cycles;
pub use builder::CostResolverBuilder;
pub use collaborators::{
    FeatureEncoder, MeasurementService, ModelBundle, OutputAdapter, Predictor, SanitizeReport, Sanitizer,
};
pub use context_pool::{ExecutionContext, ExecutionContextPool, InferenceBuffers};
pub use cost_resolver::{CostResolver, KeyPolicy};
pub use outcome::{CostSource, Cycles, ResolutionOutcome};
pub use service_worker::ServiceWorkerPool;
pub use workload::{DataType, Operation, Tensor, VpuDevice, Workload, WORKLOAD_KEY_LENGTH};
