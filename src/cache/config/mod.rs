//! Cache and resolver configuration
//!
//! Every field has a default, so a JSON file only needs to name what it
//! changes.

pub mod types;

pub use types::{CacheConfig, ResolverConfig, DEFAULT_CACHE_CAPACITY, DEFAULT_RESULTS_PREALLOC};
