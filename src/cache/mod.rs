//! Two-tier memoizing cache for raw cost values
//!
//! A [`BoundedLruCache`](tier::BoundedLruCache) owns an immutable
//! [`FixedTierCache`](tier::FixedTierCache) loaded once from a binary file
//! and a bounded, thread-safe LRU tier filled at runtime.

pub mod config;
pub mod tier;
pub mod traits;
pub mod types;

pub use config::{CacheConfig, ResolverConfig};
pub use tier::{BoundedLruCache, FixedTierCache, FixedTierSource, PersistentStore};
pub use traits::{CacheOperationError, Fingerprint, FingerprintContext, Fingerprintable};
pub use types::statistics::{AccessCounter, AccessSnapshot};
